/// Database layer for Orgdesk
///
/// This module provides connection pooling, the query-executing boundary that
/// repositories are built on, and the partial-update statement builder.
///
/// # Modules
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `executor`: `QueryExecutor` trait and its sqlx-backed implementation
/// - `update_query`: Prepared statements and the dynamic UPDATE builder
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use orgdesk_shared::db::{pool::{create_pool, DatabaseConfig}, PgExecutor, QueryExecutor};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let pool = create_pool(config).await?;
///     let executor: Arc<dyn QueryExecutor> = Arc::new(PgExecutor::new(pool));
///     Ok(())
/// }
/// ```

pub mod executor;
pub mod pool;
pub mod update_query;

pub use executor::{PgExecutor, QueryExecutor, QueryResult, Row};
pub use update_query::{build_update_query, PreparedStatement, UpdateFields, WhereClause};

/// Result alias for the data-access layer
pub type DbResult<T> = Result<T, DbError>;

/// Errors raised by the data-access layer
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// The driver reported an error
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),

    /// A row could not be shaped into the requested record
    #[error("Failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),

    /// A statement was requested without the parameters it needs
    #[error("{0}")]
    ParametersRequired(String),

    /// A table or column name is not a plain SQL identifier
    #[error("Invalid SQL identifier: {0}")]
    InvalidIdentifier(String),
}
