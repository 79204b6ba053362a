/// Database models for Orgdesk
///
/// Each module holds the record types for one table and a repository that
/// expresses every read and write as a [`PreparedStatement`](crate::db::PreparedStatement)
/// run through a shared [`QueryExecutor`](crate::db::QueryExecutor).
///
/// # Models
///
/// - `user`: User accounts and their notification settings
/// - `organization`: Organizations (tenants)
/// - `membership`: User-organization links with admin/active flags
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use orgdesk_shared::db::{pool::{create_pool, DatabaseConfig}, PgExecutor, QueryExecutor};
/// use orgdesk_shared::models::user::{CreateUser, UserRepository};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let db: Arc<dyn QueryExecutor> = Arc::new(PgExecutor::new(pool));
///
/// let users = UserRepository::new(db);
/// let user = users
///     .create(CreateUser {
///         email: "user@example.com".to_string(),
///         ..Default::default()
///     })
///     .await?;
/// # Ok(())
/// # }
/// ```

pub mod membership;
pub mod organization;
pub mod user;
