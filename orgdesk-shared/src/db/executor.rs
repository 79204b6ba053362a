/// Query-executing boundary
///
/// Repositories never touch the driver directly. They hand a
/// [`PreparedStatement`] to a [`QueryExecutor`] and get JSON-shaped rows back,
/// which they decode into their own records. The executor is passed into each
/// repository at construction, so one pool is shared without global state and
/// tests can swap in an in-memory executor.
///
/// [`PgExecutor`] is the production implementation on top of `sqlx::PgPool`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::{
    postgres::{PgArguments, PgPool, PgRow},
    Column, Row as _, TypeInfo,
};
use tracing::{debug, warn};

use super::{DbResult, PreparedStatement};

/// A result row keyed by column name
pub type Row = Map<String, Value>;

/// Rows returned by a statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Decodes the first row, if any
    pub fn first<T: DeserializeOwned>(&self) -> DbResult<Option<T>> {
        match self.rows.first() {
            Some(row) => Ok(Some(serde_json::from_value(Value::Object(row.clone()))?)),
            None => Ok(None),
        }
    }

    /// Decodes every row
    pub fn all<T: DeserializeOwned>(&self) -> DbResult<Vec<T>> {
        self.rows
            .iter()
            .map(|row| serde_json::from_value(Value::Object(row.clone())).map_err(Into::into))
            .collect()
    }
}

/// Executes prepared statements
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn query(&self, statement: &PreparedStatement) -> DbResult<QueryResult>;
}

/// PostgreSQL executor backed by a sqlx pool
#[derive(Debug, Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    async fn query(&self, statement: &PreparedStatement) -> DbResult<QueryResult> {
        debug!(
            statement = %statement.name,
            params = statement.values.len(),
            "Executing statement"
        );

        let mut query = sqlx::query(&statement.text);
        for value in &statement.values {
            query = bind_value(query, value);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(QueryResult::new(rows.iter().map(row_to_json).collect()))
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                query.bind(n.to_string())
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => query.bind(sqlx::types::Json(value)),
    }
}

/// Converts a driver row into a JSON row by column type
fn row_to_json(row: &PgRow) -> Row {
    let mut out = Map::new();

    for (index, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "INT2" => row
                .try_get::<Option<i16>, _>(index)
                .ok()
                .flatten()
                .map(Value::from),
            "INT4" => row
                .try_get::<Option<i32>, _>(index)
                .ok()
                .flatten()
                .map(Value::from),
            "INT8" => row
                .try_get::<Option<i64>, _>(index)
                .ok()
                .flatten()
                .map(Value::from),
            "FLOAT4" | "FLOAT8" => row
                .try_get::<Option<f64>, _>(index)
                .ok()
                .flatten()
                .map(Value::from),
            "BOOL" => row
                .try_get::<Option<bool>, _>(index)
                .ok()
                .flatten()
                .map(Value::Bool),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => row
                .try_get::<Option<String>, _>(index)
                .ok()
                .flatten()
                .map(Value::String),
            "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index).ok().flatten(),
            "UUID" => row
                .try_get::<Option<uuid::Uuid>, _>(index)
                .ok()
                .flatten()
                .map(|u| Value::String(u.to_string())),
            "TIMESTAMPTZ" => row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
                .ok()
                .flatten()
                .map(|t| Value::String(t.to_rfc3339())),
            "TIMESTAMP" => row
                .try_get::<Option<chrono::NaiveDateTime>, _>(index)
                .ok()
                .flatten()
                .map(|t| Value::String(t.and_utc().to_rfc3339())),
            other => match row.try_get_unchecked::<Option<String>, _>(index) {
                Ok(text) => text.map(Value::String),
                Err(_) => {
                    warn!(column = column.name(), type_name = other, "Unhandled column type");
                    None
                }
            },
        };

        out.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }

    out
}
