/// In-memory test doubles for the database and event boundaries
///
/// Available to this crate's unit tests and, through the `testing` feature,
/// to other crates' tests.
///
/// # Example
///
/// ```ignore
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use orgdesk_shared::db::{PreparedStatement, QueryExecutor};
/// use orgdesk_shared::testing::MockExecutor;
/// use serde_json::json;
///
/// let db = MockExecutor::new();
/// db.respond("fetch-org", vec![json!({"org_id": 1, "name": "Acme", "description": null})]);
///
/// let result = db.query(&PreparedStatement::new("fetch-org", "SELECT ...")).await.unwrap();
/// assert_eq!(result.rows.len(), 1);
/// assert_eq!(db.executed_names(), vec!["fetch-org"]);
/// # }
/// ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;

use crate::db::{DbError, DbResult, PreparedStatement, QueryExecutor, QueryResult, Row};
use crate::events::{DomainEvent, EventSink};

enum Scripted {
    Rows(Vec<Row>),
    Error(String),
}

#[derive(Default)]
struct MockState {
    queued: HashMap<String, VecDeque<Scripted>>,
    sticky: HashMap<String, Vec<Row>>,
    executed: Vec<PreparedStatement>,
}

/// Executor that answers statements by name from scripted responses
///
/// Queued responses are consumed in order; once a statement's queue is empty
/// the sticky response (if any) is used, otherwise the statement returns no
/// rows. Every statement is recorded.
#[derive(Default)]
pub struct MockExecutor {
    state: Mutex<MockState>,
}

fn into_rows(rows: Vec<Value>) -> Vec<Row> {
    rows.into_iter()
        .filter_map(|row| match row {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

impl MockExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A poisoned lock only means another test thread panicked
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queues rows for the next execution of `name`
    pub fn respond(&self, name: &str, rows: Vec<Value>) {
        self.state()
            .queued
            .entry(name.to_string())
            .or_default()
            .push_back(Scripted::Rows(into_rows(rows)));
    }

    /// Answers every execution of `name` with these rows once its queue is drained
    pub fn respond_always(&self, name: &str, rows: Vec<Value>) {
        self.state().sticky.insert(name.to_string(), into_rows(rows));
    }

    /// Makes the next execution of `name` fail
    pub fn fail(&self, name: &str, message: &str) {
        self.state()
            .queued
            .entry(name.to_string())
            .or_default()
            .push_back(Scripted::Error(message.to_string()));
    }

    pub fn executed(&self) -> Vec<PreparedStatement> {
        self.state().executed.clone()
    }

    pub fn executed_names(&self) -> Vec<String> {
        self.state().executed.iter().map(|s| s.name.clone()).collect()
    }

    /// The most recent execution of `name`
    pub fn last_statement(&self, name: &str) -> Option<PreparedStatement> {
        self.state()
            .executed
            .iter()
            .rev()
            .find(|s| s.name == name)
            .cloned()
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn query(&self, statement: &PreparedStatement) -> DbResult<QueryResult> {
        let mut state = self.state();
        state.executed.push(statement.clone());

        let scripted = state
            .queued
            .get_mut(&statement.name)
            .and_then(|queue| queue.pop_front());

        match scripted {
            Some(Scripted::Rows(rows)) => Ok(QueryResult::new(rows)),
            Some(Scripted::Error(message)) => {
                Err(DbError::Sqlx(sqlx::Error::Protocol(message)))
            }
            None => Ok(QueryResult::new(
                state.sticky.get(&statement.name).cloned().unwrap_or_default(),
            )),
        }
    }
}

/// Sink that keeps every emitted event
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: DomainEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}
