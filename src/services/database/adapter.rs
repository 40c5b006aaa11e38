// Query executor abstraction over the crawler databases
use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DatasetId, ResultSet};

/// Failure to run a statement; carries the SQL that was attempted and the
/// driver's message
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct QueryError {
    pub sql: String,
    pub message: String,
}

impl QueryError {
    pub fn new(sql: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            message: message.into(),
        }
    }
}

/// Runs a SQL string against one dataset.
///
/// Each call is self-contained: a connection is checked out for the call and
/// returned before it completes, whether or not the statement succeeds.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, dataset: DatasetId, sql: &str) -> Result<ResultSet, QueryError>;
}
