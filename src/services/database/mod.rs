// Query execution against the crawler databases
pub mod adapter;
pub mod postgresql;

pub use adapter::{QueryError, QueryExecutor};
pub use postgresql::PostgresExecutor;
