pub mod checkpoint;
pub mod sqlite;

pub use checkpoint::*;
pub use sqlite::SqliteCheckpointStore;
