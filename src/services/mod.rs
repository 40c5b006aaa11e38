pub mod agent;
pub mod connection_pool;
pub mod database; // Query execution against the crawler databases
pub mod dataset_router;
pub mod llm_service;
pub mod sql_synthesizer;

pub use agent::*;
pub use connection_pool::*;
pub use dataset_router::*;
pub use llm_service::*;
pub use sql_synthesizer::*;
