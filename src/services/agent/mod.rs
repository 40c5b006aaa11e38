// Conversational SQL agent: routing, synthesis, execution and narration
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod testing;

pub use orchestrator::*;

use thiserror::Error;

use crate::api::middleware::AppError;
use crate::services::database::QueryError;

/// Failures inside a turn. None of them ends the conversation; each is
/// absorbed by the node where it happens.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Dataset routing failed: {0}")]
    Routing(AppError),

    #[error("SQL synthesis failed: {0}")]
    Synthesis(AppError),

    #[error("SQL execution failed: {0}")]
    Execution(#[from] QueryError),

    #[error("Narration failed: {0}")]
    Narration(AppError),
}
