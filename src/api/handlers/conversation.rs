use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::api::handlers::AppState;
use crate::api::middleware::AppError;
use crate::models::{ConversationState, SchemaCatalog};

/// Get the checkpointed state of a conversation
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationState>, AppError> {
    state
        .store
        .load(&id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Conversation {} not found", id)))
}

/// Forget a conversation
pub async fn delete_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.agent.forget(&id).await? {
        tracing::info!("Deleted conversation {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Conversation {} not found", id)))
    }
}

/// Schema catalog the agent prompts with
pub async fn get_catalog(State(state): State<AppState>) -> Json<SchemaCatalog> {
    Json(state.catalog.as_ref().clone())
}
