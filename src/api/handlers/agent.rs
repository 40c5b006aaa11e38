use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{channel::mpsc, Stream, StreamExt};
use std::convert::Infallible;
use uuid::Uuid;

use crate::api::handlers::AppState;
use crate::api::middleware::AppError;
use crate::models::{AgentRequest, AgentResponse};

fn prepare_request(payload: AgentRequest) -> Result<(String, String), AppError> {
    if payload.message.trim().is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }
    let conversation_id = payload
        .conversation_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    Ok((conversation_id, payload.message))
}

/// Run one turn and return the full conversation
pub async fn run_agent(
    State(state): State<AppState>,
    Json(payload): Json<AgentRequest>,
) -> Result<Json<AgentResponse>, AppError> {
    let (conversation_id, message) = prepare_request(payload)?;
    tracing::info!("Agent turn for conversation {}", conversation_id);

    let outcome = state.agent.run_turn(&conversation_id, &message).await?;
    Ok(Json(AgentResponse::from(outcome)))
}

/// Run one turn, streaming a server-sent event per completed node
pub async fn stream_agent(
    State(state): State<AppState>,
    Json(payload): Json<AgentRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (conversation_id, message) = prepare_request(payload)?;
    tracing::info!("Streaming agent turn for conversation {}", conversation_id);

    let (tx, rx) = mpsc::unbounded::<Event>();
    let agent = state.agent.clone();

    tokio::spawn(async move {
        let updates = tx.clone();
        let result = agent
            .run_turn_with(&conversation_id, &message, move |event| {
                match Event::default().event(event.node.as_str()).json_data(event) {
                    Ok(sse) => {
                        // Receiver is gone when the client disconnects
                        let _ = updates.unbounded_send(sse);
                    }
                    Err(e) => tracing::error!("Failed to encode {} event: {}", event.node.as_str(), e),
                }
            })
            .await;

        let last = match result {
            Ok(outcome) => Event::default().event("end").json_data(serde_json::json!({
                "conversation_id": outcome.state.conversation_id,
                "turn_count": outcome.state.turn_count,
            })),
            Err(e) => {
                tracing::error!("Streaming turn failed: {}", e);
                Event::default()
                    .event("error")
                    .json_data(serde_json::json!({ "message": e.to_string() }))
            }
        };
        if let Ok(last) = last {
            let _ = tx.unbounded_send(last);
        }
    });

    Ok(Sse::new(rx.map(Ok::<Event, Infallible>)).keep_alive(KeepAlive::default()))
}
