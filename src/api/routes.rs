use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{agent, conversation, AppState};

/// Create router with application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/agent", post(agent::run_agent))
        .route("/api/agent/stream", post(agent::stream_agent))
        .route(
            "/api/conversations/{id}",
            get(conversation::get_conversation).delete(conversation::delete_conversation),
        )
        .route("/api/catalog", get(conversation::get_catalog))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::config::AgentConfig;
    use crate::models::{ResultSet, SchemaCatalog};
    use crate::services::agent::testing::{ScriptedLlm, StubExecutor};
    use crate::services::{SqlAgent, GREETING};
    use crate::storage::InMemoryCheckpointStore;

    fn app() -> Router {
        let catalog = Arc::new(SchemaCatalog::builtin().unwrap());
        let store = Arc::new(InMemoryCheckpointStore::new());
        let config = AgentConfig {
            read_only: true,
            row_limit: 1000,
            sql_dialect: "PostgreSQL".to_string(),
            catalog_path: None,
        };
        let agent = SqlAgent::new(
            &config,
            catalog.clone(),
            Arc::new(ScriptedLlm::default()),
            Arc::new(StubExecutor::returning(ResultSet::new(vec![vec![json!(42)]]))),
            store.clone(),
        );
        create_router(AppState {
            agent: Arc::new(agent),
            store,
            catalog,
        })
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app().oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_agent_mints_conversation_id() {
        let response = app()
            .oneshot(post_json("/api/agent", json!({ "message": "hi" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let id = body["conversation_id"].as_str().unwrap();
        assert!(uuid::Uuid::parse_str(id).is_ok());
        assert_eq!(body["messages"][1]["content"], GREETING);
        assert_eq!(body["events"][0]["node"], "interpret");
    }

    #[tokio::test]
    async fn test_agent_rejects_empty_message() {
        let response = app()
            .oneshot(post_json("/api/agent", json!({ "message": "  " })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_conversation_lifecycle() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/agent",
                json!({ "conversation_id": "c1", "message": "how many posts?" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.clone().oneshot(get("/api/conversations/c1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["turn_count"], 1);
        assert_eq!(body["last_result"]["status"], "rows");

        let delete = Request::builder()
            .method("DELETE")
            .uri("/api/conversations/c1")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(delete).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app.oneshot(get("/api/conversations/c1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_catalog() {
        let response = app().oneshot(get("/api/catalog")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["datasets"]["primary"]["name"], "chan");
        assert_eq!(body["datasets"]["secondary"]["name"], "reddit");
    }

    #[tokio::test]
    async fn test_stream_emits_node_events() {
        let response = app()
            .oneshot(post_json(
                "/api/agent/stream",
                json!({ "conversation_id": "c1", "message": "how many posts?" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let interpret = text.find("event: interpret").unwrap();
        let execute = text.find("event: execute_sql").unwrap();
        let answer = text.find("event: answer").unwrap();
        let end = text.find("event: end").unwrap();
        assert!(interpret < execute && execute < answer && answer < end);
        assert!(text.contains("There are 42 posts."));
    }
}
