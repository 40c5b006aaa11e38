use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crawler_insights_backend::api::handlers::AppState;
use crawler_insights_backend::api::routes::create_router;
use crawler_insights_backend::config::{CheckpointBackend, Config};
use crawler_insights_backend::models::SchemaCatalog;
use crawler_insights_backend::services::database::PostgresExecutor;
use crawler_insights_backend::services::{ConnectionPoolManager, LlmService, SqlAgent};
use crawler_insights_backend::storage::{CheckpointStore, InMemoryCheckpointStore, SqliteCheckpointStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (.env included) before logging so the level applies
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_ansi(config.logging.style != "never")
        .init();

    info!("Starting server on {}", config.server_address());

    let catalog = Arc::new(match &config.agent.catalog_path {
        Some(path) => {
            info!("Loading schema catalog from {}", path);
            SchemaCatalog::from_path(path)?
        }
        None => SchemaCatalog::builtin()?,
    });

    let llm = Arc::new(LlmService::new(&config.llm)?);

    let pools = Arc::new(ConnectionPoolManager::from_config(&config.database).map_err(|e| {
        error!("Failed to configure database pools: {}", e);
        e
    })?);
    let executor = Arc::new(PostgresExecutor::new(pools, config.database.query_timeout_secs));

    let store: Arc<dyn CheckpointStore> = match config.checkpoint.backend {
        CheckpointBackend::Memory => Arc::new(InMemoryCheckpointStore::new()),
        CheckpointBackend::Sqlite => {
            info!("Checkpointing conversations to {}", config.checkpoint.sqlite_path);
            Arc::new(
                SqliteCheckpointStore::new(&config.checkpoint.sqlite_path)
                    .await
                    .context("Failed to open checkpoint database")?,
            )
        }
    };

    let agent = SqlAgent::new(&config.agent, catalog.clone(), llm, executor, store.clone());

    let app = create_router(AppState {
        agent: Arc::new(agent),
        store,
        catalog,
    });

    // Start server
    let addr: SocketAddr = config.server_address().parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
