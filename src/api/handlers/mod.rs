pub mod agent;
pub mod conversation;

use std::sync::Arc;

use crate::models::SchemaCatalog;
use crate::services::SqlAgent;
use crate::storage::CheckpointStore;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<SqlAgent>,
    pub store: Arc<dyn CheckpointStore>,
    pub catalog: Arc<SchemaCatalog>,
}
