use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::api::middleware::AppError;
use crate::models::ConversationState;

/// Persists conversation state between turns
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, AppError>;

    async fn save(&self, conversation_id: &str, state: &ConversationState) -> Result<(), AppError>;

    /// Returns whether a checkpoint existed
    async fn delete(&self, conversation_id: &str) -> Result<bool, AppError>;
}

/// Process-local checkpoints; lost on restart
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    states: RwLock<HashMap<String, ConversationState>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn conversation_count(&self) -> usize {
        self.states.read().await.len()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<ConversationState>, AppError> {
        Ok(self.states.read().await.get(conversation_id).cloned())
    }

    async fn save(&self, conversation_id: &str, state: &ConversationState) -> Result<(), AppError> {
        self.states
            .write()
            .await
            .insert(conversation_id.to_string(), state.clone());
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<bool, AppError> {
        Ok(self.states.write().await.remove(conversation_id).is_some())
    }
}

/// Serializes turns per conversation id so load → run → save is atomic
#[derive(Default)]
pub struct TurnLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TurnLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Nobody else holds or waits on these
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(conversation_id.to_string())
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
