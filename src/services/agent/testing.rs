// Scripted collaborators for agent tests
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::api::middleware::AppError;
use crate::models::{DatasetId, ResultSet};
use crate::services::database::{QueryError, QueryExecutor};
use crate::services::{LlmClient, PromptMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Routing,
    Synthesis,
    Narration,
    Other,
}

impl PromptKind {
    fn of(prompt: &str) -> Self {
        if prompt.starts_with("Choose the correct database") {
            PromptKind::Routing
        } else if prompt.starts_with("You are an agent generating SQL") {
            PromptKind::Synthesis
        } else if prompt.contains("Explain this in clear, simple English") {
            PromptKind::Narration
        } else {
            PromptKind::Other
        }
    }
}

/// Answers each kind of prompt with a fixed reply, or fails it
pub struct ScriptedLlm {
    routing: Result<String, String>,
    synthesis: Result<String, String>,
    narration: Result<String, String>,
    prompts: Mutex<Vec<(PromptKind, String)>>,
}

impl Default for ScriptedLlm {
    fn default() -> Self {
        Self {
            routing: Ok("chan".to_string()),
            synthesis: Ok("SELECT COUNT(*) FROM posts".to_string()),
            narration: Ok("There are 42 posts.".to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedLlm {
    pub fn routing(mut self, answer: &str) -> Self {
        self.routing = Ok(answer.to_string());
        self
    }

    pub fn failing_routing(mut self) -> Self {
        self.routing = Err("connection refused".to_string());
        self
    }

    pub fn synthesis(mut self, completion: &str) -> Self {
        self.synthesis = Ok(completion.to_string());
        self
    }

    pub fn failing_synthesis(mut self) -> Self {
        self.synthesis = Err("gateway timeout".to_string());
        self
    }

    pub fn narration(mut self, text: &str) -> Self {
        self.narration = Ok(text.to_string());
        self
    }

    pub fn failing_narration(mut self) -> Self {
        self.narration = Err("rate limited".to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts_of(&self, kind: PromptKind) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AppError> {
        let prompt: String = messages.iter().map(|m| m.content.as_str()).collect();
        let kind = PromptKind::of(&prompt);
        self.prompts.lock().unwrap().push((kind, prompt));

        let reply = match kind {
            PromptKind::Routing => &self.routing,
            PromptKind::Synthesis => &self.synthesis,
            PromptKind::Narration => &self.narration,
            PromptKind::Other => return Err(AppError::LlmService("unexpected prompt".to_string())),
        };
        reply.clone().map_err(AppError::LlmService)
    }
}

/// Returns a fixed result (or error) and records every call
pub struct StubExecutor {
    outcome: Result<ResultSet, String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(DatasetId, String)>>,
}

impl StubExecutor {
    pub fn returning(rows: ResultSet) -> Self {
        Self {
            outcome: Ok(rows),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(message.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Hold every execution for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(DatasetId, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for StubExecutor {
    async fn execute(&self, dataset: DatasetId, sql: &str) -> Result<ResultSet, QueryError> {
        self.calls.lock().unwrap().push((dataset, sql.to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.outcome
            .clone()
            .map_err(|message| QueryError::new(sql, message))
    }
}
