use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::api::middleware::AppError;
use crate::config::LlmConfig;
use crate::models::Role;

/// One message of a prompt sent to the language model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Free-text completion; callers parse whatever comes back
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AppError>;
}

/// Client for an OpenAI-compatible chat completions gateway
pub struct LlmService {
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    http_client: HttpClient,
}

impl LlmService {
    pub fn new(config: &LlmConfig) -> Result<Self, AppError> {
        let http_client = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::LlmService(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
            temperature: config.temperature,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        if self.base_url.ends_with("/chat/completions") {
            self.base_url.clone()
        } else {
            format!("{}/chat/completions", self.base_url)
        }
    }

    fn request_body(&self, messages: &[PromptMessage]) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
        })
    }

    /// Pull the completion text out of a gateway response
    fn extract_content(result: &Value) -> Option<&str> {
        result
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .or_else(|| result["text"].as_str())
            .or_else(|| result["content"].as_str())
            .or_else(|| result["response"].as_str())
    }
}

#[async_trait]
impl LlmClient for LlmService {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, AppError> {
        if self.base_url.is_empty() {
            return Err(AppError::LlmService("LLM gateway is not configured".to_string()));
        }

        let mut request = self
            .http_client
            .post(self.endpoint())
            .json(&self.request_body(messages));

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::LlmService(format!("Failed to call LLM service: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::LlmService(format!(
                "LLM service returned error {}: {}",
                status, error_text
            )));
        }

        let result: Value = response
            .json()
            .await
            .map_err(|e| AppError::LlmService(format!("Failed to parse LLM response: {}", e)))?;

        let content = Self::extract_content(&result)
            .ok_or_else(|| AppError::LlmService("LLM response does not contain any text".to_string()))?;

        tracing::debug!("LLM completion ({} chars)", content.len());
        Ok(content.to_string())
    }
}
