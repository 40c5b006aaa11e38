use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use super::dataset::DatasetId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    System,
    Assistant,
}

/// What an assistant message is for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Text addressed to the user
    #[default]
    Chat,
    /// Raw SQL completion kept in the history for debugging
    SqlDraft,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub kind: MessageKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, kind: MessageKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            kind,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, MessageKind::Chat, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageKind::Chat, content)
    }

    pub fn sql_draft(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, MessageKind::SqlDraft, content)
    }

    /// An assistant message addressed to the user
    pub fn is_reply(&self) -> bool {
        self.role == Role::Assistant && self.kind == MessageKind::Chat
    }
}

/// Rows returned by a query; only column order is kept
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self { rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl fmt::Display for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = serde_json::to_string(&self.rows).map_err(|_| fmt::Error)?;
        f.write_str(&text)
    }
}

/// Outcome of the execution step, consumed by narration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum LastResult {
    Rows(ResultSet),
    Error(String),
}

impl fmt::Display for LastResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LastResult::Rows(rows) => rows.fmt(f),
            LastResult::Error(message) => f.write_str(message),
        }
    }
}

/// Changes produced by one node of the agent graph
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateDelta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_sql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_dataset: Option<DatasetId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_result: Option<LastResult>,
}

impl StateDelta {
    pub fn message(message: Message) -> Self {
        Self {
            messages: vec![message],
            ..Self::default()
        }
    }
}

/// Conversation state checkpointed between turns
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationState {
    pub conversation_id: String,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub pending_sql: Option<String>,
    #[serde(default)]
    pub selected_dataset: Option<DatasetId>,
    #[serde(default)]
    pub last_result: Option<LastResult>,
    pub turn_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            messages: Vec::new(),
            pending_sql: None,
            selected_dataset: None,
            last_result: None,
            turn_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Start a new turn: drop the previous turn's scratch fields and record
    /// the user's message.
    pub fn begin_turn(&mut self, utterance: &str) {
        self.pending_sql = None;
        self.selected_dataset = None;
        self.last_result = None;
        self.messages.push(Message::user(utterance));
        self.turn_count += 1;
        self.updated_at = Utc::now();
    }

    pub fn apply(&mut self, delta: &StateDelta) {
        self.messages.extend(delta.messages.iter().cloned());
        if let Some(sql) = &delta.pending_sql {
            self.pending_sql = Some(sql.clone());
        }
        if let Some(dataset) = delta.selected_dataset {
            self.selected_dataset = Some(dataset);
        }
        if let Some(result) = &delta.last_result {
            self.last_result = Some(result.clone());
        }
        self.updated_at = Utc::now();
    }

    pub fn latest_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    pub fn replies(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_reply())
    }
}
