use std::sync::Arc;

use crate::api::middleware::AppError;
use crate::config::AgentConfig;
use crate::models::{
    ConversationState, LastResult, Message, MessageKind, Node, SchemaCatalog, StateDelta,
    Transition, TurnEvent, TurnOutcome,
};
use crate::services::agent::AgentError;
use crate::services::database::{QueryError, QueryExecutor};
use crate::services::{DatasetRouter, LlmClient, PromptMessage, SqlSynthesizer};
use crate::storage::{CheckpointStore, TurnLocks};
use crate::validation::SqlValidator;

pub const GREETING: &str = "Hello! How can I help with database questions?";
pub const SYNTHESIS_APOLOGY: &str =
    "Sorry, I couldn't generate a SQL query for that question. Please try again.";
pub const NO_RESULT: &str = "I could not produce any SQL result.";

const SMALL_TALK: [&str; 4] = ["hi", "hello", "hey", "yo"];

/// Drives one conversation turn through interpret → execute → answer.
///
/// Turns on the same conversation id are serialized; turns on different ids
/// share nothing but the collaborators.
pub struct SqlAgent {
    catalog: Arc<SchemaCatalog>,
    router: DatasetRouter,
    synthesizer: SqlSynthesizer,
    executor: Arc<dyn QueryExecutor>,
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn CheckpointStore>,
    locks: TurnLocks,
    read_only: bool,
    row_limit: u64,
}

impl SqlAgent {
    pub fn new(
        config: &AgentConfig,
        catalog: Arc<SchemaCatalog>,
        llm: Arc<dyn LlmClient>,
        executor: Arc<dyn QueryExecutor>,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            router: DatasetRouter::new(llm.clone(), catalog.clone()),
            synthesizer: SqlSynthesizer::new(llm.clone(), config.sql_dialect.clone()),
            catalog,
            executor,
            llm,
            store,
            locks: TurnLocks::new(),
            read_only: config.read_only,
            row_limit: config.row_limit,
        }
    }

    pub async fn run_turn(&self, conversation_id: &str, utterance: &str) -> Result<TurnOutcome, AppError> {
        self.run_turn_with(conversation_id, utterance, |_| {}).await
    }

    /// Run a turn, calling `on_event` after each node completes
    pub async fn run_turn_with<F>(
        &self,
        conversation_id: &str,
        utterance: &str,
        mut on_event: F,
    ) -> Result<TurnOutcome, AppError>
    where
        F: FnMut(&TurnEvent) + Send,
    {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(AppError::Validation("Message must not be empty".to_string()));
        }

        let _guard = self.locks.acquire(conversation_id).await;

        let mut state = match self.store.load(conversation_id).await? {
            Some(state) => state,
            None => {
                tracing::info!("Starting conversation {}", conversation_id);
                ConversationState::new(conversation_id)
            }
        };
        state.begin_turn(utterance);

        let mut events = Vec::new();
        let mut node = Node::ENTRY;
        while !node.is_terminal() {
            let Transition { next, delta } = self.step(node, &state).await;
            if !node.can_transition_to(next) {
                return Err(AppError::Internal(format!(
                    "Invalid transition {} -> {}",
                    node.as_str(),
                    next.as_str()
                )));
            }
            tracing::debug!("Conversation {}: {} -> {}", conversation_id, node.as_str(), next.as_str());

            state.apply(&delta);
            let event = TurnEvent { node, delta };
            on_event(&event);
            events.push(event);
            node = next;
        }

        self.store.save(conversation_id, &state).await?;
        Ok(TurnOutcome { state, events })
    }

    /// Delete a conversation once no turn on it is in flight.
    /// Returns whether it existed.
    pub async fn forget(&self, conversation_id: &str) -> Result<bool, AppError> {
        let _guard = self.locks.acquire(conversation_id).await;
        self.store.delete(conversation_id).await
    }

    async fn step(&self, node: Node, state: &ConversationState) -> Transition {
        match node {
            Node::Interpret => self.interpret(state).await,
            Node::ExecuteSql => self.execute_sql(state).await,
            Node::Answer => self.answer(state).await,
            Node::End => Transition::to(Node::End, StateDelta::default()),
        }
    }

    async fn interpret(&self, state: &ConversationState) -> Transition {
        let question = state
            .latest_user_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        if is_small_talk(&question) {
            return Transition::to(Node::End, StateDelta::message(Message::assistant(GREETING)));
        }

        let dataset = self.router.route(&question).await;
        match self.synthesizer.synthesize(&question, dataset, &self.catalog).await {
            Ok(candidate) => Transition::to(
                Node::ExecuteSql,
                StateDelta {
                    messages: vec![Message::sql_draft(candidate.completion)],
                    pending_sql: Some(candidate.sql),
                    selected_dataset: Some(dataset),
                    last_result: None,
                },
            ),
            Err(e) => {
                tracing::warn!("{}", e);
                Transition::to(Node::End, StateDelta::message(Message::assistant(SYNTHESIS_APOLOGY)))
            }
        }
    }

    async fn execute_sql(&self, state: &ConversationState) -> Transition {
        let (Some(sql), Some(dataset)) = (state.pending_sql.as_deref(), state.selected_dataset) else {
            tracing::warn!("Nothing to execute for conversation {}", state.conversation_id);
            return Transition::to(Node::Answer, StateDelta::default());
        };

        let result = match self.prepare(sql) {
            Ok(prepared) => self.executor.execute(dataset, &prepared).await,
            Err(e) => Err(e),
        };

        let last_result = match result {
            Ok(rows) => {
                tracing::info!("Query on {} returned {} rows", dataset, rows.row_count());
                LastResult::Rows(rows)
            }
            Err(e) => {
                let message = format!("SQL Error: {}", e);
                tracing::warn!("{}", AgentError::from(e));
                LastResult::Error(message)
            }
        };

        Transition::to(
            Node::Answer,
            StateDelta {
                last_result: Some(last_result),
                ..StateDelta::default()
            },
        )
    }

    fn prepare(&self, sql: &str) -> Result<String, QueryError> {
        if !self.read_only {
            return Ok(sql.to_string());
        }
        let (prepared, limited) = SqlValidator::validate_and_prepare(sql, self.row_limit)
            .map_err(|e| QueryError::new(sql, validation_message(e)))?;
        if limited {
            tracing::debug!("Applied row limit {}", self.row_limit);
        }
        Ok(prepared)
    }

    async fn answer(&self, state: &ConversationState) -> Transition {
        let Some(result) = &state.last_result else {
            return Transition::to(Node::End, StateDelta::message(Message::assistant(NO_RESULT)));
        };

        let question = asked_question(state);
        let prompt = build_narration_prompt(&question, state.pending_sql.as_deref(), result);
        tracing::debug!("Narration prompt:\n{}", prompt);

        let reply = match self.llm.complete(&[PromptMessage::user(prompt)]).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                tracing::warn!("{}; returning the raw result", AgentError::Narration(e));
                format!("Here is the raw result of the query: {}", result)
            }
        };

        Transition::to(Node::End, StateDelta::message(Message::assistant(reply)))
    }
}

fn is_small_talk(utterance: &str) -> bool {
    let normalized = utterance.trim().to_lowercase();
    SMALL_TALK.contains(&normalized.as_str())
}

fn validation_message(error: AppError) -> String {
    match error {
        AppError::InvalidSql(message) | AppError::Validation(message) => message,
        other => other.to_string(),
    }
}

/// The message that preceded the SQL draft, i.e. what the user actually asked
fn asked_question(state: &ConversationState) -> String {
    let draft = state
        .messages
        .iter()
        .rposition(|m| m.kind == MessageKind::SqlDraft);
    draft
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| state.messages.get(i))
        .or_else(|| state.latest_user_message())
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

pub fn build_narration_prompt(question: &str, sql: Option<&str>, result: &LastResult) -> String {
    let query = sql
        .map(|sql| format!("SQL Query: {}\n", sql))
        .unwrap_or_default();
    format!(
        "Question: {}\n{}SQL Result: {}\n\nExplain this in clear, simple English.",
        question, query, result
    )
}
