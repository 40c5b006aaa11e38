use serde::{Deserialize, Serialize};

use super::conversation::{ConversationState, Message, StateDelta};

/// Nodes of the per-turn agent graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Interpret,
    ExecuteSql,
    Answer,
    End,
}

impl Node {
    /// Every turn starts here
    pub const ENTRY: Node = Node::Interpret;

    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Interpret => "interpret",
            Node::ExecuteSql => "execute_sql",
            Node::Answer => "answer",
            Node::End => "end",
        }
    }

    /// Transition relation of the graph
    pub fn can_transition_to(&self, next: Node) -> bool {
        matches!(
            (self, next),
            (Node::Interpret, Node::End)
                | (Node::Interpret, Node::ExecuteSql)
                | (Node::ExecuteSql, Node::Answer)
                | (Node::Answer, Node::End)
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == Node::End
    }
}

/// Result of running one node: where to go next and what changed
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: Node,
    pub delta: StateDelta,
}

impl Transition {
    pub fn to(next: Node, delta: StateDelta) -> Self {
        Self { next, delta }
    }
}

/// Emitted after each node completes, in execution order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnEvent {
    pub node: Node,
    pub delta: StateDelta,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub state: ConversationState,
    pub events: Vec<TurnEvent>,
}

#[derive(Debug, Deserialize)]
pub struct AgentRequest {
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct AgentResponse {
    pub conversation_id: String,
    pub messages: Vec<Message>,
    pub events: Vec<TurnEvent>,
}

impl From<TurnOutcome> for AgentResponse {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            conversation_id: outcome.state.conversation_id,
            messages: outcome.state.messages,
            events: outcome.events,
        }
    }
}
