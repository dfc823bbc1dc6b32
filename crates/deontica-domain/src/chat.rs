//! Chat turns - the persisted conversation log

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who produced a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// The person asking
    User,
    /// The pipeline's answer
    Assistant,
}

impl ChatRole {
    /// Get the role name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    /// Parse a stored role name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

/// One message of a conversation thread, with the retrieval trace behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Conversation thread identifier
    pub thread_id: String,

    /// Author of the message
    pub role: ChatRole,

    /// Message text
    pub content: String,

    /// Retrieval trace (document hits for questions, citations for answers)
    pub retrieval_log: Value,

    /// Unix timestamp (seconds)
    pub created_at: u64,
}

impl ChatTurn {
    /// Create a turn with an empty retrieval log
    pub fn new(thread_id: impl Into<String>, role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            role,
            content: content.into(),
            retrieval_log: Value::Object(Default::default()),
            created_at: 0,
        }
    }

    /// Attach a retrieval trace
    pub fn with_retrieval_log(mut self, log: Value) -> Self {
        self.retrieval_log = log;
        self
    }

    /// Set the creation timestamp
    pub fn at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }
}
