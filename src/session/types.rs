use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Default number of messages a session is trimmed back down to once it
/// grows past `2 * MAX_MESSAGES`. Growth is permitted up to the doubled
/// threshold so a single long tool-call burst doesn't force a trim mid-turn.
pub const MAX_MESSAGES: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Logical dispatch key, `"<channel>:<chat_id>"`. Used for FIFO ordering
    /// and as the in-memory map key. Never used to derive a filename.
    pub session_id: String,
    pub channel: String,
    pub chat_id: String,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub messages: VecDeque<Message>,
    /// Free-form bookkeeping: peak prompt tokens, accumulated cost, per-session
    /// max_tokens auto-tune overrides, ring-buffer counters.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Session {
    pub fn new(channel: String, chat_id: String) -> Self {
        let session_id = session_key(&channel, &chat_id);
        let now = Utc::now();
        Self {
            session_id,
            channel,
            chat_id,
            created_at: now,
            last_accessed: now,
            messages: VecDeque::with_capacity(MAX_MESSAGES),
            metadata: HashMap::new(),
        }
    }

    /// Appends a message, permitting growth up to `2 * MAX_MESSAGES` before
    /// trimming the oldest entries back down to `MAX_MESSAGES`.
    pub fn add_message(&mut self, message: Message) {
        self.messages.push_back(message);
        if self.messages.len() > MAX_MESSAGES * 2 {
            while self.messages.len() > MAX_MESSAGES {
                self.messages.pop_front();
            }
        }
        self.last_accessed = Utc::now();
    }

    /// The filesystem-safe stem for this session's JSONL file. Distinct from
    /// `session_id`: channel/chat_id values containing `_` are escaped so two
    /// different sessions never collide on one file.
    pub fn file_stem(&self) -> String {
        file_stem_for(&self.channel, &self.chat_id)
    }
}

/// Builds the logical, colon-joined dispatch key for a channel/chat pair.
pub fn session_key(channel: &str, chat_id: &str) -> String {
    format!("{}:{}", channel, chat_id)
}

/// Builds the escaped, underscore-joined on-disk filename stem. `_` in either
/// component is doubled so splitting is never ambiguous, though the loader
/// never needs to split it back apart — the stem is only ever compared
/// whole or used as an opaque fallback key.
pub fn file_stem_for(channel: &str, chat_id: &str) -> String {
    format!("{}_{}", channel.replace('_', "__"), chat_id.replace('_', "__"))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn new(role: String, content: String) -> Self {
        Self {
            role,
            content,
            timestamp: Utc::now(),
            tool_calls: None,
        }
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    /// Creates a tool result message. Uses role "tool" to match the LLM
    /// message role vocabulary directly — no translation needed in the
    /// context builder.
    pub fn tool_result(content: String) -> Self {
        Self {
            role: "tool".to_string(),
            content,
            timestamp: Utc::now(),
            tool_calls: None,
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == "user"
    }

    pub fn is_assistant(&self) -> bool {
        self.role == "assistant"
    }

    pub fn is_tool_result(&self) -> bool {
        self.role == "tool"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}
