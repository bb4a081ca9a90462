use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const MAX_CONTENT_LENGTH: usize = 4000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub channel: String,
    /// Identifier of the sender within `channel` (e.g. a Telegram user id).
    /// Empty for messages the runtime generates for itself (cron, heartbeat,
    /// subagent announcements).
    #[serde(default)]
    pub sender_id: String,
    pub chat_id: String,
    pub content: String,
    pub received_at: DateTime<Utc>,
    pub metadata: HashMap<String, Value>,
}

impl InboundMessage {
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            sender_id: String::new(),
            chat_id: chat_id.into(),
            content: content.into(),
            received_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_sender_id(mut self, sender_id: impl Into<String>) -> Self {
        self.sender_id = sender_id.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Sanitizes and validates the message content.
    /// Returns true if the message is valid (not empty/whitespace), false otherwise.
    pub fn sanitize(&mut self) -> bool {
        let trimmed = self.content.trim();
        if trimmed.is_empty() {
            return false;
        }

        if trimmed.len() > MAX_CONTENT_LENGTH {
            tracing::warn!(
                channel = %self.channel,
                chat_id = %self.chat_id,
                original_length = self.content.len(),
                "Message too long, truncating to {}",
                MAX_CONTENT_LENGTH
            );
            // Truncate safely on UTF-8 character boundaries.
            self.content = trimmed.chars().take(MAX_CONTENT_LENGTH).collect();
        } else if trimmed.len() != self.content.len() {
            self.content = trimmed.to_string();
        }

        true
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: String,
    pub chat_id: String,
    pub content: String,
    pub metadata: HashMap<String, Value>,
}

impl OutboundMessage {
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Tags this message with a delivery kind (`assistant`, `status`,
    /// `subagents`, `subagent_event`, ...). Channels that care about the
    /// distinction (e.g. to render status updates differently) read
    /// `metadata["type"]`; those that don't can ignore it.
    pub fn with_type(mut self, message_type: impl Into<String>) -> Self {
        self.metadata
            .insert("type".to_string(), Value::String(message_type.into()));
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.metadata.insert("data".to_string(), data);
        self
    }

    pub fn message_type(&self) -> Option<&str> {
        self.metadata.get("type").and_then(|v| v.as_str())
    }
}
