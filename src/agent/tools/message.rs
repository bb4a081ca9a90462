use crate::agent::tools::ToolExecutionContext;
use crate::agent::tools::{Tool, ToolError, ToolResult};
use crate::chat::ChatHub;
use crate::chat::types::OutboundMessage;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Tool for sending messages programmatically to users
///
/// This tool allows the agent to send messages proactively via the ChatHub
/// outbound channel. It supports specifying the target chat_id, message content,
/// and optionally the channel to use.
pub struct MessageTool {
    /// Chat hub used to enqueue outbound messages
    hub: Arc<ChatHub>,
    /// Default channel to use when not specified in the call
    default_channel: String,
}

impl MessageTool {
    /// Creates a new MessageTool instance
    ///
    /// # Arguments
    /// * `hub` - The ChatHub used to enqueue outbound messages
    /// * `default_channel` - The default channel identifier (e.g., "telegram")
    pub fn new(hub: Arc<ChatHub>, default_channel: impl Into<String>) -> Self {
        Self {
            hub,
            default_channel: default_channel.into(),
        }
    }

    /// Validates a chat_id to ensure it's not empty
    fn validate_chat_id(chat_id: &str) -> ToolResult<()> {
        let trimmed = chat_id.trim();
        if trimmed.is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: "message".to_string(),
                message: "chat_id cannot be empty".to_string(),
            });
        }
        if trimmed.len() > 128 {
            return Err(ToolError::InvalidArguments {
                tool: "message".to_string(),
                message: "chat_id is too long".to_string(),
            });
        }
        if trimmed != chat_id {
            return Err(ToolError::InvalidArguments {
                tool: "message".to_string(),
                message: "chat_id must not contain leading or trailing whitespace".to_string(),
            });
        }
        Ok(())
    }

    /// Validates message content
    fn validate_content(content: &str) -> ToolResult<()> {
        if content.trim().is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: "message".to_string(),
                message: "content cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Tool for MessageTool {
    fn name(&self) -> &str {
        "message"
    }

    fn description(&self) -> &str {
        "Send a message to a user via the configured communication channel. \
         Requires chat_id and content parameters. Optional channel parameter \
         overrides the default channel."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "chat_id": {
                    "type": "string",
                    "description": "Target user identifier (optional, defaults to the current conversation)"
                },
                "content": {
                    "type": "string",
                    "description": "Message content to send"
                },
                "channel": {
                    "type": "string",
                    "description": "Channel identifier (optional, defaults to current context channel)"
                }
            },
            "required": ["content"]
        })
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        ctx: &ToolExecutionContext,
    ) -> ToolResult<String> {
        // chat_id: explicit arg > conversation context > error
        let chat_id = args
            .get("chat_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .or_else(|| ctx.chat_id.clone())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: "message".to_string(),
                message: "Missing 'chat_id' and no default chat_id bound to this request".to_string(),
            })?;
        let chat_id = chat_id.as_str();

        let content = args
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: "message".to_string(),
                message: "Missing required parameter 'content'".to_string(),
            })?;

        // Validate parameters
        Self::validate_chat_id(chat_id)?;
        Self::validate_content(content)?;

        // Resolve channel: args > conversation context > tool default
        let channel = args
            .get("channel")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .or_else(|| ctx.channel.clone())
            .unwrap_or_else(|| self.default_channel.clone());

        if channel.trim().is_empty() {
            return Err(ToolError::ExecutionFailed {
                tool: "message".to_string(),
                message: "No channel specified and no default channel available".to_string(),
            });
        }

        // Create the outbound message
        let message = OutboundMessage::new(&channel, chat_id, content).with_type("assistant");

        // Enqueue to ChatHub outbound buffer (non-blocking)
        match self.hub.try_send_outbound(message) {
            Ok(()) => {
                tracing::info!(
                    tool = "message",
                    chat_id = %chat_id,
                    channel = %channel,
                    "Message queued for delivery"
                );
                Ok(format!(
                    "Message queued for delivery to {} via {}",
                    chat_id, channel
                ))
            }
            Err(e) => Err(ToolError::ExecutionFailedRecoverable {
                tool: "message".to_string(),
                message: e.to_string(),
            }),
        }
    }
}
