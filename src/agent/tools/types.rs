//! Types for the tool system
//!
//! This module defines the core types for the tool system including:
//! - Tool trait for implementing tools
//! - ToolError for error handling
//! - ToolResult type alias
//! - ToolExecutionContext for execution context
//! - ToolDefinition for LLM function format

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Error types for tool execution
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    NotFound(String),

    /// Invalid arguments provided to tool
    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidArguments { tool: String, message: String },

    /// Tool execution failed (non-recoverable)
    #[error("Tool '{tool}' execution failed: {message}")]
    ExecutionFailed { tool: String, message: String },

    /// Tool execution failed but is recoverable (can retry)
    #[error("Tool '{tool}' execution failed: {message}")]
    ExecutionFailedRecoverable { tool: String, message: String },

    /// Permission denied for tool execution
    #[error("Permission denied for tool '{tool}': {message}")]
    PermissionDenied { tool: String, message: String },

    /// Tool execution timed out
    #[error("Tool '{tool}' timed out after {duration}s")]
    Timeout { tool: String, duration: u64 },
}

impl ToolError {
    /// Check if the error is recoverable (can be retried)
    ///
    /// Recoverable errors include timeouts and certain execution failures
    /// that might succeed on retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ToolError::Timeout { .. } | ToolError::ExecutionFailedRecoverable { .. }
        )
    }

    /// Get the tool name from the error
    ///
    /// Returns the name of the tool that generated this error.
    pub fn tool_name(&self) -> &str {
        match self {
            ToolError::NotFound(name) => name,
            ToolError::InvalidArguments { tool, .. } => tool,
            ToolError::ExecutionFailed { tool, .. } => tool,
            ToolError::ExecutionFailedRecoverable { tool, .. } => tool,
            ToolError::PermissionDenied { tool, .. } => tool,
            ToolError::Timeout { tool, .. } => tool,
        }
    }
}

/// Result type for tool operations
pub type ToolResult<T> = std::result::Result<T, ToolError>;

/// A single requested tool invocation, decoupled from any particular LLM
/// provider's wire format so the registry doesn't need to depend on
/// `providers`.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: HashMap<String, Value>,
}

/// Execution context passed to tools during execution
///
/// Provides tools with information about the current execution environment
/// and conversation context.
#[derive(Debug, Clone, Default)]
pub struct ToolExecutionContext {
    /// Channel for the current conversation (e.g., "telegram", "cli")
    pub channel: Option<String>,
    /// Chat/user identifier for the current conversation
    pub chat_id: Option<String>,
    /// Logical session key (`"<channel>:<chat_id>"`) for the request this
    /// tool call is part of, used by tools that need to scope state (memory
    /// retrieval, subagent announcements) to the originating conversation.
    pub session_key: Option<String>,
    /// Subset of tool names the caller is permitted to use for this request,
    /// e.g. the restricted tool list handed to a subagent. `None` means no
    /// restriction beyond what's registered.
    pub allowed_tools: Option<std::collections::HashSet<String>>,
}

/// Definition of a tool for LLM function calling
///
/// This structure represents the OpenAI-compatible function definition
/// format used to describe available tools to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    /// The type of tool (always "function" for now)
    pub r#type: String,
    /// Function metadata
    pub function: FunctionDefinition,
    /// Whether this tool is safe to run concurrently with other calls in the
    /// same batch. Non-parallel-safe tools (e.g. ones that mutate shared
    /// session/workspace state) are serialized by the registry.
    #[serde(skip)]
    pub parallel_safe: bool,
    /// Whether successful results may be served from the registry's cache.
    #[serde(skip)]
    pub cacheable: bool,
    /// How long a cached result stays fresh, in seconds, when `cacheable`.
    #[serde(skip)]
    pub cache_ttl_s: Option<u64>,
    /// Extra attempts the registry should make on a recoverable error before
    /// surfacing it to the caller.
    #[serde(skip)]
    pub max_retries: u32,
}

/// Function definition metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionDefinition {
    /// Tool name (unique identifier)
    pub name: String,
    /// Tool description for LLM
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Creates a new tool definition
    ///
    /// # Arguments
    /// * `name` - The unique name of the tool
    /// * `description` - Description of what the tool does
    /// * `parameters` - JSON Schema for the tool's parameters
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            r#type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
            parallel_safe: true,
            cacheable: false,
            cache_ttl_s: None,
            max_retries: 0,
        }
    }

    /// Get the tool name
    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Get the tool description
    pub fn description(&self) -> &str {
        &self.function.description
    }

    /// Get the parameters schema
    pub fn parameters(&self) -> &Value {
        &self.function.parameters
    }
}

/// Trait for implementing tools that the agent can use
///
/// Any type implementing this trait can be registered with the ToolRegistry
/// and made available to the agent for execution.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of the tool
    ///
    /// This name is used to identify the tool in the registry and when
    /// the LLM requests tool execution.
    fn name(&self) -> &str;

    /// Returns a description of what the tool does
    ///
    /// This description is provided to the LLM to help it understand
    /// when and how to use the tool.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for the tool's parameters
    ///
    /// The schema describes the expected parameters and their types,
    /// which the LLM uses to generate proper tool calls.
    fn parameters(&self) -> Value;

    /// Executes the tool with the given arguments
    ///
    /// # Arguments
    /// * `args` - A HashMap of parameter names to their JSON values
    /// * `ctx` - Execution context providing information about the current conversation
    ///
    /// # Returns
    /// * `Ok(String)` - The result of the tool execution as a string
    /// * `Err(ToolError)` - If execution fails
    async fn execute(
        &self,
        args: HashMap<String, Value>,
        ctx: &ToolExecutionContext,
    ) -> ToolResult<String>;

    /// Converts this tool to a ToolDefinition for LLM function calling
    ///
    /// This method generates the OpenAI-compatible function definition
    /// that describes this tool to the LLM.
    fn to_tool_definition(&self) -> ToolDefinition {
        let mut def = ToolDefinition::new(self.name(), self.description(), self.parameters());
        def.parallel_safe = self.parallel_safe();
        def.cacheable = self.cacheable();
        def.cache_ttl_s = self.cache_ttl_s();
        def.max_retries = self.max_retries();
        def
    }

    /// Whether two concurrently-requested calls to this tool may run at the
    /// same time. Tools that touch shared, order-sensitive state (sending a
    /// message, spawning a subagent) should return `false`.
    fn parallel_safe(&self) -> bool {
        true
    }

    /// Whether a successful result may be served from the registry's cache
    /// for identical arguments within `cache_ttl_s`.
    fn cacheable(&self) -> bool {
        false
    }

    /// Freshness window for cached results, in seconds. Ignored unless
    /// `cacheable()` is true.
    fn cache_ttl_s(&self) -> Option<u64> {
        None
    }

    /// Extra attempts the registry should make after a recoverable
    /// (`ToolError::is_recoverable`) failure before giving up.
    fn max_retries(&self) -> u32 {
        0
    }

    /// The cache key for a given argument set. Tools with inputs that don't
    /// round-trip through stable JSON serialization (e.g. containing
    /// non-deterministic defaults) can override this; the default is stable
    /// for any arguments that serialize deterministically.
    fn cache_key(&self, args: &HashMap<String, Value>) -> String {
        let mut keys: Vec<&String> = args.keys().collect();
        keys.sort();
        let mut key = String::from(self.name());
        for k in keys {
            key.push('\u{1}');
            key.push_str(k);
            key.push('\u{1}');
            key.push_str(&args[k].to_string());
        }
        key
    }
}
