//! Tool system for miniclaw
//!
//! This module provides the tool trait, registry, and implementations
//! for tools that the agent can use to perform actions.

pub mod cron;
pub mod exec;
pub mod filesystem;
pub mod memory;
pub mod message;
pub mod security;
pub mod skill;
pub mod spawn;
pub mod types;
pub mod web;

pub mod subagent_control;

// Re-export types from types module for backward compatibility
pub use types::{
    Tool, ToolCallRequest, ToolDefinition, ToolError, ToolExecutionContext, ToolResult,
    validate_args_against_schema,
};

use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock, Semaphore};

/// Upper bound on tool calls executed concurrently within one batch, shared
/// across all callers of `execute_calls`.
const MAX_PARALLEL_TOOL_CALLS: usize = 8;

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Registry for managing available tools
///
/// The ToolRegistry stores and manages all tools available to the agent.
/// It provides methods for registering, retrieving, and listing tools,
/// as well as generating tool definitions for LLM function calling.
///
/// # Thread Safety
///
/// ToolRegistry uses RwLock internally for thread-safe concurrent access.
/// Multiple threads can read simultaneously, but writes are exclusive.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Box<dyn Tool>>>>,
    // Cache for tool definitions to avoid re-serialization
    definitions_cache: Arc<RwLock<Option<Vec<Value>>>>,
    // Cached successful results, keyed by `Tool::cache_key`.
    result_cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
    // Per-cache-key locks. The first caller for a key executes the tool and
    // populates `result_cache`; concurrent callers for the same key block on
    // the same lock and then read the now-populated cache instead of also
    // executing, de-duplicating in-flight identical calls.
    call_locks: Arc<RwLock<HashMap<String, Arc<Mutex<()>>>>>,
    // Bounds how many parallel-safe calls run concurrently within one
    // `execute_calls` batch.
    parallel_limit: Arc<Semaphore>,
}

impl ToolRegistry {
    /// Creates a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
            definitions_cache: Arc::new(RwLock::new(None)),
            result_cache: Arc::new(RwLock::new(HashMap::new())),
            call_locks: Arc::new(RwLock::new(HashMap::new())),
            parallel_limit: Arc::new(Semaphore::new(MAX_PARALLEL_TOOL_CALLS)),
        }
    }

    /// Creates a new registry with default tools pre-registered
    ///
    /// # Arguments
    /// * `hub` - The ChatHub for sending messages
    /// * `default_channel` - The default channel to use for message tool
    pub async fn with_default_tools(
        hub: std::sync::Arc<crate::chat::ChatHub>,
        default_channel: impl Into<String>,
    ) -> Self {
        let registry = Self::new();
        registry
            .register(Box::new(crate::agent::tools::message::MessageTool::new(
                hub,
                default_channel,
            )))
            .await
            .expect("default tool registration must succeed");
        registry
    }

    /// Creates a new registry with all default tools pre-registered
    ///
    /// # Arguments
    /// * `workspace_path` - The workspace directory for tools that need filesystem access
    /// * `chat_hub` - The ChatHub for the message tool
    /// * `default_channel` - The default channel to use for the message tool
    ///
    /// # Returns
    /// A ToolRegistry with all default tools registered. If a tool fails to register,
    /// a warning is logged and the registry continues without that tool (graceful degradation).
    pub async fn with_all_default_tools(
        workspace_path: PathBuf,
        chat_hub: Arc<crate::chat::ChatHub>,
        default_channel: impl Into<String>,
        subagent_manager: Option<Arc<crate::agent::subagent::SubagentManager>>,
        cron_scheduler: Option<crate::cron::CronScheduler>,
    ) -> Self {
        let registry = Self::new();
        let default_channel = default_channel.into();

        // Register filesystem tool
        if let Err(e) = registry
            .register(Box::new(
                crate::agent::tools::filesystem::FilesystemTool::new(workspace_path.clone()),
            ))
            .await
        {
            tracing::warn!(error = %e, "Failed to register filesystem tool, continuing without it");
        }

        // Register exec tool
        match crate::agent::tools::exec::ExecTool::new(workspace_path.clone()) {
            Ok(exec_tool) => {
                if let Err(e) = registry.register(Box::new(exec_tool)).await {
                    tracing::warn!(error = %e, "Failed to register exec tool, continuing without it");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create exec tool, continuing without it");
            }
        }

        // Register web tool
        if let Err(e) = registry
            .register(Box::new(crate::agent::tools::web::WebTool::new()))
            .await
        {
            tracing::warn!(error = %e, "Failed to register web tool, continuing without it");
        }

        // Register cron tool against the caller's scheduler (shared with
        // whatever starts its background tick loop), or a fresh in-memory
        // one with no running loop behind it (one-shot CLI path).
        let cron_scheduler = cron_scheduler.unwrap_or_default();
        let cron_tool = crate::agent::tools::cron::CronTool::new(cron_scheduler);

        if let Err(e) = registry.register(Box::new(cron_tool)).await {
            tracing::warn!(error = %e, "Failed to register cron tool, continuing without it");
        }

        // Register memory tool
        match crate::agent::tools::memory::MemoryTool::new(workspace_path.clone()) {
            Ok(memory_tool) => {
                if let Err(e) = registry.register(Box::new(memory_tool)).await {
                    tracing::warn!(error = %e, "Failed to register memory tool, continuing without it");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create memory tool, continuing without it");
            }
        }

        // Register skill management tools
        if let Err(e) = registry
            .register(Box::new(crate::agent::tools::skill::CreateSkillTool::new(
                workspace_path.clone(),
            )))
            .await
        {
            tracing::warn!(error = %e, "Failed to register create_skill tool, continuing without it");
        }

        if let Err(e) = registry
            .register(Box::new(crate::agent::tools::skill::ListSkillsTool::new(
                workspace_path.clone(),
            )))
            .await
        {
            tracing::warn!(error = %e, "Failed to register list_skills tool, continuing without it");
        }

        if let Err(e) = registry
            .register(Box::new(crate::agent::tools::skill::ReadSkillTool::new(
                workspace_path.clone(),
            )))
            .await
        {
            tracing::warn!(error = %e, "Failed to register read_skill tool, continuing without it");
        }

        if let Err(e) = registry
            .register(Box::new(crate::agent::tools::skill::DeleteSkillTool::new(
                workspace_path.clone(),
            )))
            .await
        {
            tracing::warn!(error = %e, "Failed to register delete_skill tool, continuing without it");
        }

        // Register message tool
        if let Err(e) = registry
            .register(Box::new(crate::agent::tools::message::MessageTool::new(
                chat_hub,
                default_channel,
            )))
            .await
        {
            tracing::warn!(error = %e, "Failed to register message tool, continuing without it");
        }

        // Register spawn + subagent control tools, if the caller wired up a manager
        if let Some(manager) = subagent_manager {
            if let Err(e) = registry
                .register(Box::new(crate::agent::tools::spawn::SpawnTool::new(
                    manager.clone(),
                )))
                .await
            {
                tracing::warn!(error = %e, "Failed to register spawn tool, continuing without it");
            }

            if let Err(e) = registry
                .register(Box::new(
                    crate::agent::tools::subagent_control::SubagentControlTool::new(manager),
                ))
                .await
            {
                tracing::warn!(error = %e, "Failed to register subagent_control tool, continuing without it");
            }
        }

        let tool_count = registry.len().await;
        tracing::info!(
            tool_count = tool_count,
            "Tool registry initialized with default tools"
        );

        registry
    }

    /// Registers a tool in the registry
    ///
    /// # Arguments
    /// * `tool` - The tool to register
    ///
    /// # Errors
    /// Returns `ToolError::ExecutionFailed` if a tool with the same name is already registered
    pub async fn register(&self, tool: Box<dyn Tool>) -> types::ToolResult<()> {
        let name = tool.name().to_string();

        let mut tools = self.tools.write().await;

        if tools.contains_key(&name) {
            return Err(ToolError::ExecutionFailed {
                tool: name.clone(),
                message: format!(
                    "Tool '{}' is already registered. Suggestion: Use a different name like '{}_v2' or '{}_{}'",
                    name, name, name, "alt"
                ),
            });
        }

        tools.insert(name, tool);

        // Invalidate cache
        let mut cache = self.definitions_cache.write().await;
        *cache = None;

        Ok(())
    }

    /// Unregisters a tool from the registry
    ///
    /// # Arguments
    /// * `name` - The name of the tool to unregister
    ///
    /// # Returns
    /// `true` if the tool was found and removed, `false` otherwise
    pub async fn unregister(&self, name: &str) -> bool {
        let mut tools = self.tools.write().await;
        let removed = tools.remove(name).is_some();

        if removed {
            // Invalidate cache
            let mut cache = self.definitions_cache.write().await;
            *cache = None;
        }

        removed
    }

    /// Checks if a tool is registered
    ///
    /// # Arguments
    /// * `name` - The name of the tool to check
    pub async fn contains(&self, name: &str) -> bool {
        let tools = self.tools.read().await;
        tools.contains_key(name)
    }

    /// Lists all registered tools with their names, descriptions, and parameter schemas
    ///
    /// # Returns
    /// A vector of tuples containing (name, description, parameters) for each tool
    pub async fn list_tools(&self) -> Vec<(String, String, Value)> {
        let tools = self.tools.read().await;
        tools
            .values()
            .map(|t| {
                (
                    t.name().to_string(),
                    t.description().to_string(),
                    t.parameters(),
                )
            })
            .collect()
    }

    /// Returns the number of registered tools
    pub async fn len(&self) -> usize {
        let tools = self.tools.read().await;
        tools.len()
    }

    /// Checks if the registry is empty
    pub async fn is_empty(&self) -> bool {
        let tools = self.tools.read().await;
        tools.is_empty()
    }

    /// Returns all tool definitions formatted for LLM function calling
    ///
    /// Converts all registered tools to OpenAI-compatible function definitions
    /// for use in LLM API calls.
    ///
    /// # Caching
    /// Results are cached after first call. Cache is invalidated on register/unregister.
    pub async fn get_tool_definitions(&self) -> Vec<Value> {
        // Check cache first
        {
            let cache = self.definitions_cache.read().await;
            if let Some(ref cached) = *cache {
                return cached.clone();
            }
        }

        // Generate definitions
        let tools = self.tools.read().await;
        let definitions: Vec<Value> = tools
            .values()
            .map(|tool| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": tool.name(),
                        "description": tool.description(),
                        "parameters": tool.parameters(),
                        "strict": false
                    }
                })
            })
            .collect();

        // Update cache
        {
            let mut cache = self.definitions_cache.write().await;
            *cache = Some(definitions.clone());
        }

        definitions
    }

    /// Returns all tools as ToolDefinition structs
    ///
    /// Similar to `get_tool_definitions()` but returns strongly-typed
    /// ToolDefinition structs instead of JSON values.
    pub async fn get_definitions(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        tools
            .values()
            .map(|tool| tool.to_tool_definition())
            .collect()
    }

    /// Executes a tool by name with the given arguments
    ///
    /// # Arguments
    /// * `name` - The name of the tool to execute
    /// * `args` - Arguments to pass to the tool
    /// * `ctx` - Execution context
    ///
    /// # Returns
    /// The tool's result as a string, or an error if execution fails
    ///
    /// # Validation
    /// This method validates arguments against the tool's schema before execution
    ///
    /// # Timeout
    /// Tool execution has a 30-second timeout by default
    #[allow(clippy::await_holding_lock)]
    pub async fn execute_tool(
        &self,
        name: &str,
        args: HashMap<String, Value>,
        ctx: &ToolExecutionContext,
    ) -> types::ToolResult<String> {
        self.execute_tool_with_timeout(name, args, ctx, Duration::from_secs(30))
            .await
    }

    /// Executes a tool with a custom timeout
    ///
    /// # Arguments
    /// * `name` - The name of the tool to execute
    /// * `args` - Arguments to pass to the tool
    /// * `ctx` - Execution context
    /// * `timeout` - Maximum duration for tool execution
    ///
    /// # Returns
    /// The tool's result as a string, or an error if execution fails or times out
    #[allow(clippy::await_holding_lock)]
    pub async fn execute_tool_with_timeout(
        &self,
        name: &str,
        args: HashMap<String, Value>,
        ctx: &ToolExecutionContext,
        timeout: Duration,
    ) -> types::ToolResult<String> {
        // Get tool schema and validate args (under read lock)
        let schema = {
            let tools = self.tools.read().await;
            let tool = tools
                .get(name)
                .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
            tool.parameters()
        };

        validate_args_against_schema(&args, &schema, name)?;

        // Get the tool and clone it for execution
        // With tokio::sync::RwLock, the guard is Send so we can hold it across await
        let tools = self.tools.read().await;
        let tool = tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        // Execute with timeout
        match tokio::time::timeout(timeout, tool.execute(args, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout {
                tool: name.to_string(),
                duration: timeout.as_secs(),
            }),
        }
    }

    /// Permission-checked, cached, retried execution of a single call. If the
    /// tool is restricted by `ctx.allowed_tools` and not on the list, returns
    /// a `PermissionDenied` without ever looking it up in the registry.
    async fn execute_checked(
        &self,
        name: &str,
        args: HashMap<String, Value>,
        ctx: &ToolExecutionContext,
    ) -> types::ToolResult<String> {
        if let Some(allowed) = &ctx.allowed_tools {
            if !allowed.contains(name) {
                return Err(ToolError::PermissionDenied {
                    tool: name.to_string(),
                    message: "tool is not available in this execution scope".to_string(),
                });
            }
        }

        let (cacheable, cache_ttl_s, max_retries, cache_key) = {
            let tools = self.tools.read().await;
            let tool = tools
                .get(name)
                .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
            (
                tool.cacheable(),
                tool.cache_ttl_s(),
                tool.max_retries(),
                tool.cache_key(&args),
            )
        };

        if !cacheable {
            return self.execute_with_retry(name, args, ctx, max_retries).await;
        }

        if let Some(hit) = self.cache_lookup(&cache_key).await {
            return Ok(hit);
        }

        let lock = {
            let mut locks = self.call_locks.write().await;
            locks
                .entry(cache_key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        // A concurrent caller for the same key may have populated the cache
        // while we waited on the lock.
        if let Some(hit) = self.cache_lookup(&cache_key).await {
            return Ok(hit);
        }

        let result = self.execute_with_retry(name, args, ctx, max_retries).await;
        if let Ok(value) = &result {
            if let Some(ttl) = cache_ttl_s {
                let mut cache = self.result_cache.write().await;
                cache.insert(
                    cache_key,
                    CacheEntry {
                        value: value.clone(),
                        expires_at: Instant::now() + Duration::from_secs(ttl),
                    },
                );
            }
        }
        result
    }

    async fn cache_lookup(&self, cache_key: &str) -> Option<String> {
        let cache = self.result_cache.read().await;
        cache.get(cache_key).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    async fn execute_with_retry(
        &self,
        name: &str,
        args: HashMap<String, Value>,
        ctx: &ToolExecutionContext,
        max_retries: u32,
    ) -> types::ToolResult<String> {
        let mut attempt = 0;
        loop {
            match self
                .execute_tool_with_timeout(name, args.clone(), ctx, Duration::from_secs(30))
                .await
            {
                Ok(v) => return Ok(v),
                Err(e) if e.is_recoverable() && attempt < max_retries => {
                    attempt += 1;
                    tracing::warn!(tool = %name, attempt, error = %e, "retrying recoverable tool error");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs a batch of tool calls. Calls from tools that report
    /// `parallel_safe() == true` run concurrently (bounded by a shared
    /// semaphore); calls from non-parallel-safe tools run one at a time, in
    /// the order the LLM requested them, after the parallel-safe ones have
    /// been dispatched. Returns `(call_id, result_string)` pairs in
    /// completion order.
    pub async fn execute_calls(
        &self,
        calls: Vec<ToolCallRequest>,
        ctx: &ToolExecutionContext,
    ) -> Vec<(String, String)> {
        let mut parallel_safe = Vec::new();
        let mut serial = Vec::new();

        for call in calls {
            let safe = {
                let tools = self.tools.read().await;
                tools.get(&call.name).map(|t| t.parallel_safe()).unwrap_or(true)
            };
            if safe {
                parallel_safe.push(call);
            } else {
                serial.push(call);
            }
        }

        let mut results = Vec::new();

        if !parallel_safe.is_empty() {
            use futures::stream::{FuturesUnordered, StreamExt};
            let mut futures = FuturesUnordered::new();
            for call in parallel_safe {
                let registry = self.clone();
                let ctx = ctx.clone();
                let permit = self.parallel_limit.clone();
                futures.push(async move {
                    let _permit = permit.acquire_owned().await.ok();
                    let result = registry.execute_checked(&call.name, call.arguments, &ctx).await;
                    (call.id, format_tool_result(&call.name, result))
                });
            }
            while let Some(r) = futures.next().await {
                results.push(r);
            }
        }

        for call in serial {
            let result = self.execute_checked(&call.name, call.arguments, ctx).await;
            results.push((call.id.clone(), format_tool_result(&call.name, result)));
        }

        results
    }
}

fn format_tool_result(name: &str, result: types::ToolResult<String>) -> String {
    match result {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(tool = %name, error = %e, "tool execution failed");
            format!("Error executing tool '{}': {}", name, e)
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
