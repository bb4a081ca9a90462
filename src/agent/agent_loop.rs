use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Mutex as TokioMutex, RwLock, Semaphore};

use crate::agent::metrics::ResponseMetrics;
use crate::agent::tools::{ToolCallRequest, ToolExecutionContext, ToolRegistry};
use crate::chat::{ChatHub, InboundMessage};
pub use crate::providers::{LlmMessage, LlmProvider, LlmResponse, LlmRole, LlmToolCall};
use crate::session::{session_key, Session, SessionManager};

/// Default per-message iteration cap (a chat turn rarely needs more tool
/// round-trips than this; subagents use a tighter budget of their own).
pub const MAX_ITERATIONS: u32 = 25;

/// Default number of messages allowed to run concurrently across sessions.
pub const DEFAULT_MAX_CONCURRENT_MESSAGES: usize = 8;

/// Consecutive tool-error results before the loop gives up on an iteration.
pub const DEFAULT_TOOL_ERROR_BACKOFF: u32 = 3;

/// Target response time (95th percentile) in milliseconds
pub const TARGET_RESPONSE_TIME_P95_MS: u128 = 2000;

/// Errors that can occur during agent loop execution
#[derive(thiserror::Error, Debug)]
pub enum AgentError {
    #[error("Context building failed: {0}")]
    ContextBuildError(String),

    #[error("LLM communication failed: {0}")]
    LlmError(String),

    #[error("Max iterations ({0}) reached")]
    MaxIterationsReached(u32),

    #[error("Tool execution failed: {0}")]
    ToolExecutionError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Chat hub error: {0}")]
    ChatHubError(String),
}

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Trait for building context from various sources
#[async_trait::async_trait]
pub trait ContextBuilder: Send + Sync {
    /// Assemble the complete context for a conversation
    async fn build_context(
        &self,
        session: &Session,
        current_message: &InboundMessage,
    ) -> Result<Vec<LlmMessage>>;
}

/// The main agent loop that orchestrates message processing.
///
/// Enforces per-session FIFO with bounded cross-session parallelism: a new
/// message for a session key waits on that key's tail before acquiring a
/// slot in the global semaphore, guaranteeing in-order processing within a
/// conversation while letting unrelated conversations run concurrently.
pub struct AgentLoop {
    chat_hub: Arc<ChatHub>,
    llm_provider: Arc<dyn LlmProvider>,
    context_builder: Arc<dyn ContextBuilder>,
    tool_registry: Arc<ToolRegistry>,
    session_manager: Arc<RwLock<SessionManager>>,
    max_iterations: u32,
    tool_error_backoff: u32,
    model: String,
    response_metrics: Arc<ResponseMetrics>,
    inbound_rx: Mutex<Option<mpsc::Receiver<InboundMessage>>>,
    tails: Mutex<HashMap<String, Arc<TokioMutex<()>>>>,
    concurrency: Arc<Semaphore>,
}

impl AgentLoop {
    /// Creates a new AgentLoop with the required dependencies
    pub fn new(
        chat_hub: Arc<ChatHub>,
        llm_provider: Arc<dyn LlmProvider>,
        context_builder: Arc<dyn ContextBuilder>,
        tool_registry: Arc<ToolRegistry>,
        session_manager: Arc<RwLock<SessionManager>>,
    ) -> Self {
        let model = llm_provider.default_model();
        Self::build(
            chat_hub,
            llm_provider,
            context_builder,
            tool_registry,
            session_manager,
            model,
            None,
        )
    }

    /// Creates a new AgentLoop with an inbound message receiver
    pub fn with_inbound_receiver(
        chat_hub: Arc<ChatHub>,
        llm_provider: Arc<dyn LlmProvider>,
        context_builder: Arc<dyn ContextBuilder>,
        tool_registry: Arc<ToolRegistry>,
        session_manager: Arc<RwLock<SessionManager>>,
        inbound_rx: mpsc::Receiver<InboundMessage>,
    ) -> Self {
        let model = llm_provider.default_model();
        Self::build(
            chat_hub,
            llm_provider,
            context_builder,
            tool_registry,
            session_manager,
            model,
            Some(inbound_rx),
        )
    }

    /// Creates a new AgentLoop with a specific model override
    pub fn with_model(
        chat_hub: Arc<ChatHub>,
        llm_provider: Arc<dyn LlmProvider>,
        context_builder: Arc<dyn ContextBuilder>,
        tool_registry: Arc<ToolRegistry>,
        session_manager: Arc<RwLock<SessionManager>>,
        model: impl Into<String>,
    ) -> Self {
        Self::build(
            chat_hub,
            llm_provider,
            context_builder,
            tool_registry,
            session_manager,
            model.into(),
            None,
        )
    }

    /// Creates a new AgentLoop with a specific model override and inbound receiver
    pub fn with_model_and_receiver(
        chat_hub: Arc<ChatHub>,
        llm_provider: Arc<dyn LlmProvider>,
        context_builder: Arc<dyn ContextBuilder>,
        tool_registry: Arc<ToolRegistry>,
        session_manager: Arc<RwLock<SessionManager>>,
        model: impl Into<String>,
        inbound_rx: mpsc::Receiver<InboundMessage>,
    ) -> Self {
        Self::build(
            chat_hub,
            llm_provider,
            context_builder,
            tool_registry,
            session_manager,
            model.into(),
            Some(inbound_rx),
        )
    }

    fn build(
        chat_hub: Arc<ChatHub>,
        llm_provider: Arc<dyn LlmProvider>,
        context_builder: Arc<dyn ContextBuilder>,
        tool_registry: Arc<ToolRegistry>,
        session_manager: Arc<RwLock<SessionManager>>,
        model: String,
        inbound_rx: Option<mpsc::Receiver<InboundMessage>>,
    ) -> Self {
        Self {
            chat_hub,
            llm_provider,
            context_builder,
            tool_registry,
            session_manager,
            max_iterations: MAX_ITERATIONS,
            tool_error_backoff: DEFAULT_TOOL_ERROR_BACKOFF,
            model,
            response_metrics: Arc::new(ResponseMetrics::new()),
            inbound_rx: Mutex::new(inbound_rx),
            tails: Mutex::new(HashMap::new()),
            concurrency: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_MESSAGES)),
        }
    }

    /// Returns the maximum iterations limit
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Returns the current model being used
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Overrides the global concurrency cap (number of sessions processed in
    /// parallel). Only meaningful before `run` starts consuming the inbound
    /// channel.
    pub fn with_max_concurrent_messages(mut self, max_concurrent: usize) -> Self {
        self.concurrency = Arc::new(Semaphore::new(max_concurrent.max(1)));
        self
    }

    /// Gets (or lazily creates) the FIFO tail lock for a session key.
    fn session_tail(&self, key: &str) -> Arc<TokioMutex<()>> {
        let mut tails = self.tails.lock().unwrap();
        tails
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(TokioMutex::new(())))
            .clone()
    }

    /// Drops a tail entry once nothing else is waiting behind it.
    fn release_tail(&self, key: &str, tail: Arc<TokioMutex<()>>) {
        let mut tails = self.tails.lock().unwrap();
        if let Some(entry) = tails.get(key) {
            if Arc::strong_count(entry) == 2 && Arc::ptr_eq(entry, &tail) {
                tails.remove(key);
            }
        }
    }

    /// Processes a single inbound message through the agent loop, honoring
    /// per-session FIFO ordering and the global concurrency cap.
    pub async fn process_message(&self, message: InboundMessage) -> Result<String> {
        let session_key = session_key(&message.channel, &message.chat_id);
        let tail = self.session_tail(&session_key);
        let _session_guard = tail.lock().await;

        let _permit = self
            .concurrency
            .acquire()
            .await
            .map_err(|e| AgentError::ChatHubError(e.to_string()))?;

        let result = self.process_message_locked(&session_key, message).await;

        drop(_permit);
        drop(_session_guard);
        self.release_tail(&session_key, tail);

        result
    }

    async fn process_message_locked(&self, session_key: &str, message: InboundMessage) -> Result<String> {
        let msg_start = std::time::Instant::now();

        tracing::debug!(
            session_key = %session_key,
            channel = %message.channel,
            chat_id = %message.chat_id,
            "Starting message processing"
        );

        let mut session = self
            .get_or_create_session(&message.channel, &message.chat_id)
            .await?;

        let user_message = crate::session::Message::new("user".to_string(), message.content.clone());
        session.add_message(user_message);

        let context_start = std::time::Instant::now();
        let context = self
            .context_builder
            .build_context(&session, &message)
            .await?;
        let context_time = context_start.elapsed();

        tracing::debug!(
            session_key = %session_key,
            context_messages = context.len(),
            context_ms = context_time.as_millis(),
            "Context built"
        );

        let exec_ctx = ToolExecutionContext {
            channel: Some(message.channel.clone()),
            chat_id: Some(message.chat_id.clone()),
            session_key: Some(session_key.to_string()),
            allowed_tools: session_allowed_tools(&session),
        };

        let response = self
            .run_agent_loop(session_key, &mut session, context, &exec_ctx)
            .await?;

        let response_time = msg_start.elapsed();
        self.response_metrics.record(response_time);

        if let (Some(p95), Some(avg)) = (
            self.response_metrics.percentile_95(),
            self.response_metrics.average(),
        ) {
            tracing::debug!(
                response_ms = response_time.as_millis(),
                p95_ms = p95,
                avg_ms = avg,
                sample_count = self.response_metrics.sample_count(),
                session_key = %session_key,
                "Message processed"
            );

            if p95 > TARGET_RESPONSE_TIME_P95_MS {
                tracing::warn!(
                    p95_ms = p95,
                    target_ms = TARGET_RESPONSE_TIME_P95_MS,
                    "Response time 95th percentile exceeds target"
                );
            }
        }

        Ok(response)
    }

    async fn get_or_create_session(&self, channel: &str, chat_id: &str) -> Result<Session> {
        let session_manager = self.session_manager.read().await;

        session_manager
            .get_or_create_session(channel, chat_id)
            .await
            .map_err(|e| AgentError::SessionError(e.to_string()))
    }

    /// Runs the tool-use loop: call the provider, execute any tool calls it
    /// asked for, repeat until a text-only response or a stop condition
    /// fires (max iterations, tool-error streak).
    async fn run_agent_loop(
        &self,
        session_key: &str,
        session: &mut Session,
        mut context: Vec<LlmMessage>,
        exec_ctx: &ToolExecutionContext,
    ) -> Result<String> {
        let mut iteration: u32 = 0;
        let mut tool_error_streak: u32 = 0;
        let mut nudged = false;
        let mut final_content: Option<String> = None;

        loop {
            if iteration >= self.max_iterations {
                tracing::warn!(session_key = %session_key, iterations = iteration, "Max iterations reached");
                final_content = Some(
                    "I've hit my iteration limit on this task and am stopping here.".to_string(),
                );
                break;
            }
            iteration += 1;

            let tools = self.tool_registry.get_tool_definitions().await;
            let llm_response = self
                .llm_provider
                .chat(context.clone(), tools, &self.model)
                .await
                .map_err(|e| AgentError::LlmError(e.to_string()))?;

            if let Some(tool_calls) = llm_response.tool_calls.clone() {
                tracing::info!(session_key = %session_key, tool_count = tool_calls.len(), "LLM requested tools");

                let session_tool_calls: Vec<crate::session::ToolCall> = tool_calls
                    .iter()
                    .map(|tc| crate::session::ToolCall {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        arguments: tc.arguments.clone(),
                    })
                    .collect();

                context.push(LlmMessage {
                    role: LlmRole::Assistant,
                    content: llm_response.content.clone(),
                    tool_calls: Some(tool_calls.clone()),
                });
                session.add_message(
                    crate::session::Message::new("assistant".to_string(), llm_response.content.clone())
                        .with_tool_calls(session_tool_calls),
                );

                let calls = match to_call_requests(&tool_calls) {
                    Ok(calls) => calls,
                    Err(e) => return Err(e),
                };

                let results = self.tool_registry.execute_calls(calls, exec_ctx).await;
                let results_by_id: HashMap<String, String> = results.into_iter().collect();

                for tool_call in &tool_calls {
                    let result = results_by_id
                        .get(&tool_call.id)
                        .cloned()
                        .unwrap_or_else(|| "error: tool produced no result".to_string());

                    if result.starts_with("error:") || result.starts_with("warning:") {
                        tool_error_streak += 1;
                    } else {
                        tool_error_streak = 0;
                    }

                    context.push(LlmMessage {
                        role: LlmRole::Tool,
                        content: result.clone(),
                        tool_calls: None,
                    });
                    session.add_message(crate::session::Message::tool_result(result));
                }

                if tool_error_streak >= self.tool_error_backoff {
                    tracing::warn!(session_key = %session_key, streak = tool_error_streak, "Tool error streak exceeded, aborting");
                    final_content = Some(
                        "I ran into repeated tool errors and am stopping to avoid looping.".to_string(),
                    );
                    break;
                }

                continue;
            }

            if llm_response.content.trim().is_empty() && !nudged {
                nudged = true;
                context.push(LlmMessage {
                    role: LlmRole::User,
                    content: "Please reply with a brief summary of what you did.".to_string(),
                    tool_calls: None,
                });
                continue;
            }

            final_content = Some(if llm_response.content.trim().is_empty() {
                "I've completed processing but have no response to give.".to_string()
            } else {
                llm_response.content.clone()
            });
            break;
        }

        let final_content = final_content
            .unwrap_or_else(|| "I've completed processing but have no response to give.".to_string());

        session.add_message(crate::session::Message::new(
            "assistant".to_string(),
            final_content.clone(),
        ));
        self.save_session(session).await?;

        Ok(final_content)
    }

    /// Saves the session to persistent storage
    async fn save_session(&self, session: &Session) -> Result<()> {
        let session_manager = self.session_manager.read().await;

        session_manager
            .update_session(session.clone())
            .await
            .map_err(|e| AgentError::SessionError(e.to_string()))?;

        if let Err(e) = session_manager.persist_session(session).await {
            tracing::error!(
                session_id = %session.session_id,
                error = %e,
                "Failed to persist session to disk - will retry on next auto-persistence cycle"
            );
        }

        Ok(())
    }

    /// Runs the agent loop continuously, processing messages from the chat hub
    pub async fn run(&self) -> Result<()> {
        let mut shutdown_signal = std::pin::pin!(tokio::signal::ctrl_c());

        let mut inbound_rx = match self.inbound_rx.lock().unwrap().take() {
            Some(rx) => {
                tracing::info!("Agent loop started, processing messages");
                rx
            }
            None => {
                tracing::error!("AgentLoop started without inbound receiver - cannot process messages");
                return Err(AgentError::ChatHubError(
                    "No inbound receiver configured".to_string(),
                ));
            }
        };

        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    tracing::info!("Received shutdown signal, stopping agent loop");
                    break;
                }

                Some(msg) = inbound_rx.recv() => {
                    let target_channel = origin_channel(&msg);
                    let target_chat_id = origin_chat_id(&msg);

                    match self.process_message(msg).await {
                        Ok(response) => {
                            if let Err(e) = self.chat_hub.reply(target_channel, target_chat_id, response).await {
                                tracing::error!(error = %e, "Failed to send response");
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Message processing failed");
                        }
                    }
                }

                else => {
                    tracing::warn!("Inbound channel closed, stopping agent loop");
                    break;
                }
            }
        }

        tracing::info!("Agent loop stopped");
        Ok(())
    }
}

/// `system`-channel messages carry the real destination as
/// `"<channel>:<chat_id>"` in their own `chat_id` field (see the Subagent
/// Manager's completion notice); everything else routes back to its own
/// origin.
fn origin_channel(msg: &InboundMessage) -> String {
    if msg.channel == "system" {
        if let Some((channel, _)) = msg.chat_id.split_once(':') {
            return channel.to_string();
        }
    }
    msg.channel.clone()
}

fn origin_chat_id(msg: &InboundMessage) -> String {
    if msg.channel == "system" {
        if let Some((_, chat_id)) = msg.chat_id.split_once(':') {
            return chat_id.to_string();
        }
    }
    msg.chat_id.clone()
}

fn session_allowed_tools(session: &Session) -> Option<std::collections::HashSet<String>> {
    session
        .metadata
        .get("allowed_tools")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
}

fn to_call_requests(tool_calls: &[LlmToolCall]) -> Result<Vec<ToolCallRequest>> {
    tool_calls
        .iter()
        .map(|tc| {
            let args: HashMap<String, serde_json::Value> = serde_json::from_str(&tc.arguments)
                .map_err(|e| {
                    AgentError::ToolExecutionError(format!("Failed to parse tool arguments: {}", e))
                })?;
            Ok(ToolCallRequest {
                id: tc.id.clone(),
                name: tc.name.clone(),
                arguments: args,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;

    struct MockLlmProvider;

    #[async_trait::async_trait]
    impl LlmProvider for MockLlmProvider {
        async fn chat(
            &self,
            _messages: Vec<LlmMessage>,
            _tools: Vec<serde_json::Value>,
            _model: &str,
        ) -> std::result::Result<LlmResponse, ProviderError> {
            Ok(LlmResponse {
                content: "Test response".to_string(),
                tool_calls: None,
                prompt_tokens: None,
                completion_tokens: None,
            })
        }

        fn default_model(&self) -> String {
            "test-model".to_string()
        }

        fn provider_name(&self) -> &'static str {
            "MockLlmProvider"
        }

        async fn list_models(&self) -> std::result::Result<Vec<crate::providers::ModelInfo>, ProviderError> {
            Ok(vec![crate::providers::ModelInfo::new("test-model", false)])
        }
    }

    struct MockContextBuilder;

    #[async_trait::async_trait]
    impl ContextBuilder for MockContextBuilder {
        async fn build_context(
            &self,
            _session: &Session,
            _current_message: &InboundMessage,
        ) -> Result<Vec<LlmMessage>> {
            Ok(vec![])
        }
    }

    fn make_agent_loop() -> AgentLoop {
        let chat_hub = Arc::new(ChatHub::new());
        let llm_provider: Arc<dyn LlmProvider> = Arc::new(MockLlmProvider);
        let context_builder: Arc<dyn ContextBuilder> = Arc::new(MockContextBuilder);
        let tool_registry = Arc::new(ToolRegistry::new());
        let session_manager = Arc::new(RwLock::new(SessionManager::new(std::path::PathBuf::from(
            "/tmp/sessions",
        ))));

        AgentLoop::new(
            chat_hub,
            llm_provider,
            context_builder,
            tool_registry,
            session_manager,
        )
    }

    #[test]
    fn test_agent_loop_creation() {
        let agent = make_agent_loop();
        assert_eq!(agent.max_iterations(), MAX_ITERATIONS);
        assert_eq!(agent.model(), "test-model");
    }

    #[tokio::test]
    async fn test_process_message_end_to_end() {
        let agent = make_agent_loop();
        let message = InboundMessage::new("cli", "user-1", "hello");
        let response = agent.process_message(message).await.unwrap();
        assert_eq!(response, "Test response");
    }

    #[tokio::test]
    async fn test_process_message_clears_tail_after_completion() {
        let agent = make_agent_loop();
        let message = InboundMessage::new("cli", "user-1", "hello");
        agent.process_message(message).await.unwrap();
        assert!(agent.tails.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_same_session_processed_in_fifo_order() {
        let agent = Arc::new(make_agent_loop());
        let a = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move {
                agent
                    .process_message(InboundMessage::new("cli", "same", "first"))
                    .await
            })
        };
        let b = {
            let agent = Arc::clone(&agent);
            tokio::spawn(async move {
                agent
                    .process_message(InboundMessage::new("cli", "same", "second"))
                    .await
            })
        };

        let (a, b) = tokio::join!(a, b);
        assert!(a.unwrap().is_ok());
        assert!(b.unwrap().is_ok());
    }

    #[test]
    fn test_origin_routing_for_system_channel() {
        let msg = InboundMessage::new("system", "telegram:123", "done");
        assert_eq!(origin_channel(&msg), "telegram");
        assert_eq!(origin_chat_id(&msg), "123");
    }

    #[test]
    fn test_origin_routing_passthrough_for_normal_channel() {
        let msg = InboundMessage::new("telegram", "123", "hi");
        assert_eq!(origin_channel(&msg), "telegram");
        assert_eq!(origin_chat_id(&msg), "123");
    }

    #[test]
    fn test_agent_error_display() {
        let err = AgentError::MaxIterationsReached(25);
        assert_eq!(err.to_string(), "Max iterations (25) reached");

        let err = AgentError::ToolExecutionError("test error".to_string());
        assert_eq!(err.to_string(), "Tool execution failed: test error");
    }

    #[test]
    fn test_session_fifo_with_tool_interactions() {
        let mut session = Session::new("telegram".to_string(), "123".to_string());

        for i in 0..25 {
            session.add_message(crate::session::Message::new(
                "user".to_string(),
                format!("Message {}", i),
            ));
            session.add_message(crate::session::Message::new(
                "assistant".to_string(),
                format!("Response {}", i),
            ));
        }
        assert_eq!(session.messages.len(), 50);

        session.add_message(crate::session::Message::new(
            "user".to_string(),
            "Overflow message".to_string(),
        ));

        assert_eq!(session.messages.len(), 50);
        assert_eq!(session.messages[49].content, "Overflow message");
    }
}
