//! Background subagent execution
//!
//! A subagent is a short-lived, isolated agent loop spawned to complete one
//! task in the background while the main agent keeps serving the
//! conversation it was spawned from. It shares the LLM provider with the
//! main agent but gets its own tool registry (no `message`/`spawn`/`cron`
//! tools — it cannot talk to users or start more background work) and a
//! focused system prompt. When it finishes, it announces its result back
//! onto the bus as a system-origin inbound message so the main agent can
//! summarize it for the user.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::agent::tools::types::{ToolCallRequest, ToolExecutionContext};
use crate::agent::tools::{exec::ExecTool, filesystem::FilesystemTool, web::WebTool, ToolRegistry};
use crate::chat::{ChatHub, InboundMessage, OutboundMessage};
use crate::providers::{LlmMessage, LlmProvider, LlmRole};

const MAX_TOOL_LOOP_ITERATIONS: u32 = 15;
const DEFAULT_PROGRESS_INTERVAL_SECS: u64 = 15;
const DEFAULT_SUBAGENT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_TOOL_ERROR_BACKOFF: u32 = 3;
const MAX_COMPLETED_TASKS: usize = 50;
const RESULT_PREVIEW_CHARS: usize = 2000;

/// Optional source of shared workspace knowledge (bootstrap files, memory
/// retrieval, skills summary) that enriches the subagent's system prompt.
/// Left unset, the subagent still works with an identity-only prompt.
pub trait SubagentContextProvider: Send + Sync {
    fn bootstrap_content(&self) -> Option<String>;
    fn memory_section(&self, query: &str) -> Option<String>;
    fn skills_summary(&self) -> Option<String>;
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Running,
    Ok,
    Error,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOrigin {
    pub channel: String,
    pub chat_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolLogEntry {
    pub tool: String,
    pub timestamp: DateTime<Utc>,
    pub result_preview: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageTotals {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskMeta {
    pub id: String,
    pub label: String,
    pub task: String,
    pub origin: TaskOrigin,
    pub status: TaskStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub usage: UsageTotals,
    pub tool_log: Vec<ToolLogEntry>,
}

/// Result of spawning a subagent, returned to the control-surface tool.
pub struct SpawnOutcome {
    pub message: String,
    pub task: TaskMeta,
}

pub struct SubagentManager {
    provider: Arc<dyn LlmProvider>,
    workspace: PathBuf,
    bus: Arc<ChatHub>,
    model: String,
    progress_interval_s: u64,
    subagent_timeout_s: u64,
    tool_error_backoff: u32,
    bootstrap_chars: usize,
    context_provider: Option<Arc<dyn SubagentContextProvider>>,
    running: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,
    task_meta: Arc<RwLock<HashMap<String, TaskMeta>>>,
}

impl SubagentManager {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        workspace: PathBuf,
        bus: Arc<ChatHub>,
        model: Option<String>,
    ) -> Self {
        let model = model.unwrap_or_else(|| provider.default_model());
        Self {
            provider,
            workspace,
            bus,
            model,
            progress_interval_s: DEFAULT_PROGRESS_INTERVAL_SECS,
            subagent_timeout_s: DEFAULT_SUBAGENT_TIMEOUT_SECS,
            tool_error_backoff: DEFAULT_TOOL_ERROR_BACKOFF,
            bootstrap_chars: 3000,
            context_provider: None,
            running: Arc::new(RwLock::new(HashMap::new())),
            task_meta: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_context_provider(mut self, provider: Arc<dyn SubagentContextProvider>) -> Self {
        self.context_provider = Some(provider);
        self
    }

    pub fn with_timeout_s(mut self, secs: u64) -> Self {
        self.subagent_timeout_s = secs;
        self
    }

    /// Spawns a subagent and returns a short human-readable acknowledgement,
    /// matching the shape the `message` tool reply flow expects.
    pub async fn spawn(
        &self,
        task: String,
        label: Option<String>,
        origin_channel: String,
        origin_chat_id: String,
        context: Option<String>,
    ) -> String {
        let outcome = self
            .spawn_task(task, label, origin_channel, origin_chat_id, context)
            .await;
        outcome.message
    }

    /// Spawns a subagent and returns structured task info for control-surface
    /// callers (the `subagent_control` tool).
    pub async fn spawn_task(
        &self,
        task: String,
        label: Option<String>,
        origin_channel: String,
        origin_chat_id: String,
        context: Option<String>,
    ) -> SpawnOutcome {
        let task_id = Uuid::new_v4().to_string()[..8].to_string();
        let display_label = label.unwrap_or_else(|| {
            if task.chars().count() > 30 {
                format!("{}...", task.chars().take(30).collect::<String>())
            } else {
                task.clone()
            }
        });

        let origin = TaskOrigin {
            channel: origin_channel,
            chat_id: origin_chat_id,
        };

        let meta = TaskMeta {
            id: task_id.clone(),
            label: display_label.clone(),
            task: task.clone(),
            origin: origin.clone(),
            status: TaskStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            result: None,
            usage: UsageTotals::default(),
            tool_log: Vec::new(),
        };

        self.task_meta.write().await.insert(task_id.clone(), meta.clone());

        let handle = {
            let manager = self.clone_handles();
            let task_id2 = task_id.clone();
            let label2 = display_label.clone();
            let task2 = task.clone();
            let origin2 = origin.clone();
            tokio::spawn(async move {
                manager
                    .run_subagent(task_id2, task2, label2, origin2, context)
                    .await;
            })
        };

        self.running.write().await.insert(task_id.clone(), handle);

        info!(task_id = %task_id, label = %display_label, "spawned subagent");

        SpawnOutcome {
            message: format!(
                "Subagent [{}] started (id: {}). I'll notify you when it completes.",
                display_label, task_id
            ),
            task: meta,
        }
    }

    /// Clones the `Arc`-backed state this manager needs inside its own
    /// spawned task, without requiring `SubagentManager` itself to be `Arc`.
    fn clone_handles(&self) -> SubagentWorker {
        SubagentWorker {
            provider: self.provider.clone(),
            workspace: self.workspace.clone(),
            bus: self.bus.clone(),
            model: self.model.clone(),
            progress_interval_s: self.progress_interval_s,
            subagent_timeout_s: self.subagent_timeout_s,
            tool_error_backoff: self.tool_error_backoff,
            bootstrap_chars: self.bootstrap_chars,
            context_provider: self.context_provider.clone(),
            running: self.running.clone(),
            task_meta: self.task_meta.clone(),
        }
    }

    pub async fn list_running(&self) -> Vec<TaskMeta> {
        let running = self.running.read().await;
        let meta = self.task_meta.read().await;
        running
            .keys()
            .filter_map(|id| meta.get(id).cloned())
            .collect()
    }

    /// Cancels a running subagent. Returns `false` if no such task is
    /// currently running (already finished, or never existed).
    pub async fn cancel(&self, task_id: &str) -> bool {
        let handle = self.running.write().await.remove(task_id);
        match handle {
            Some(handle) => {
                handle.abort();
                let mut meta = self.task_meta.write().await;
                if let Some(m) = meta.get_mut(task_id) {
                    m.status = TaskStatus::Cancelled;
                    m.finished_at = Some(Utc::now());
                    m.result = Some("Task was cancelled.".to_string());
                }
                true
            }
            None => false,
        }
    }

    pub async fn get_task(&self, task_id: &str) -> Option<TaskMeta> {
        self.task_meta.read().await.get(task_id).cloned()
    }

    pub async fn list_all(&self) -> Vec<TaskMeta> {
        self.task_meta.read().await.values().cloned().collect()
    }

    pub async fn running_count(&self) -> usize {
        self.running.read().await.len()
    }
}

/// Owns exactly the state a single subagent run needs. Split out from
/// `SubagentManager` so the background task doesn't need the manager itself
/// behind an `Arc`.
#[derive(Clone)]
struct SubagentWorker {
    provider: Arc<dyn LlmProvider>,
    workspace: PathBuf,
    bus: Arc<ChatHub>,
    model: String,
    progress_interval_s: u64,
    subagent_timeout_s: u64,
    tool_error_backoff: u32,
    bootstrap_chars: usize,
    context_provider: Option<Arc<dyn SubagentContextProvider>>,
    running: Arc<RwLock<HashMap<String, JoinHandle<()>>>>,
    task_meta: Arc<RwLock<HashMap<String, TaskMeta>>>,
}

impl SubagentWorker {
    async fn run_subagent(
        self,
        task_id: String,
        task: String,
        label: String,
        origin: TaskOrigin,
        context: Option<String>,
    ) {
        info!(task_id = %task_id, label = %label, "subagent starting");

        let stop_status = Arc::new(tokio::sync::Notify::new());
        let status_handle = if self.progress_interval_s > 0 {
            Some(tokio::spawn(Self::status_loop(
                self.bus.clone(),
                label.clone(),
                origin.clone(),
                stop_status.clone(),
                self.progress_interval_s,
            )))
        } else {
            None
        };

        let tools = self.build_tool_registry().await;
        let system_prompt = self.build_subagent_prompt(&task, context.as_deref());
        let messages = vec![
            LlmMessage::new(LlmRole::System, system_prompt),
            LlmMessage::new(LlmRole::User, task.clone()),
        ];

        let run = self.run_tool_loop(&task_id, messages, &tools);
        let outcome = if self.subagent_timeout_s > 0 {
            match tokio::time::timeout(
                std::time::Duration::from_secs(self.subagent_timeout_s),
                run,
            )
            .await
            {
                Ok(result) => Outcome::Finished(result),
                Err(_) => Outcome::TimedOut,
            }
        } else {
            Outcome::Finished(run.await)
        };

        let (status, result) = match outcome {
            Outcome::Finished(text) => {
                info!(task_id = %task_id, "subagent completed");
                (TaskStatus::Ok, text)
            }
            Outcome::TimedOut => {
                error!(task_id = %task_id, timeout_s = self.subagent_timeout_s, "subagent timed out");
                (
                    TaskStatus::Timeout,
                    format!("Error: Subagent timed out after {}s", self.subagent_timeout_s),
                )
            }
        };

        {
            let mut meta = self.task_meta.write().await;
            if let Some(m) = meta.get_mut(&task_id) {
                m.status = status.clone();
                m.finished_at = Some(Utc::now());
                m.result = Some(result.chars().take(RESULT_PREVIEW_CHARS).collect());
            }
        }

        self.announce_result(&task_id, &label, &task, &result, &origin, &status)
            .await;

        self.running.write().await.remove(&task_id);
        self.prune_completed_meta().await;

        stop_status.notify_one();
        if let Some(handle) = status_handle {
            let _ = handle.await;
        }
    }

    async fn build_tool_registry(&self) -> ToolRegistry {
        let registry = ToolRegistry::new();
        let _ = registry
            .register(Box::new(FilesystemTool::new(self.workspace.clone())))
            .await;
        match ExecTool::new(self.workspace.clone()) {
            Ok(exec_tool) => {
                let _ = registry.register(Box::new(exec_tool)).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "subagent failed to create exec tool, continuing without it");
            }
        }
        let _ = registry.register(Box::new(WebTool::new())).await;
        registry
    }

    async fn run_tool_loop(&self, task_id: &str, mut messages: Vec<LlmMessage>, tools: &ToolRegistry) -> String {
        let mut iteration = 0u32;
        let mut final_result: Option<String> = None;
        let mut tool_error_streak = 0u32;
        let mut nudged = false;
        let mut usage = UsageTotals::default();

        while iteration < MAX_TOOL_LOOP_ITERATIONS {
            iteration += 1;

            let definitions = tools.get_tool_definitions().await;
            let response = match self
                .provider
                .chat(messages.clone(), definitions, &self.model)
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    final_result = Some(format!("Error: {}", e));
                    break;
                }
            };

            if let Some(prompt_tokens) = response.prompt_tokens {
                usage.prompt_tokens += prompt_tokens;
            }
            if let Some(completion_tokens) = response.completion_tokens {
                usage.completion_tokens += completion_tokens;
            }
            {
                let mut meta = self.task_meta.write().await;
                if let Some(m) = meta.get_mut(task_id) {
                    m.usage = usage.clone();
                }
            }

            if response.has_tool_calls() {
                let tool_calls = response.tool_calls.clone().unwrap_or_default();
                messages.push(LlmMessage::new(LlmRole::Assistant, response.content.clone()).with_tool_calls(tool_calls.clone()));

                let calls: Vec<ToolCallRequest> = tool_calls
                    .iter()
                    .map(|tc| ToolCallRequest {
                        id: tc.id.clone(),
                        name: tc.name.clone(),
                        arguments: tc
                            .parse_arguments::<HashMap<String, Value>>()
                            .unwrap_or_default(),
                    })
                    .collect();

                let ctx = ToolExecutionContext::default();
                let results = tools.execute_calls(calls, &ctx).await;
                let results_by_id: HashMap<String, String> = results.into_iter().collect();

                let mut abort = false;
                for tc in &tool_calls {
                    let result = results_by_id.get(&tc.id).cloned().unwrap_or_default();
                    debug!(task_id = %task_id, tool = %tc.name, "subagent executing tool");

                    messages.push(LlmMessage::new(LlmRole::Tool, result.clone()));

                    {
                        let mut meta = self.task_meta.write().await;
                        if let Some(m) = meta.get_mut(task_id) {
                            m.tool_log.push(ToolLogEntry {
                                tool: tc.name.clone(),
                                timestamp: Utc::now(),
                                result_preview: result.chars().take(100).collect(),
                            });
                        }
                    }

                    if self.tool_error_backoff > 0 {
                        if is_tool_error(&result) {
                            tool_error_streak += 1;
                        } else {
                            tool_error_streak = 0;
                        }
                        if tool_error_streak >= self.tool_error_backoff {
                            final_result = Some("Task aborted: too many consecutive tool errors.".to_string());
                            abort = true;
                            break;
                        }
                    }
                }

                if abort {
                    break;
                }
                continue;
            }

            final_result = Some(response.content.clone());

            if !nudged && response.content.trim().is_empty() && iteration < MAX_TOOL_LOOP_ITERATIONS {
                nudged = true;
                messages.push(LlmMessage::new(
                    LlmRole::User,
                    "Please reply with a brief summary of what you did.",
                ));
                final_result = None;
                continue;
            }

            break;
        }

        final_result.unwrap_or_else(|| {
            format!(
                "Task completed but no final response was generated (reached {}/{} iterations).",
                iteration, MAX_TOOL_LOOP_ITERATIONS
            )
        })
    }

    async fn announce_result(
        &self,
        task_id: &str,
        label: &str,
        task: &str,
        result: &str,
        origin: &TaskOrigin,
        status: &TaskStatus,
    ) {
        let status_text = if *status == TaskStatus::Ok {
            "completed successfully"
        } else {
            "failed"
        };

        let content = format!(
            "[Subagent '{label}' {status_text}]\n\n\
             Task: {task}\n\n\
             Result:\n{result}\n\n\
             Summarize this naturally for the user. Keep it brief (1-2 sentences). \
             Do not mention technical details like \"subagent\" or task IDs.",
            label = label,
            status_text = status_text,
            task = task,
            result = result,
        );

        let msg = InboundMessage::new("system", format!("{}:{}", origin.channel, origin.chat_id), content)
            .with_sender_id("subagent");

        if let Err(e) = self.bus.send_inbound(msg).await {
            error!(task_id = %task_id, error = %e, "failed to announce subagent result");
        } else {
            debug!(task_id = %task_id, channel = %origin.channel, chat_id = %origin.chat_id, "announced subagent result");
        }
    }

    async fn status_loop(
        bus: Arc<ChatHub>,
        label: String,
        origin: TaskOrigin,
        stop: Arc<tokio::sync::Notify>,
        interval_s: u64,
    ) {
        let started = std::time::Instant::now();
        loop {
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(interval_s)) => {}
                _ = stop.notified() => break,
            }

            let elapsed = started.elapsed().as_secs();
            let msg = OutboundMessage::new(
                origin.channel.clone(),
                origin.chat_id.clone(),
                format_status_message(&label, elapsed),
            )
            .with_type("status");
            let _ = bus.send_outbound(msg).await;
        }
    }

    fn build_subagent_prompt(&self, task: &str, context: Option<&str>) -> String {
        let now = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();

        let identity = format!(
            "# Subagent\n\n\
             You are a subagent spawned by the main agent to complete a specific task.\n\
             Follow the project conventions described below.\n\n\
             Current time: {now}\n\n\
             ## Your Task\n{task}\n\n\
             ## Rules\n\
             1. Stay focused — complete only the assigned task, nothing else\n\
             2. Your final response will be reported back to the main agent\n\
             3. Do not initiate conversations or take on side tasks\n\
             4. Be concise but informative in your findings\n\n\
             ## What You Can Do\n\
             - Read and write files in the workspace\n\
             - Execute shell commands\n\
             - Search the web and fetch web pages\n\
             - Complete the task thoroughly\n\n\
             ## What You Cannot Do\n\
             - Send messages directly to users (no message tool available)\n\
             - Spawn other subagents\n\n\
             ## Workspace\n\
             Your workspace is at: {workspace}\n\n\
             When you have completed the task, provide a clear summary of your findings or actions.",
            now = now,
            task = task,
            workspace = self.workspace.display(),
        );

        let Some(provider) = &self.context_provider else {
            return identity;
        };

        let mut sections = vec![identity];

        if let Some(bootstrap) = provider.bootstrap_content() {
            sections.push(bootstrap.chars().take(self.bootstrap_chars).collect());
        }
        if let Some(memory) = provider.memory_section(task) {
            sections.push(memory.chars().take(self.bootstrap_chars).collect());
        }
        if let Some(skills) = provider.skills_summary() {
            let section = format!(
                "# Skills\n\nYou can read a skill's SKILL.md file to learn how to use it.\n\n{}",
                skills
            );
            sections.push(section.chars().take(3000).collect());
        }

        sections.push(format!(
            "## Memory\n\nYou can write durable findings to `{}/memory/MEMORY.md` using the `filesystem` tool. \
             This persists across sessions.",
            self.workspace.display()
        ));

        if let Some(ctx) = context {
            sections.push(format!("# Conversation Context\n\n{}", ctx.chars().take(3000).collect::<String>()));
        }

        sections.join("\n\n---\n\n")
    }

    async fn prune_completed_meta(&self) {
        let mut meta = self.task_meta.write().await;
        let mut completed: Vec<(String, DateTime<Utc>)> = meta
            .iter()
            .filter(|(_, m)| m.status != TaskStatus::Running)
            .map(|(id, m)| (id.clone(), m.finished_at.unwrap_or(m.started_at)))
            .collect();

        if completed.len() <= MAX_COMPLETED_TASKS {
            return;
        }

        completed.sort_by_key(|(_, finished_at)| *finished_at);
        let to_remove = completed.len() - MAX_COMPLETED_TASKS;
        for (id, _) in completed.into_iter().take(to_remove) {
            meta.remove(&id);
        }
    }
}

enum Outcome {
    Finished(String),
    TimedOut,
}

fn is_tool_error(result: &str) -> bool {
    let s = result.trim().to_lowercase();
    s.starts_with("error:") || s.starts_with("warning:")
}

fn format_status_message(label: &str, elapsed_s: u64) -> String {
    let minutes = elapsed_s / 60;
    let seconds = elapsed_s % 60;
    let elapsed = if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    };
    format!("Background task '{}' still running ({}).", label, elapsed)
}
