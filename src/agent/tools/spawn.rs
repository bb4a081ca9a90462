//! Spawn tool: fire-and-forget delegation to a background subagent.
//!
//! A thin handle into `SubagentManager`, bound per-call to the requesting
//! conversation via `ToolExecutionContext` so the subagent's result gets
//! announced back to the right chat. Management of already-running
//! subagents (list/get/cancel) lives in `subagent_control`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::agent::subagent::SubagentManager;
use crate::agent::tools::types::{Tool, ToolError, ToolExecutionContext, ToolResult};

#[derive(Serialize)]
struct SpawnResponse {
    success: bool,
    task_id: String,
    message: String,
}

/// Starts a subagent on a task and returns immediately; never blocks on
/// subagent completion.
pub struct SpawnTool {
    manager: Arc<SubagentManager>,
}

impl SpawnTool {
    pub fn new(manager: Arc<SubagentManager>) -> Self {
        Self { manager }
    }
}

#[async_trait::async_trait]
impl Tool for SpawnTool {
    fn name(&self) -> &str {
        "spawn"
    }

    fn description(&self) -> &str {
        "Delegate a task to a background subagent. Starts the subagent and returns immediately \
         with a confirmation; the subagent runs its own tool-use loop and announces its result \
         back to this conversation when it finishes. Use 'subagent_control' to list, inspect, or \
         cancel running subagents."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "task": {
                    "type": "string",
                    "description": "Task description for the subagent to carry out"
                },
                "label": {
                    "type": "string",
                    "description": "Optional short label shown in status updates and listings"
                },
                "context": {
                    "type": "string",
                    "description": "Optional extra context to hand the subagent beyond the task description"
                }
            },
            "required": ["task"]
        })
    }

    fn parallel_safe(&self) -> bool {
        // Touches shared subagent-manager state; keep it serialized alongside
        // other non-parallel-safe tools.
        false
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        ctx: &ToolExecutionContext,
    ) -> ToolResult<String> {
        let task = args
            .get("task")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: "Missing required parameter 'task'".to_string(),
            })?
            .to_string();
        let label = args.get("label").and_then(|v| v.as_str()).map(String::from);
        let context = args.get("context").and_then(|v| v.as_str()).map(String::from);

        let channel = ctx.channel.clone().unwrap_or_else(|| "cli".to_string());
        let chat_id = ctx.chat_id.clone().unwrap_or_else(|| "direct".to_string());

        let outcome = self
            .manager
            .spawn_task(task, label, channel, chat_id, context)
            .await;

        let response = SpawnResponse {
            success: true,
            task_id: outcome.task.id,
            message: outcome.message,
        };
        Ok(serde_json::to_string(&response).unwrap())
    }
}
