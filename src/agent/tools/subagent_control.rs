//! Control surface for background subagents
//!
//! Lets the main agent inspect and cancel subagents started via the `spawn`
//! tool. Spawning itself lives there, kept separate so the LLM has one
//! fire-and-forget verb and one management surface rather than both bundled
//! behind an `action` parameter.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::agent::subagent::{SubagentManager, TaskMeta, TaskStatus};
use crate::agent::tools::types::{Tool, ToolError, ToolExecutionContext, ToolResult};

#[derive(Serialize)]
struct TaskResponse {
    id: String,
    label: String,
    task: String,
    status: String,
    started_at: String,
    finished_at: Option<String>,
    result: Option<String>,
}

impl From<&TaskMeta> for TaskResponse {
    fn from(meta: &TaskMeta) -> Self {
        Self {
            id: meta.id.clone(),
            label: meta.label.clone(),
            task: meta.task.clone(),
            status: status_str(&meta.status).to_string(),
            started_at: meta.started_at.to_rfc3339(),
            finished_at: meta.finished_at.map(|t| t.to_rfc3339()),
            result: meta.result.clone(),
        }
    }
}

#[derive(Serialize)]
struct ListResponse {
    success: bool,
    tasks: Vec<TaskResponse>,
}

#[derive(Serialize)]
struct CancelResponse {
    success: bool,
    message: String,
}

fn status_str(status: &TaskStatus) -> &'static str {
    match status {
        TaskStatus::Running => "running",
        TaskStatus::Ok => "ok",
        TaskStatus::Error => "error",
        TaskStatus::Timeout => "timeout",
        TaskStatus::Cancelled => "cancelled",
    }
}

/// Tool exposing `SubagentManager`'s spawn/list/cancel/status surface to the
/// main agent.
pub struct SubagentControlTool {
    manager: Arc<SubagentManager>,
}

impl SubagentControlTool {
    pub fn new(manager: Arc<SubagentManager>) -> Self {
        Self { manager }
    }

    async fn list_running(&self) -> ToolResult<String> {
        let tasks: Vec<TaskResponse> = self.manager.list_running().await.iter().map(TaskResponse::from).collect();
        let response = ListResponse { success: true, tasks };
        Ok(serde_json::to_string(&response).unwrap())
    }

    async fn list_all(&self) -> ToolResult<String> {
        let tasks: Vec<TaskResponse> = self.manager.list_all().await.iter().map(TaskResponse::from).collect();
        let response = ListResponse { success: true, tasks };
        Ok(serde_json::to_string(&response).unwrap())
    }

    async fn get(&self, task_id: &str) -> ToolResult<String> {
        match self.manager.get_task(task_id).await {
            Some(meta) => Ok(serde_json::to_string(&TaskResponse::from(&meta)).unwrap()),
            None => Err(ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: format!("No such task: {}", task_id),
            }),
        }
    }

    async fn cancel(&self, task_id: &str) -> ToolResult<String> {
        let cancelled = self.manager.cancel(task_id).await;
        let response = CancelResponse {
            success: cancelled,
            message: if cancelled {
                format!("Task {} cancelled.", task_id)
            } else {
                format!("Task {} is not currently running.", task_id)
            },
        };
        Ok(serde_json::to_string(&response).unwrap())
    }
}

#[async_trait::async_trait]
impl Tool for SubagentControlTool {
    fn name(&self) -> &str {
        "subagent_control"
    }

    fn description(&self) -> &str {
        "Manage background subagents started with the 'spawn' tool. 'list_running' and 'list_all' \
         report status; 'get' returns full details for one task; 'cancel' stops a running task."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["list_running", "list_all", "get", "cancel"],
                    "description": "Action to perform"
                },
                "task_id": {
                    "type": "string",
                    "description": "Task id to look up or cancel (required for 'get' and 'cancel')"
                }
            },
            "required": ["action"],
            "allOf": [
                {
                    "if": { "properties": { "action": { "const": "get" } } },
                    "then": { "required": ["task_id"] }
                },
                {
                    "if": { "properties": { "action": { "const": "cancel" } } },
                    "then": { "required": ["task_id"] }
                }
            ]
        })
    }

    fn parallel_safe(&self) -> bool {
        // Cancel mutates shared subagent-manager state; keep it serialized
        // alongside other non-parallel-safe tools.
        false
    }

    async fn execute(&self, args: HashMap<String, Value>, _ctx: &ToolExecutionContext) -> ToolResult<String> {
        let action = args
            .get("action")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: "Missing required parameter 'action'".to_string(),
            })?;

        match action {
            "list_running" => self.list_running().await,
            "list_all" => self.list_all().await,
            "get" => {
                let task_id = args
                    .get("task_id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ToolError::InvalidArguments {
                        tool: self.name().to_string(),
                        message: "Missing required parameter 'task_id' for get action".to_string(),
                    })?;
                self.get(task_id).await
            }
            "cancel" => {
                let task_id = args
                    .get("task_id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ToolError::InvalidArguments {
                        tool: self.name().to_string(),
                        message: "Missing required parameter 'task_id' for cancel action".to_string(),
                    })?;
                self.cancel(task_id).await
            }
            other => Err(ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: format!("Unknown action: {}", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatHub;
    use crate::providers::{LlmMessage, LlmProvider, LlmResponse, ProviderError};
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StubProvider;

    #[async_trait]
    impl LlmProvider for StubProvider {
        async fn chat(
            &self,
            _messages: Vec<LlmMessage>,
            _tools: Vec<serde_json::Value>,
            _model: &str,
        ) -> Result<LlmResponse, ProviderError> {
            Ok(LlmResponse::new("done"))
        }

        fn default_model(&self) -> String {
            "stub".to_string()
        }

        fn provider_name(&self) -> &'static str {
            "stub"
        }

        async fn list_models(&self) -> Result<Vec<crate::providers::ModelInfo>, ProviderError> {
            Ok(vec![crate::providers::ModelInfo::new("stub-model", false)])
        }
    }

    fn make_tool() -> (SubagentControlTool, TempDir) {
        let temp = TempDir::new().unwrap();
        let provider: Arc<dyn LlmProvider> = Arc::new(StubProvider);
        let bus = Arc::new(ChatHub::new());
        let manager = Arc::new(SubagentManager::new(provider, temp.path().to_path_buf(), bus, None));
        (SubagentControlTool::new(manager), temp)
    }

    #[tokio::test]
    async fn test_list_running_reports_manager_tasks() {
        let (tool, _temp) = make_tool();
        tool.manager
            .spawn_task(
                "summarize notes".to_string(),
                None,
                "telegram".to_string(),
                "42".to_string(),
                None,
            )
            .await;

        let mut args = HashMap::new();
        args.insert("action".to_string(), json!("list_running"));

        let ctx = ToolExecutionContext::default();
        let result = tool.execute(args, &ctx).await.unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["success"], true);
        assert_eq!(parsed["tasks"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_nonexistent_task() {
        let (tool, _temp) = make_tool();
        let mut args = HashMap::new();
        args.insert("action".to_string(), json!("cancel"));
        args.insert("task_id".to_string(), json!("doesnotexist"));

        let ctx = ToolExecutionContext::default();
        let result = tool.execute(args, &ctx).await.unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["success"], false);
    }

    #[tokio::test]
    async fn test_get_unknown_task_errors() {
        let (tool, _temp) = make_tool();
        let mut args = HashMap::new();
        args.insert("action".to_string(), json!("get"));
        args.insert("task_id".to_string(), json!("nope"));

        let ctx = ToolExecutionContext::default();
        let result = tool.execute(args, &ctx).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments { .. })));
    }

    #[tokio::test]
    async fn test_unknown_action_errors() {
        let (tool, _temp) = make_tool();
        let mut args = HashMap::new();
        args.insert("action".to_string(), json!("not_a_real_action"));

        let ctx = ToolExecutionContext::default();
        let result = tool.execute(args, &ctx).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments { .. })));
    }
}
