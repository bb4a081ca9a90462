//! Cron tool for the agent
//!
//! Exposes `schedule`/`list`/`cancel` against the [`CronScheduler`], using
//! the same conditional-schema technique as `subagent_control`: the required
//! fields for `schedule` depend on the chosen schedule kind.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Value, json};

use crate::agent::tools::types::{Tool, ToolError, ToolExecutionContext, ToolResult};
use crate::cron::{CronPayload, CronSchedule, CronScheduler, PayloadKind, ScheduleKind};

#[derive(Serialize)]
struct ScheduleResponse {
    success: bool,
    job_id: String,
    next_run_at_ms: Option<i64>,
}

#[derive(Serialize)]
struct JobResponse {
    id: String,
    name: String,
    enabled: bool,
    schedule_kind: String,
    next_run_at_ms: Option<i64>,
    last_status: Option<String>,
}

impl From<&crate::cron::CronJob> for JobResponse {
    fn from(job: &crate::cron::CronJob) -> Self {
        Self {
            id: job.id.clone(),
            name: job.name.clone(),
            enabled: job.enabled,
            schedule_kind: match job.schedule.kind {
                ScheduleKind::At => "at",
                ScheduleKind::Every => "every",
                ScheduleKind::Cron => "cron",
            }
            .to_string(),
            next_run_at_ms: job.state.next_run_at_ms,
            last_status: job.state.last_status.map(|s| format!("{:?}", s).to_lowercase()),
        }
    }
}

#[derive(Serialize)]
struct ListResponse {
    success: bool,
    jobs: Vec<JobResponse>,
}

#[derive(Serialize)]
struct CancelResponse {
    success: bool,
    message: String,
}

/// Tool exposing the cron scheduler's schedule/list/cancel surface to the
/// main agent.
#[derive(Clone)]
pub struct CronTool {
    scheduler: CronScheduler,
}

impl CronTool {
    pub fn new(scheduler: CronScheduler) -> Self {
        Self { scheduler }
    }

    fn build_schedule(args: &HashMap<String, Value>) -> Result<CronSchedule, String> {
        let kind = args
            .get("schedule_kind")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "Missing required parameter 'schedule_kind'".to_string())?;

        let schedule = match kind {
            "every" => {
                let every_ms = args
                    .get("every_ms")
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| "Missing 'every_ms' for schedule_kind=every".to_string())?;
                CronSchedule::every(every_ms)
            }
            "cron" => {
                let expr = args
                    .get("expr")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| "Missing 'expr' for schedule_kind=cron".to_string())?;
                CronSchedule::cron(expr)
            }
            "at" => {
                let at_ms = args
                    .get("at_ms")
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| "Missing 'at_ms' for schedule_kind=at".to_string())?;
                CronSchedule::at(at_ms)
            }
            other => return Err(format!("Invalid schedule_kind: {}", other)),
        };

        schedule.validate()?;
        Ok(schedule)
    }

    fn build_payload(args: &HashMap<String, Value>) -> CronPayload {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let deliver = args.get("deliver").and_then(|v| v.as_bool()).unwrap_or(false);
        let channel = args.get("channel").and_then(|v| v.as_str()).map(String::from);
        let to = args.get("to").and_then(|v| v.as_str()).map(String::from);

        CronPayload {
            kind: PayloadKind::AgentTurn,
            message,
            deliver,
            channel,
            to,
        }
    }

    async fn schedule(&self, args: &HashMap<String, Value>) -> ToolResult<String> {
        let name = args
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: "Missing required parameter 'name'".to_string(),
            })?
            .to_string();

        let schedule = Self::build_schedule(args).map_err(|message| ToolError::InvalidArguments {
            tool: self.name().to_string(),
            message,
        })?;
        let payload = Self::build_payload(args);

        let job = self
            .scheduler
            .add_job(name, schedule, payload)
            .await
            .map_err(|message| ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message,
            })?;

        let response = ScheduleResponse {
            success: true,
            job_id: job.id,
            next_run_at_ms: job.state.next_run_at_ms,
        };
        Ok(serde_json::to_string(&response).unwrap())
    }

    async fn list(&self) -> ToolResult<String> {
        let jobs: Vec<JobResponse> = self.scheduler.list_jobs().await.iter().map(JobResponse::from).collect();
        let response = ListResponse { success: true, jobs };
        Ok(serde_json::to_string(&response).unwrap())
    }

    async fn cancel(&self, job_id: &str) -> ToolResult<String> {
        let cancelled = self.scheduler.remove_job(job_id).await;
        let response = CancelResponse {
            success: cancelled,
            message: if cancelled {
                format!("Job {} cancelled.", job_id)
            } else {
                format!("No such job: {}", job_id)
            },
        };
        Ok(serde_json::to_string(&response).unwrap())
    }
}

#[async_trait::async_trait]
impl Tool for CronTool {
    fn name(&self) -> &str {
        "cron"
    }

    fn description(&self) -> &str {
        "Schedule, list, and cancel recurring or one-off reminders/agent turns. 'schedule' creates a job \
         firing 'every' a fixed interval, on a 'cron' expression, or once 'at' a timestamp; the job's \
         message becomes the agent's prompt when it fires, optionally delivered to a channel. 'list' shows \
         scheduled/running/failed jobs. 'cancel' removes a job."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["schedule", "list", "cancel"],
                    "description": "Action to perform"
                },
                "name": {
                    "type": "string",
                    "description": "Human-readable job name (required for 'schedule')"
                },
                "schedule_kind": {
                    "type": "string",
                    "enum": ["every", "cron", "at"],
                    "description": "How the job repeats (required for 'schedule')"
                },
                "every_ms": {
                    "type": "integer",
                    "description": "Interval in milliseconds (required when schedule_kind=every)"
                },
                "expr": {
                    "type": "string",
                    "description": "Cron expression, e.g. '0 0 9 * * *' for daily at 9am UTC (required when schedule_kind=cron)"
                },
                "at_ms": {
                    "type": "integer",
                    "description": "Timestamp in milliseconds since epoch, strictly in the future (required when schedule_kind=at)"
                },
                "message": {
                    "type": "string",
                    "description": "Prompt to run as an agent turn when the job fires"
                },
                "deliver": {
                    "type": "boolean",
                    "description": "Whether to deliver the agent turn's reply to a channel"
                },
                "channel": {
                    "type": "string",
                    "description": "Target channel name when delivering (e.g. 'telegram')"
                },
                "to": {
                    "type": "string",
                    "description": "Target chat id when delivering"
                },
                "job_id": {
                    "type": "string",
                    "description": "Job id to cancel (required for 'cancel')"
                }
            },
            "required": ["action"],
            "allOf": [
                {
                    "if": { "properties": { "action": { "const": "schedule" } } },
                    "then": {
                        "required": ["name", "schedule_kind"],
                        "allOf": [
                            {
                                "if": { "properties": { "schedule_kind": { "const": "every" } } },
                                "then": { "required": ["every_ms"] }
                            },
                            {
                                "if": { "properties": { "schedule_kind": { "const": "cron" } } },
                                "then": { "required": ["expr"] }
                            },
                            {
                                "if": { "properties": { "schedule_kind": { "const": "at" } } },
                                "then": { "required": ["at_ms"] }
                            }
                        ]
                    }
                },
                {
                    "if": { "properties": { "action": { "const": "cancel" } } },
                    "then": { "required": ["job_id"] }
                }
            ]
        })
    }

    fn parallel_safe(&self) -> bool {
        // Scheduling mutates shared job storage; keep it serialized.
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
            "schedule" => self.schedule(&args).await,
            "list" => self.list().await,
            "cancel" => {
                let job_id = args
                    .get("job_id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ToolError::InvalidArguments {
                        tool: self.name().to_string(),
                        message: "Missing required parameter 'job_id' for cancel action".to_string(),
                    })?;
                self.cancel(job_id).await
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

    fn make_tool() -> CronTool {
        CronTool::new(CronScheduler::new())
    }

    #[tokio::test]
    async fn test_schedule_every_returns_job_id() {
        let tool = make_tool();
        let mut args = HashMap::new();
        args.insert("action".to_string(), json!("schedule"));
        args.insert("name".to_string(), json!("check in"));
        args.insert("schedule_kind".to_string(), json!("every"));
        args.insert("every_ms".to_string(), json!(120_000));
        args.insert("message".to_string(), json!("check on the deploy"));

        let ctx = ToolExecutionContext::default();
        let result = tool.execute(args, &ctx).await.unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["success"], true);
        assert!(parsed["job_id"].as_str().unwrap().starts_with("cron_"));
        assert!(parsed["next_run_at_ms"].is_number());
    }

    #[tokio::test]
    async fn test_schedule_every_below_floor_errors() {
        let tool = make_tool();
        let mut args = HashMap::new();
        args.insert("action".to_string(), json!("schedule"));
        args.insert("name".to_string(), json!("too fast"));
        args.insert("schedule_kind".to_string(), json!("every"));
        args.insert("every_ms".to_string(), json!(500));

        let ctx = ToolExecutionContext::default();
        let result = tool.execute(args, &ctx).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments { .. })));
    }

    #[tokio::test]
    async fn test_schedule_missing_schedule_kind_errors() {
        let tool = make_tool();
        let mut args = HashMap::new();
        args.insert("action".to_string(), json!("schedule"));
        args.insert("name".to_string(), json!("nope"));

        let ctx = ToolExecutionContext::default();
        let result = tool.execute(args, &ctx).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments { .. })));
    }

    #[tokio::test]
    async fn test_list_and_cancel() {
        let tool = make_tool();
        let mut schedule_args = HashMap::new();
        schedule_args.insert("action".to_string(), json!("schedule"));
        schedule_args.insert("name".to_string(), json!("daily"));
        schedule_args.insert("schedule_kind".to_string(), json!("cron"));
        schedule_args.insert("expr".to_string(), json!("0 0 9 * * *"));

        let ctx = ToolExecutionContext::default();
        let result = tool.execute(schedule_args, &ctx).await.unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        let job_id = parsed["job_id"].as_str().unwrap().to_string();

        let mut list_args = HashMap::new();
        list_args.insert("action".to_string(), json!("list"));
        let result = tool.execute(list_args, &ctx).await.unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["jobs"].as_array().unwrap().len(), 1);

        let mut cancel_args = HashMap::new();
        cancel_args.insert("action".to_string(), json!("cancel"));
        cancel_args.insert("job_id".to_string(), json!(job_id));
        let result = tool.execute(cancel_args, &ctx).await.unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["success"], true);
    }

    #[tokio::test]
    async fn test_cancel_nonexistent_job() {
        let tool = make_tool();
        let mut args = HashMap::new();
        args.insert("action".to_string(), json!("cancel"));
        args.insert("job_id".to_string(), json!("nonexistent"));

        let ctx = ToolExecutionContext::default();
        let result = tool.execute(args, &ctx).await.unwrap();
        let parsed: Value = serde_json::from_str(&result).unwrap();
        assert_eq!(parsed["success"], false);
    }
}
