//! Cron scheduling types
//!
//! Defines the data model for scheduled jobs: [`CronJob`], its
//! [`CronSchedule`], [`CronPayload`], and runtime [`CronJobState`]. The
//! [`CronStore`] is the top-level container persisted to disk as JSON.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a cron job is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Fire once at a specific timestamp.
    At,
    /// Fire repeatedly at a fixed interval.
    Every,
    /// Fire according to a cron expression.
    Cron,
}

/// Minimum interval floor for `every` schedules, to keep a misconfigured job
/// from hammering the agent loop.
pub const MIN_EVERY_MS: i64 = 60_000;

/// Schedule definition for a cron job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronSchedule {
    pub kind: ScheduleKind,

    /// For [`ScheduleKind::At`]: timestamp in milliseconds since epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_ms: Option<i64>,

    /// For [`ScheduleKind::Every`]: interval in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub every_ms: Option<i64>,

    /// For [`ScheduleKind::Cron`]: a six-field `cron` crate expression
    /// (seconds field first).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,

    /// Timezone for cron expressions. Stored but not yet applied: expressions
    /// are evaluated in UTC regardless of this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
}

impl Default for CronSchedule {
    fn default() -> Self {
        Self {
            kind: ScheduleKind::Every,
            at_ms: None,
            every_ms: None,
            expr: None,
            tz: None,
        }
    }
}

impl CronSchedule {
    pub fn every(ms: i64) -> Self {
        Self {
            kind: ScheduleKind::Every,
            every_ms: Some(ms),
            ..Default::default()
        }
    }

    pub fn cron(expr: impl Into<String>) -> Self {
        Self {
            kind: ScheduleKind::Cron,
            expr: Some(expr.into()),
            ..Default::default()
        }
    }

    pub fn at(ms: i64) -> Self {
        Self {
            kind: ScheduleKind::At,
            at_ms: Some(ms),
            ..Default::default()
        }
    }

    /// Validates the schedule carries the field its kind requires, and that
    /// `every` respects the configured minimum interval floor.
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            ScheduleKind::At => {
                if self.at_ms.is_none() {
                    return Err("schedule.kind = at requires at_ms".to_string());
                }
            }
            ScheduleKind::Every => match self.every_ms {
                None => return Err("schedule.kind = every requires every_ms".to_string()),
                Some(ms) if ms < MIN_EVERY_MS => {
                    return Err(format!(
                        "every_ms must be at least {} ({}ms given)",
                        MIN_EVERY_MS, ms
                    ));
                }
                _ => {}
            },
            ScheduleKind::Cron => {
                let expr = self
                    .expr
                    .as_deref()
                    .ok_or_else(|| "schedule.kind = cron requires expr".to_string())?;
                cron::Schedule::from_str(expr)
                    .map_err(|e| format!("invalid cron expression '{}': {}", expr, e))?;
            }
        }
        Ok(())
    }
}

/// What action to perform when a cron job fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// Emit a system-level event with no agent turn.
    SystemEvent,
    /// Trigger an agent turn using `message` as the prompt.
    AgentTurn,
}

fn default_payload_kind() -> PayloadKind {
    PayloadKind::AgentTurn
}

/// Payload executed when a cron job fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronPayload {
    #[serde(default = "default_payload_kind")]
    pub kind: PayloadKind,

    /// Message to deliver, or to use as the agent turn's prompt.
    #[serde(default)]
    pub message: String,

    /// Whether the result should be delivered to a channel/chat.
    #[serde(default)]
    pub deliver: bool,

    /// Target channel name (e.g. `"telegram"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Target chat/recipient id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl Default for CronPayload {
    fn default() -> Self {
        Self {
            kind: PayloadKind::AgentTurn,
            message: String::new(),
            deliver: false,
            channel: None,
            to: None,
        }
    }
}

/// Outcome of the last job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Scheduled,
    Running,
    Ok,
    Error,
    Cancelled,
}

/// Runtime state of a cron job.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CronJobState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run_at_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_status: Option<JobStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A scheduled job: when to fire (`schedule`), what to do when it fires
/// (`payload`), and its last/next run (`state`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronJob {
    pub id: String,
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub schedule: CronSchedule,

    #[serde(default)]
    pub payload: CronPayload,

    #[serde(default)]
    pub state: CronJobState,

    #[serde(default)]
    pub created_at_ms: i64,

    #[serde(default)]
    pub updated_at_ms: i64,

    /// If true, the job is removed after its next successful run.
    #[serde(default)]
    pub delete_after_run: bool,
}

impl CronJob {
    pub fn new(id: String, name: String, schedule: CronSchedule, payload: CronPayload) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id,
            name,
            enabled: true,
            schedule,
            payload,
            state: CronJobState::default(),
            created_at_ms: now,
            updated_at_ms: now,
            delete_after_run: false,
        }
    }

    /// Whether this job is due to fire at `now_ms`.
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.enabled
            && matches!(self.current_status(), JobStatus::Scheduled)
            && self
                .state
                .next_run_at_ms
                .is_some_and(|next| next <= now_ms)
    }

    pub fn current_status(&self) -> JobStatus {
        self.state.last_status.unwrap_or(JobStatus::Scheduled)
    }
}

/// Persistent store for cron jobs, the on-disk JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronStore {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub jobs: Vec<CronJob>,
}

fn default_version() -> u32 {
    1
}

impl Default for CronStore {
    fn default() -> Self {
        Self {
            version: 1,
            jobs: Vec::new(),
        }
    }
}
