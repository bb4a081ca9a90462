//! Cron scheduler: fires scheduled jobs by invoking an opaque callback
//!
//! Jobs persist as JSON (`{version, jobs:[...]}`, see [`types::CronStore`]).
//! `next_run_at_ms` is computed from `schedule` on add and after every run:
//! `every` schedules add a fixed interval, `cron` schedules use the `cron`
//! crate against the job's last run, `at` schedules fire once. Neither this
//! module nor its tests know what the callback does with a job; they only
//! depend on its signature.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub mod heartbeat;
pub mod types;

pub use types::{CronJob, CronJobState, CronPayload, CronSchedule, CronStore, JobStatus, PayloadKind, ScheduleKind};

static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn generate_job_id() -> String {
    let n = JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("cron_{}_{}", Utc::now().timestamp_millis(), n)
}

/// Callback invoked when a job fires. Takes the job (for its payload and
/// id) and returns whether the run succeeded.
pub type CronCallback = Arc<dyn Fn(CronJob) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Computes the next run time (ms since epoch) for a schedule, given the
/// last time it ran (or `None` for a job that has never run).
pub fn compute_next_run(schedule: &CronSchedule, after_ms: i64) -> Result<Option<i64>, String> {
    match schedule.kind {
        ScheduleKind::At => Ok(schedule.at_ms),
        ScheduleKind::Every => {
            let every_ms = schedule
                .every_ms
                .ok_or_else(|| "every schedule missing every_ms".to_string())?;
            Ok(Some(after_ms + every_ms))
        }
        ScheduleKind::Cron => {
            let expr = schedule
                .expr
                .as_deref()
                .ok_or_else(|| "cron schedule missing expr".to_string())?;
            let parsed = cron::Schedule::from_str(expr).map_err(|e| e.to_string())?;
            let after = Utc
                .timestamp_millis_opt(after_ms)
                .single()
                .ok_or_else(|| "invalid timestamp".to_string())?;
            Ok(parsed.after(&after).next().map(|dt| dt.timestamp_millis()))
        }
    }
}

/// The cron scheduler manages scheduled jobs and persists them as JSON.
///
/// Uses `Arc<RwLock<HashMap>>` for thread-safe concurrent access; the
/// scheduler can be cloned to share the same job storage across tasks.
#[derive(Clone)]
pub struct CronScheduler {
    jobs: Arc<RwLock<HashMap<String, CronJob>>>,
    store_path: Option<PathBuf>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("store_path", &self.store_path)
            .finish()
    }
}

impl Default for CronScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl CronScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            store_path: None,
        }
    }

    /// Loads jobs from `path` (creating an empty store if the file doesn't
    /// exist) and keeps `path` as the target for future saves.
    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let store = if path.exists() {
            let data = tokio::fs::read_to_string(&path).await?;
            serde_json::from_str::<CronStore>(&data)?
        } else {
            CronStore::default()
        };

        let jobs = store.jobs.into_iter().map(|j| (j.id.clone(), j)).collect();
        Ok(Self {
            jobs: Arc::new(RwLock::new(jobs)),
            store_path: Some(path),
        })
    }

    async fn persist(&self) -> anyhow::Result<()> {
        let Some(path) = &self.store_path else {
            return Ok(());
        };
        let jobs: Vec<CronJob> = self.jobs.read().await.values().cloned().collect();
        let store = CronStore { version: 1, jobs };
        let data = serde_json::to_string_pretty(&store)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    /// Adds a new job, computing its initial `next_run_at_ms`. Rejects an
    /// invalid schedule.
    pub async fn add_job(
        &self,
        name: String,
        schedule: CronSchedule,
        payload: CronPayload,
    ) -> Result<CronJob, String> {
        schedule.validate()?;

        if let ScheduleKind::At = schedule.kind {
            let at_ms = schedule.at_ms.unwrap_or_default();
            if at_ms <= Utc::now().timestamp_millis() {
                return Err("schedule.at_ms must be strictly in the future".to_string());
            }
        }

        let now_ms = Utc::now().timestamp_millis();
        let mut job = CronJob::new(generate_job_id(), name, schedule, payload);
        job.state.next_run_at_ms = compute_next_run(&job.schedule, now_ms)?;

        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job.clone());
        drop(jobs);
        self.persist().await.map_err(|e| e.to_string())?;
        info!(job_id = %job.id, name = %job.name, "Scheduled cron job");
        Ok(job)
    }

    pub async fn remove_job(&self, job_id: &str) -> bool {
        let removed = self.jobs.write().await.remove(job_id).is_some();
        if removed {
            let _ = self.persist().await;
        }
        removed
    }

    pub async fn get_job(&self, job_id: &str) -> Option<CronJob> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Scheduled, Running, or Failed jobs, sorted by next execution.
    /// Completed/cancelled jobs are not included; they're evicted by
    /// [`CronScheduler::cleanup`] instead of being hidden here.
    pub async fn list_jobs(&self) -> Vec<CronJob> {
        let mut jobs: Vec<CronJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| !matches!(j.current_status(), JobStatus::Ok if j.delete_after_run))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.state.next_run_at_ms.unwrap_or(i64::MAX));
        jobs
    }

    async fn due_jobs(&self, now_ms: i64) -> Vec<CronJob> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| j.is_due(now_ms))
            .cloned()
            .collect()
    }

    /// Removes jobs in a terminal state (`Ok` with `delete_after_run`, or
    /// `Cancelled`). Does not touch `Scheduled`/`Running`/`Error` jobs.
    pub async fn cleanup(&self) {
        let mut jobs = self.jobs.write().await;
        jobs.retain(|_, j| {
            !matches!(j.current_status(), JobStatus::Cancelled)
                && !(matches!(j.current_status(), JobStatus::Ok) && j.delete_after_run)
        });
        drop(jobs);
        let _ = self.persist().await;
    }

    async fn run_job(&self, job_id: String, callback: CronCallback) {
        let Some(mut job) = self.get_job(&job_id).await else {
            return;
        };

        job.state.last_status = Some(JobStatus::Running);
        self.jobs.write().await.insert(job_id.clone(), job.clone());

        let run_at_ms = Utc::now().timestamp_millis();
        let result = callback(job.clone()).await;

        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.get_mut(&job_id) else {
            return;
        };

        job.state.last_run_at_ms = Some(run_at_ms);
        job.updated_at_ms = run_at_ms;

        match result {
            Ok(()) => {
                job.state.last_error = None;
                if job.delete_after_run {
                    job.state.last_status = Some(JobStatus::Ok);
                } else {
                    match compute_next_run(&job.schedule, run_at_ms) {
                        Ok(next) => {
                            job.state.next_run_at_ms = next;
                            job.state.last_status = Some(JobStatus::Scheduled);
                        }
                        Err(e) => {
                            error!(job_id = %job_id, error = %e, "Failed to compute next run");
                            job.state.last_status = Some(JobStatus::Error);
                            job.state.last_error = Some(e);
                        }
                    }
                }
            }
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Cron job run failed");
                job.state.last_error = Some(e);
                // `every`/`cron` jobs get another shot next tick; `at` jobs
                // fail permanently since there is no "next tick" for them.
                job.state.last_status = match job.schedule.kind {
                    ScheduleKind::At => Some(JobStatus::Error),
                    ScheduleKind::Every | ScheduleKind::Cron => Some(JobStatus::Scheduled),
                };
            }
        }
        drop(jobs);
        let _ = self.persist().await;
    }

    /// Spawns the scheduler's background tick loop. Checks for due jobs
    /// every second and fires them through `callback`; evicts completed
    /// jobs after each tick.
    pub fn start(self, callback: CronCallback) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                let now_ms = Utc::now().timestamp_millis();
                let due = self.due_jobs(now_ms).await;
                for job in due {
                    debug!(job_id = %job.id, "Firing cron job");
                    self.run_job(job.id.clone(), Arc::clone(&callback)).await;
                }
                self.cleanup().await;
            }
        })
    }
}
