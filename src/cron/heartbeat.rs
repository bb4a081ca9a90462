//! Heartbeat: periodically checks `HEARTBEAT.md` for actionable tasks and, if
//! any are present, triggers one agent turn through an opaque callback.
//!
//! Like the cron scheduler, this module doesn't know what an agent turn is;
//! it only knows the callback's signature.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub type HeartbeatCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Returns true if `content` has at least one non-empty, non-header line, or
/// a checkbox item (`- [ ]`/`- [x]`) with content after the brackets. Empty
/// checkboxes, headers, and single-line HTML comments (`<!-- ... -->`, used
/// for in-file instructions) don't count as actionable on their own.
pub fn has_actionable_tasks(content: &str) -> bool {
    content.lines().any(|raw_line| {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("<!--") {
            return false;
        }
        match parse_checkbox(line) {
            Some(rest) => !rest.trim().is_empty(),
            None => true,
        }
    })
}

/// Strips a leading `- [ ]`/`- [x]`/`* [ ]`/`* [X]` marker, returning
/// whatever follows it. Returns `None` if `line` isn't a checkbox item.
fn parse_checkbox(line: &str) -> Option<&str> {
    let line = line.strip_prefix("- ").or_else(|| line.strip_prefix("* "))?;
    line.strip_prefix("[ ]")
        .or_else(|| line.strip_prefix("[x]"))
        .or_else(|| line.strip_prefix("[X]"))
}

/// Periodically reads `HEARTBEAT.md` and fires `callback` when it contains
/// actionable tasks.
pub struct Heartbeat {
    heartbeat_path: PathBuf,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(heartbeat_path: PathBuf, interval: Duration) -> Self {
        Self {
            heartbeat_path,
            interval,
        }
    }

    pub fn start(self, callback: HeartbeatCallback) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                let content = match tokio::fs::read_to_string(&self.heartbeat_path).await {
                    Ok(content) => content,
                    Err(e) => {
                        debug!(path = %self.heartbeat_path.display(), error = %e, "Heartbeat: could not read HEARTBEAT.md");
                        continue;
                    }
                };

                if !has_actionable_tasks(&content) {
                    debug!("Heartbeat tick: no actionable tasks");
                    continue;
                }

                info!("Heartbeat found actionable tasks, running agent turn");
                if let Err(e) = callback().await {
                    error!(error = %e, "Heartbeat agent turn failed");
                }
            }
        })
    }
}
