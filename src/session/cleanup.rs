//! Session cleanup module for TTL-based session expiration
//!
//! This module provides automatic cleanup of expired sessions based on a TTL
//! (Time To Live) policy. Sessions that haven't been accessed for 30 days
//! are automatically removed to prevent disk space from growing indefinitely.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, info};

fn mtime_of(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

/// TTL for session expiration (30 days)
pub const SESSION_TTL_DAYS: i64 = 30;

/// Cleanup interval (24 hours)
pub const CLEANUP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Manages session cleanup based on TTL policy
pub struct Cleanup {
    sessions_dir: PathBuf,
}

impl Cleanup {
    /// Creates a new Cleanup instance
    pub fn new(sessions_dir: PathBuf) -> Self {
        Self { sessions_dir }
    }

    /// Checks if a session is expired based on last_accessed timestamp
    ///
    /// # Arguments
    /// * `last_accessed` - The timestamp of last session access
    ///
    /// # Returns
    /// * `true` if the session is expired (older than SESSION_TTL_DAYS)
    /// * `false` otherwise
    pub fn is_expired(last_accessed: DateTime<Utc>) -> bool {
        let now = Utc::now();
        let age = now.signed_duration_since(last_accessed);
        age > Duration::days(SESSION_TTL_DAYS)
    }

    /// Gets the file size in bytes
    async fn get_file_size(&self, path: &Path) -> u64 {
        match fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                debug!("Failed to get file size for {:?}: {}", path, e);
                0
            }
        }
    }

    /// Scans all session files and returns expired ones
    ///
    /// # Returns
    /// A tuple containing:
    /// - Vector of (session_id, file_path, last_accessed, file_size) for expired sessions
    /// - Total count of session files scanned
    pub async fn scan_expired_sessions(&self) -> Result<(Vec<(String, PathBuf, DateTime<Utc>, u64)>, usize)> {
        let mut expired = Vec::new();
        let mut total_count = 0;

        let mut entries = fs::read_dir(&self.sessions_dir).await.with_context(|| {
            format!(
                "Failed to read sessions directory: {:?}",
                self.sessions_dir
            )
        })?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            // Only process .jsonl files (not .corrupted/.tmp files)
            if path.extension().and_then(|s| s.to_str()) != Some("jsonl") {
                continue;
            }

            total_count += 1;

            let session_id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("")
                .to_string();

            // Idle expiry is based on the file's last-write time: every
            // `add_message` triggers a save, so mtime tracks last_accessed
            // without needing to parse the whole JSONL body up front.
            match fs::metadata(&path).await {
                Ok(metadata) => {
                    let last_accessed = mtime_of(&metadata);
                    if Self::is_expired(last_accessed) {
                        expired.push((session_id, path.clone(), last_accessed, metadata.len()));
                    }
                }
                Err(e) => {
                    error!("Failed to stat session file {:?}: {}", path, e);
                }
            }
        }

        Ok((expired, total_count))
    }

    /// Deletes a session file and returns the bytes freed
    ///
    /// Re-verifies expiration before deletion to avoid TOCTOU race conditions
    /// where a session might be updated between scan and delete.
    ///
    /// # Arguments
    /// * `path` - Path to the session file
    /// * `session_id` - Session ID for logging
    /// * `file_size` - Pre-calculated file size from scan
    ///
    /// # Returns
    /// * `Ok(bytes_freed)` on success (0 if session was preserved)
    /// * `Err` on failure
    async fn delete_session(&self, path: &Path, session_id: &str, file_size: u64) -> Result<u64> {
        // Re-stat to verify it's still expired (TOCTOU protection): a message
        // may have arrived and re-saved the file between scan and delete.
        match fs::metadata(path).await {
            Ok(metadata) => {
                let last_accessed = mtime_of(&metadata);
                if !Self::is_expired(last_accessed) {
                    debug!(
                        session_id = %session_id,
                        last_accessed = %last_accessed,
                        "Session was updated since scan, preserving"
                    );
                    return Ok(0);
                }

                fs::remove_file(path)
                    .await
                    .with_context(|| format!("Failed to delete session file: {:?}", path))?;

                let age_days = Utc::now().signed_duration_since(last_accessed).num_days();
                debug!(
                    session_id = %session_id,
                    last_accessed = %last_accessed,
                    age_days = age_days,
                    "Deleted expired session"
                );

                Ok(file_size)
            }
            Err(e) => {
                debug!("Session file {:?} no longer exists or is unreadable: {}", path, e);
                Ok(0)
            }
        }
    }

    /// Runs the cleanup process
    ///
    /// Scans all sessions, deletes expired ones, and logs the results
    pub async fn run(&self) -> Result<CleanupResult> {
        info!("Starting session cleanup scan");

        let (expired_sessions, sessions_scanned) = self.scan_expired_sessions().await?;
        let mut sessions_deleted = 0;
        let mut bytes_freed: u64 = 0;

        for (session_id, path, _last_accessed, file_size) in expired_sessions {
            match self.delete_session(&path, &session_id, file_size).await {
                Ok(bytes) => {
                    if bytes > 0 {
                        bytes_freed += bytes;
                        sessions_deleted += 1;
                    }
                }
                Err(e) => {
                    error!("Failed to delete session {}: {}", session_id, e);
                    // Continue with other sessions
                }
            }
        }

        info!(
            sessions_scanned = sessions_scanned,
            sessions_deleted = sessions_deleted,
            bytes_freed = bytes_freed,
            "Session cleanup complete"
        );

        Ok(CleanupResult {
            sessions_scanned,
            sessions_deleted,
            bytes_freed,
        })
    }

    /// Starts a background cleanup task that runs daily
    ///
    /// Returns a JoinHandle for graceful shutdown coordination and a shutdown sender
    pub fn start_cleanup_task(
        &self,
    ) -> (
        tokio::task::JoinHandle<()>,
        tokio::sync::mpsc::Sender<()>,
    ) {
        let sessions_dir = self.sessions_dir.clone();
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let cleanup = Cleanup::new(sessions_dir);
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(CLEANUP_INTERVAL_SECS));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = cleanup.run().await {
                            error!("Session cleanup failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Cleanup task received shutdown signal, completing...");
                        // Complete current cleanup cycle if running
                        break;
                    }
                }
            }
        });

        (handle, shutdown_tx)
    }
}

/// Result of a cleanup operation
#[derive(Debug, Clone, Copy)]
pub struct CleanupResult {
    /// Total number of session files scanned
    pub sessions_scanned: usize,
    /// Number of expired sessions deleted
    pub sessions_deleted: usize,
    /// Total bytes freed from deleted sessions
    pub bytes_freed: u64,
}
