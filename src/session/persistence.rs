use crate::session::types::{Message, Session};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// First line of every session JSONL file. Carries the opaque dispatch key so
/// a session can be identified even if the channel/chat_id values themselves
/// contain characters the filename escaping would otherwise have to decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionHeader {
    key: String,
    channel: String,
    chat_id: String,
    created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

pub struct Persistence {
    pub sessions_dir: PathBuf,
    /// Per-file advisory locks, held only within this process. Serializes
    /// concurrent save/load against the same session's JSONL file.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Persistence {
    pub fn new(sessions_dir: PathBuf) -> Self {
        Self {
            sessions_dir,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn file_path(&self, file_stem: &str) -> PathBuf {
        self.sessions_dir.join(format!("{}.jsonl", file_stem))
    }

    async fn lock_for(&self, file_stem: &str) -> Arc<Mutex<()>> {
        let mut guard = self.locks.lock().await;
        guard
            .entry(file_stem.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Serializes the session as a metadata header line followed by one line
    /// per message, then writes it atomically: temp file in the same
    /// directory, fsync, rename over the target.
    pub async fn save_session(&self, session: &Session) -> Result<()> {
        let file_stem = session.file_stem();
        let file_path = self.file_path(&file_stem);
        let lock = self.lock_for(&file_stem).await;
        let _guard = lock.lock().await;

        let mut body = String::new();
        let header = SessionHeader {
            key: session.session_id.clone(),
            channel: session.channel.clone(),
            chat_id: session.chat_id.clone(),
            created_at: session.created_at,
            metadata: session.metadata.clone(),
        };
        body.push_str(&serde_json::to_string(&header).context("failed to serialize session header")?);
        body.push('\n');
        for message in &session.messages {
            body.push_str(&serde_json::to_string(message).context("failed to serialize message")?);
            body.push('\n');
        }

        let tmp_path = file_path.with_extension("jsonl.tmp");
        {
            let file = fs::File::create(&tmp_path)
                .await
                .with_context(|| format!("failed to create temp file: {:?}", tmp_path))?;
            use tokio::io::AsyncWriteExt;
            let mut file = file;
            file.write_all(body.as_bytes())
                .await
                .with_context(|| format!("failed to write temp file: {:?}", tmp_path))?;
            file.sync_all()
                .await
                .with_context(|| format!("failed to fsync temp file: {:?}", tmp_path))?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .with_context(|| format!("failed to set permissions on: {:?}", tmp_path))?;
        }

        fs::rename(&tmp_path, &file_path)
            .await
            .with_context(|| format!("failed to replace session file: {:?}", file_path))?;

        info!("Saved session {} to {:?}", session.session_id, file_path);
        Ok(())
    }

    /// Loads a session by its on-disk file stem. Malformed message lines are
    /// skipped rather than failing the whole load; a missing or unparsable
    /// header falls back to the file stem as the opaque key — channel/chat_id
    /// are never reconstructed by splitting the stem.
    pub async fn load_session_by_stem(&self, file_stem: &str) -> Result<Session> {
        let file_path = self.file_path(file_stem);
        let lock = self.lock_for(file_stem).await;
        let _guard = lock.lock().await;

        let contents = match fs::read_to_string(&file_path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                anyhow::bail!("Session file not found: {:?}", file_path)
            }
            Err(e) => return Err(e.into()),
        };

        let mut lines = contents.lines();
        let header_line = lines.next();
        let header: Option<SessionHeader> = header_line.and_then(|l| serde_json::from_str(l).ok());

        let (key, channel, chat_id, created_at, metadata) = match header {
            Some(h) => (h.key, h.channel, h.chat_id, h.created_at, h.metadata),
            None => {
                warn!(
                    "Session file {:?} has a missing or malformed header; falling back to file stem",
                    file_path
                );
                return self.handle_corrupted_file(&file_path, file_stem).await;
            }
        };

        let mut messages = std::collections::VecDeque::new();
        for (idx, line) in lines.enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(line) {
                Ok(m) => messages.push_back(m),
                Err(e) => {
                    warn!(
                        "Skipping malformed message at line {} in {:?}: {}",
                        idx + 2,
                        file_path,
                        e
                    );
                }
            }
        }

        let last_accessed = messages
            .back()
            .map(|m| m.timestamp)
            .unwrap_or(created_at);

        info!("Loaded session {} from {:?}", key, file_path);
        Ok(Session {
            session_id: key,
            channel,
            chat_id,
            created_at,
            last_accessed,
            messages,
            metadata,
        })
    }

    pub async fn load_all_sessions(&self) -> Result<Vec<Session>> {
        let mut sessions = Vec::new();

        let mut entries = fs::read_dir(&self.sessions_dir).await.with_context(|| {
            format!("Failed to read sessions directory: {:?}", self.sessions_dir)
        })?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                let file_stem = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("")
                    .to_string();

                match self.load_session_by_stem(&file_stem).await {
                    Ok(session) => sessions.push(session),
                    Err(e) => {
                        warn!("Failed to load session {}: {}", file_stem, e);
                    }
                }
            }
        }

        info!(
            "Loaded {} sessions from {:?}",
            sessions.len(),
            self.sessions_dir
        );
        Ok(sessions)
    }

    async fn handle_corrupted_file(&self, file_path: &Path, file_stem: &str) -> Result<Session> {
        let corrupted_path = file_path.with_extension("jsonl.corrupted");

        fs::rename(file_path, &corrupted_path)
            .await
            .with_context(|| format!("Failed to rename corrupted file: {:?}", file_path))?;

        error!(
            "Corrupted session file detected. Moved {:?} to {:?}",
            file_path, corrupted_path
        );

        // The file stem itself becomes the opaque key. We do not know the
        // original channel/chat_id; "unknown" is an explicit marker, not a
        // guess built from splitting the stem.
        let session = Session {
            session_id: file_stem.to_string(),
            channel: "unknown".to_string(),
            chat_id: file_stem.to_string(),
            created_at: chrono::Utc::now(),
            last_accessed: chrono::Utc::now(),
            messages: std::collections::VecDeque::new(),
            metadata: HashMap::new(),
        };

        self.save_session(&session).await?;

        info!(
            "Created new empty session {} to replace corrupted file",
            file_stem
        );
        Ok(session)
    }

    pub async fn create_sessions_dir(&self) -> Result<()> {
        if !self.sessions_dir.exists() {
            fs::create_dir_all(&self.sessions_dir)
                .await
                .with_context(|| {
                    format!(
                        "Failed to create sessions directory: {:?}",
                        self.sessions_dir
                    )
                })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&self.sessions_dir, std::fs::Permissions::from_mode(0o755))
                    .await
                    .with_context(|| {
                        format!("Failed to set permissions on: {:?}", self.sessions_dir)
                    })?;
            }

            info!("Created sessions directory: {:?}", self.sessions_dir);
        }
        Ok(())
    }

    pub async fn delete_session(&self, file_stem: &str) -> Result<()> {
        let file_path = self.file_path(file_stem);
        match fs::remove_file(&file_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to delete {:?}", file_path)),
        }
    }
}
