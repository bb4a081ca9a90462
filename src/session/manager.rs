use crate::session::persistence::Persistence;
use crate::session::types::{file_stem_for, session_key, Message, Session};
use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, Duration};
use tracing::{error, info};

pub const PERSISTENCE_INTERVAL_SECS: u64 = 30;

pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    persistence: Arc<Persistence>,
}

impl SessionManager {
    pub fn new(sessions_dir: PathBuf) -> Self {
        let persistence = Arc::new(Persistence::new(sessions_dir));
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            persistence,
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        self.persistence.create_sessions_dir().await?;

        let sessions = self.persistence.load_all_sessions().await?;
        let mut guard = self.sessions.write().await;
        for session in sessions {
            guard.insert(session.session_id.clone(), session);
        }
        let count = guard.len();
        drop(guard);

        info!("SessionManager initialized with {} sessions", count);
        Ok(())
    }

    pub async fn get_or_create_session(&self, channel: &str, chat_id: &str) -> Result<Session> {
        let key = session_key(channel, chat_id);

        {
            let guard = self.sessions.read().await;
            if let Some(session) = guard.get(&key) {
                return Ok(session.clone());
            }
        }

        let file_stem = file_stem_for(channel, chat_id);
        match self.persistence.load_session_by_stem(&file_stem).await {
            Ok(session) => {
                let mut guard = self.sessions.write().await;
                guard.insert(key, session.clone());
                Ok(session)
            }
            Err(_) => {
                let session = Session::new(channel.to_string(), chat_id.to_string());
                let mut guard = self.sessions.write().await;
                guard.insert(session.session_id.clone(), session.clone());
                Ok(session)
            }
        }
    }

    pub async fn add_message(&self, session_id: &str, message: Message) -> Result<()> {
        let mut guard = self.sessions.write().await;

        if let Some(session) = guard.get_mut(session_id) {
            session.add_message(message);
            Ok(())
        } else {
            anyhow::bail!("Session {} not found", session_id)
        }
    }

    pub async fn get_session(&self, session_id: &str) -> Option<Session> {
        let guard = self.sessions.read().await;
        guard.get(session_id).cloned()
    }

    /// Returns the dispatch keys of every session currently tracked in memory.
    pub async fn list_sessions(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Removes a session from memory and deletes its JSONL file.
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        let file_stem = {
            let mut guard = self.sessions.write().await;
            match guard.remove(session_id) {
                Some(session) => session.file_stem(),
                None => {
                    // Not resident in memory; best-effort guess from the key
                    // so an on-disk-only session can still be deleted.
                    session_id
                        .split_once(':')
                        .map(|(c, id)| file_stem_for(c, id))
                        .unwrap_or_else(|| session_id.to_string())
                }
            }
        };
        self.persistence.delete_session(&file_stem).await
    }

    pub async fn save_all_sessions(&self) -> Result<()> {
        let guard = self.sessions.read().await;
        let sessions: Vec<Session> = guard.values().cloned().collect();
        drop(guard);

        for session in sessions {
            if let Err(e) = self.persistence.save_session(&session).await {
                error!("Failed to save session {}: {}", session.session_id, e);
            }
        }

        info!("Saved all sessions to disk");
        Ok(())
    }

    /// Starts the periodic auto-persistence loop. Returns a join handle and a
    /// shutdown sender so the gateway can stop it (and flush once more) as
    /// part of a bounded graceful shutdown.
    pub fn start_auto_persistence(&self) -> (tokio::task::JoinHandle<()>, mpsc::Sender<()>) {
        let sessions = Arc::clone(&self.sessions);
        let persistence = Arc::clone(&self.persistence);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(PERSISTENCE_INTERVAL_SECS));

            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        Self::flush(&sessions, &persistence).await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Auto-persistence task received shutdown signal, flushing once more");
                        Self::flush(&sessions, &persistence).await;
                        break;
                    }
                }
            }
        });

        (handle, shutdown_tx)
    }

    /// Starts the background session cleanup task. Delegates to [`Cleanup`].
    pub fn start_cleanup_task(
        &self,
    ) -> (tokio::task::JoinHandle<()>, mpsc::Sender<()>) {
        crate::session::cleanup::Cleanup::new(self.persistence.sessions_dir.clone())
            .start_cleanup_task()
    }

    async fn flush(sessions: &Arc<RwLock<HashMap<String, Session>>>, persistence: &Arc<Persistence>) {
        let guard = sessions.read().await;
        let sessions_vec: Vec<Session> = guard.values().cloned().collect();
        drop(guard);

        for session in sessions_vec {
            if let Err(e) = persistence.save_session(&session).await {
                error!("Auto-persistence failed for session {}: {}", session.session_id, e);
            }
        }

        info!("Auto-persistence cycle completed");
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn update_session(&self, session: Session) -> Result<()> {
        let mut guard = self.sessions.write().await;
        guard.insert(session.session_id.clone(), session);
        Ok(())
    }

    pub async fn persist_session(&self, session: &Session) -> Result<()> {
        self.persistence.save_session(session).await
    }
}
