//! SQLite-backed chunked memory index with FTS5 retrieval
//!
//! Mirrors the `memory_sources`/`memory_entries`/`memory_entries_fts` schema:
//! ingest is mtime-gated (unchanged files are a no-op), a changed source has
//! all of its entries deleted and reinserted atomically, and `search` prefers
//! a `bm25`-ranked FTS5 match with a tokenised `LIKE` fallback when FTS5 is
//! unavailable at query time.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tokio::sync::Mutex;
use tokio::task;

const MIN_CHUNK_CHARS: usize = 12;
const MAX_CHUNK_CHARS: usize = 1000;
const MAX_QUERY_TOKENS: usize = 16;
const BUSY_TIMEOUT_MS: u64 = 3000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryHit {
    pub scope: String,
    pub source_key: String,
    pub content: String,
}

#[derive(thiserror::Error, Debug)]
pub enum MemoryIndexError {
    #[error("memory index error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("memory index task failed: {0}")]
    Join(#[from] task::JoinError),
}

pub type MemoryIndexResult<T> = Result<T, MemoryIndexError>;

/// Process-wide, internally-synchronized handle onto the memory database.
///
/// A single `Mutex<Connection>` serializes access from this process; SQLite's
/// own WAL journal mode plus a busy timeout keep it safe alongside other
/// processes touching the same file.
#[derive(Clone)]
pub struct MemoryIndex {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for MemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryIndex").finish_non_exhaustive()
    }
}

impl MemoryIndex {
    pub fn open(db_path: &Path) -> MemoryIndexResult<Self> {
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(db_path)?;
        Self::configure(&conn)?;
        Self::ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, useful for tests that don't want a temp file.
    pub fn open_in_memory() -> MemoryIndexResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;
        Self::ensure_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn configure(conn: &Connection) -> MemoryIndexResult<()> {
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
        Ok(())
    }

    fn ensure_schema(conn: &Connection) -> MemoryIndexResult<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS memory_sources (
                scope TEXT NOT NULL,
                source TEXT NOT NULL,
                source_key TEXT NOT NULL,
                mtime_ns INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (scope, source, source_key)
            );
            CREATE TABLE IF NOT EXISTS memory_entries (
                id INTEGER PRIMARY KEY,
                scope TEXT NOT NULL,
                source TEXT NOT NULL,
                source_key TEXT NOT NULL,
                content TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (scope, source, source_key, content_hash)
            );
            ",
        )?;

        // FTS5 may not be compiled in on every sqlite build; degrade to the
        // LIKE fallback in `search` if virtual-table creation fails.
        let fts_result = conn.execute_batch(
            "
            CREATE VIRTUAL TABLE IF NOT EXISTS memory_entries_fts
                USING fts5(content, scope, content='memory_entries', content_rowid='id');
            CREATE TRIGGER IF NOT EXISTS memory_entries_ai AFTER INSERT ON memory_entries BEGIN
                INSERT INTO memory_entries_fts(rowid, content, scope)
                VALUES (new.id, new.content, new.scope);
            END;
            CREATE TRIGGER IF NOT EXISTS memory_entries_ad AFTER DELETE ON memory_entries BEGIN
                INSERT INTO memory_entries_fts(memory_entries_fts, rowid, content, scope)
                VALUES('delete', old.id, old.content, old.scope);
            END;
            CREATE TRIGGER IF NOT EXISTS memory_entries_au AFTER UPDATE ON memory_entries BEGIN
                INSERT INTO memory_entries_fts(memory_entries_fts, rowid, content, scope)
                VALUES('delete', old.id, old.content, old.scope);
                INSERT INTO memory_entries_fts(rowid, content, scope)
                VALUES (new.id, new.content, new.scope);
            END;
            ",
        );
        if let Err(e) = fts_result {
            tracing::warn!(error = %e, "FTS5 virtual table unavailable, memory search will use LIKE fallback");
        }
        Ok(())
    }

    fn has_fts(conn: &Connection) -> bool {
        conn.query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='memory_entries_fts'",
            [],
            |_| Ok(()),
        )
        .optional()
        .unwrap_or(None)
        .is_some()
    }

    /// Indexes a file under `(scope, source_key)` unless its mtime is
    /// unchanged since the last ingest, in which case this is a no-op.
    pub async fn ingest_file_if_changed(
        &self,
        scope: &str,
        source_key: &str,
        path: &Path,
    ) -> MemoryIndexResult<()> {
        let conn = Arc::clone(&self.conn);
        let scope = scope.to_string();
        let source_key = source_key.to_string();
        let path = path.to_path_buf();

        task::spawn_blocking(move || -> MemoryIndexResult<()> {
            let guard = conn.blocking_lock();
            let mtime_ns = file_mtime_ns(&path);
            let now = Utc::now().to_rfc3339();

            let existing: Option<i64> = guard
                .query_row(
                    "SELECT mtime_ns FROM memory_sources WHERE scope = ?1 AND source = 'file' AND source_key = ?2",
                    params![scope, source_key],
                    |row| row.get(0),
                )
                .optional()?;

            if existing == Some(mtime_ns) {
                return Ok(());
            }

            guard.execute(
                "DELETE FROM memory_entries WHERE scope = ?1 AND source = 'file' AND source_key = ?2",
                params![scope, source_key],
            )?;

            let text = std::fs::read_to_string(&path).unwrap_or_default();
            for chunk in split_into_chunks(&text) {
                let hash = hash_text(&chunk);
                guard.execute(
                    "INSERT OR IGNORE INTO memory_entries
                        (scope, source, source_key, content, content_hash, created_at, updated_at)
                     VALUES (?1, 'file', ?2, ?3, ?4, ?5, ?5)",
                    params![scope, source_key, chunk, hash, now],
                )?;
            }

            guard.execute(
                "INSERT INTO memory_sources(scope, source, source_key, mtime_ns, updated_at)
                 VALUES (?1, 'file', ?2, ?3, ?4)
                 ON CONFLICT(scope, source, source_key)
                 DO UPDATE SET mtime_ns = excluded.mtime_ns, updated_at = excluded.updated_at",
                params![scope, source_key, mtime_ns, now],
            )?;

            Ok(())
        })
        .await?
    }

    /// Searches a single scope for up to `limit` chunks matching `query_text`.
    pub async fn search(
        &self,
        scope: &str,
        query_text: &str,
        limit: usize,
    ) -> MemoryIndexResult<Vec<MemoryHit>> {
        let tokens = extract_tokens(query_text);
        if tokens.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let conn = Arc::clone(&self.conn);
        let scope = scope.to_string();

        task::spawn_blocking(move || -> MemoryIndexResult<Vec<MemoryHit>> {
            let guard = conn.blocking_lock();

            if Self::has_fts(&guard) {
                let fts_query = tokens.join(" OR ");
                let mut stmt = guard.prepare(
                    "SELECT memory_entries.source_key, memory_entries.content
                     FROM memory_entries_fts
                     JOIN memory_entries ON memory_entries_fts.rowid = memory_entries.id
                     WHERE memory_entries.scope = ?1 AND memory_entries_fts MATCH ?2
                     ORDER BY bm25(memory_entries_fts)
                     LIMIT ?3",
                )?;
                let rows = stmt
                    .query_map(params![scope, fts_query, limit as i64], |row| {
                        Ok(MemoryHit {
                            scope: scope.clone(),
                            source_key: row.get(0)?,
                            content: row.get(1)?,
                        })
                    })
                    .and_then(|mapped| mapped.collect::<rusqlite::Result<Vec<_>>>());

                match rows {
                    Ok(hits) => return Ok(hits),
                    Err(e) => {
                        tracing::warn!(error = %e, "FTS query failed, falling back to LIKE search");
                    }
                }
            }

            let placeholders = tokens.iter().map(|_| "content LIKE ?").collect::<Vec<_>>().join(" OR ");
            let sql = format!(
                "SELECT source_key, content FROM memory_entries WHERE scope = ? AND ({}) LIMIT ?",
                placeholders
            );
            let mut stmt = guard.prepare(&sql)?;
            let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::with_capacity(tokens.len() + 2);
            bind.push(Box::new(scope.clone()));
            for t in &tokens {
                bind.push(Box::new(format!("%{}%", t)));
            }
            bind.push(Box::new(limit as i64));
            let bind_refs: Vec<&dyn rusqlite::ToSql> = bind.iter().map(|b| b.as_ref()).collect();

            let rows = stmt.query_map(bind_refs.as_slice(), |row| {
                Ok(MemoryHit {
                    scope: scope.clone(),
                    source_key: row.get(0)?,
                    content: row.get(1)?,
                })
            })?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await?
    }

    /// Searches `global` plus `active_scope` (when distinct), de-duplicating
    /// hits that share the same `(source_key, content)` pair.
    pub async fn search_global_and_scope(
        &self,
        active_scope: &str,
        query_text: &str,
        limit_per_scope: usize,
    ) -> MemoryIndexResult<Vec<MemoryHit>> {
        let mut hits = self.search("global", query_text, limit_per_scope).await?;
        if active_scope != "global" {
            let scoped = self.search(active_scope, query_text, limit_per_scope).await?;
            for hit in scoped {
                if !hits.iter().any(|h| h.source_key == hit.source_key && h.content == hit.content) {
                    hits.push(hit);
                }
            }
        }
        Ok(hits)
    }
}

fn file_mtime_ns(path: &Path) -> i64 {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Content fingerprint used only for the `UNIQUE(scope, source, source_key,
/// content_hash)` de-dup constraint, not for any security purpose.
fn hash_text(s: &str) -> String {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

fn split_into_chunks(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let mut chunks = Vec::new();
    for part in split_on_blank_lines(trimmed) {
        let p = part.trim();
        if p.chars().count() < MIN_CHUNK_CHARS {
            continue;
        }
        let truncated: String = if p.chars().count() > MAX_CHUNK_CHARS {
            p.chars().take(MAX_CHUNK_CHARS).collect()
        } else {
            p.to_string()
        };
        chunks.push(truncated);
    }
    chunks
}

fn split_on_blank_lines(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\n' {
            let mut j = i + 1;
            let mut blank_run = 1;
            while j < bytes.len() && (bytes[j] == b'\n' || bytes[j] == b' ' || bytes[j] == b'\t' || bytes[j] == b'\r') {
                if bytes[j] == b'\n' {
                    blank_run += 1;
                }
                j += 1;
            }
            if blank_run >= 2 {
                parts.push(&text[start..i]);
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    parts.push(&text[start..]);
    parts
}

fn extract_tokens(query_text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    for ch in query_text.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            if current.chars().count() >= 2 {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
        }
    }
    if current.chars().count() >= 2 {
        tokens.push(current);
    }
    tokens.truncate(MAX_QUERY_TOKENS);
    tokens
}
