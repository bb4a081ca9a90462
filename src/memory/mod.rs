//! Memory system for the agent
//!
//! Two concerns live here, kept deliberately separate:
//! - the write path (`long_term`, `daily_notes`): markdown files a human or
//!   the `write_memory` tool can read directly.
//! - the retrieval path (`index`): a SQLite+FTS5 chunked index of those same
//!   files, kept current by re-ingesting a file whenever it changes, used by
//!   the context builder and the `memory rank` CLI command.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};

pub mod daily_notes;
pub mod index;
pub mod long_term;
pub mod types;

use index::{MemoryHit, MemoryIndex};
use long_term::{LongTermMemory, LongTermMemoryEntry, MemorySection};
use types::{MemoryEntry, MemoryError};

/// Default number of ranked results `memory rank` returns when the caller
/// doesn't request a specific limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
/// Hard cap on ranked results, regardless of what the caller asks for.
pub const MAX_SEARCH_RESULTS: usize = 50;

const INDEX_SCOPE: &str = "global";
const RECENT_DAILY_NOTE_DAYS: usize = 30;

/// Which file a ranked memory hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemorySource {
    LongTerm,
    DailyNote,
}

impl fmt::Display for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemorySource::LongTerm => write!(f, "Long-term Memory"),
            MemorySource::DailyNote => write!(f, "Daily Note"),
        }
    }
}

/// A single ranked hit from `MemoryStore::search_memories`.
#[derive(Debug, Clone)]
pub struct RankedMemory {
    pub content: String,
    pub score: usize,
    pub source: MemorySource,
    pub date: Option<DateTime<Utc>>,
    pub excerpt: String,
}

/// Write path for long-term memory and daily notes, plus a handle onto the
/// retrieval index that's kept in sync with every successful write.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    workspace_path: PathBuf,
    long_term: LongTermMemory,
    index: MemoryIndex,
}

impl MemoryStore {
    /// Creates a new MemoryStore rooted at `workspace_path`.
    ///
    /// If the on-disk index can't be opened (e.g. a read-only filesystem),
    /// falls back to an in-memory index and logs a warning rather than
    /// failing construction outright — retrieval degrades, writes don't.
    pub fn new(workspace_path: PathBuf) -> Self {
        let long_term = LongTermMemory::new(&workspace_path);
        let db_path = workspace_path.join("memory").join("index.sqlite3");
        let index = MemoryIndex::open(&db_path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, path = %db_path.display(), "failed to open memory index, falling back to in-memory index");
            MemoryIndex::open_in_memory().expect("in-memory sqlite connection")
        });
        Self {
            workspace_path,
            long_term,
            index,
        }
    }

    /// The long-term memory (MEMORY.md) accessor, for direct reads.
    pub fn long_term(&self) -> &LongTermMemory {
        &self.long_term
    }

    /// The underlying retrieval index, for callers (the context builder)
    /// that want scoped search beyond the global `search_memories` helper.
    pub fn index(&self) -> &MemoryIndex {
        &self.index
    }

    fn daily_notes_dir(&self) -> PathBuf {
        self.workspace_path.join("memory")
    }

    /// Appends content to long-term memory (MEMORY.md), then re-indexes the
    /// file so retrieval reflects the new entry.
    pub async fn append_to_memory(&self, content: String) -> Result<String, MemoryError> {
        self.long_term.append_entry(&content).await?;
        let path = self.long_term.file_path().to_path_buf();
        if let Err(e) = self
            .index
            .ingest_file_if_changed(INDEX_SCOPE, "MEMORY.md", &path)
            .await
        {
            tracing::warn!(error = %e, "failed to re-index MEMORY.md after write");
        }
        Ok(path.to_string_lossy().to_string())
    }

    /// Creates a daily note, then re-indexes that day's file.
    pub async fn create_daily_note(&self, content: String) -> Result<String, MemoryError> {
        let (file_path, _entry) =
            daily_notes::create_daily_note(&self.workspace_path, content, None::<fn(MemoryEntry)>)
                .await?;
        let path = PathBuf::from(&file_path);
        let source_key = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.clone());
        if let Err(e) = self
            .index
            .ingest_file_if_changed(INDEX_SCOPE, &source_key, &path)
            .await
        {
            tracing::warn!(error = %e, "failed to re-index daily note after write");
        }
        Ok(file_path)
    }

    /// Reads daily notes from the last `days` calendar days, most recent
    /// section first.
    pub async fn read_recent_daily_notes(
        &self,
        days: usize,
    ) -> Result<Vec<MemorySection>, MemoryError> {
        let dir = self.daily_notes_dir();
        let cutoff = Utc::now().date_naive() - chrono::Duration::days(days as i64 - 1);

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MemoryError::StorageFailed {
                    operation: format!("read directory {}", dir.display()),
                    source: e,
                });
            }
        };

        let mut dated_files = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| MemoryError::StorageFailed {
            operation: "read directory entry".to_string(),
            source: e,
        })? {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
                continue;
            };
            if date >= cutoff {
                dated_files.push((date, path));
            }
        }
        dated_files.sort_by(|a, b| b.0.cmp(&a.0));

        let mut sections = Vec::with_capacity(dated_files.len());
        for (date, path) in dated_files {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| MemoryError::StorageFailed {
                    operation: format!("read daily note {}", path.display()),
                    source: e,
                })?;
            let entries = parse_daily_note_entries(&content, date);
            if !entries.is_empty() {
                sections.push(MemorySection { date, entries });
            }
        }

        Ok(sections)
    }

    /// Searches the global index of long-term memory and daily notes,
    /// re-ingesting both so results reflect the latest writes first.
    pub async fn search_memories(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<RankedMemory>, MemoryError> {
        self.reindex_all().await;

        let limit = limit.min(MAX_SEARCH_RESULTS).max(1);
        let hits = self
            .index
            .search(INDEX_SCOPE, query, limit)
            .await
            .map_err(|e| MemoryError::StorageFailed {
                operation: "search memory index".to_string(),
                source: std::io::Error::other(e.to_string()),
            })?;

        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, hit)| rank_hit(i, limit, hit))
            .collect())
    }

    /// Re-ingests MEMORY.md and recent daily notes so a search reflects
    /// files that may have been edited outside this process.
    async fn reindex_all(&self) {
        let memory_path = self.long_term.file_path().to_path_buf();
        if memory_path.exists() {
            if let Err(e) = self
                .index
                .ingest_file_if_changed(INDEX_SCOPE, "MEMORY.md", &memory_path)
                .await
            {
                tracing::warn!(error = %e, "failed to re-index MEMORY.md before search");
            }
        }

        let dir = self.daily_notes_dir();
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            return;
        };
        let cutoff = Utc::now().date_naive() - chrono::Duration::days(RECENT_DAILY_NOTE_DAYS as i64 - 1);
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") else {
                continue;
            };
            if date < cutoff {
                continue;
            }
            let source_key = format!("{}.md", stem);
            if let Err(e) = self
                .index
                .ingest_file_if_changed(INDEX_SCOPE, &source_key, &path)
                .await
            {
                tracing::warn!(error = %e, source_key = %source_key, "failed to re-index daily note before search");
            }
        }
    }
}

fn rank_hit(position: usize, limit: usize, hit: MemoryHit) -> RankedMemory {
    let (source, date) = if hit.source_key == "MEMORY.md" {
        (MemorySource::LongTerm, None)
    } else {
        let date = hit
            .source_key
            .strip_suffix(".md")
            .and_then(|stem| NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc));
        (MemorySource::DailyNote, date)
    };

    let excerpt = if hit.content.chars().count() > 200 {
        format!("{}...", hit.content.chars().take(200).collect::<String>())
    } else {
        hit.content.clone()
    };

    RankedMemory {
        content: hit.content,
        score: limit.saturating_sub(position),
        source,
        date,
        excerpt,
    }
}

/// Parses a daily note file's `## HH:MM:SS UTC` / content / `---` blocks
/// into entries timestamped against `date`.
fn parse_daily_note_entries(content: &str, date: NaiveDate) -> Vec<LongTermMemoryEntry> {
    let mut entries = Vec::new();
    let mut lines = content.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(time_str) = line.strip_prefix("## ").map(|s| s.trim()) else {
            continue;
        };
        let Ok(time) = chrono::NaiveTime::parse_from_str(
            time_str.trim_end_matches(" UTC").trim(),
            "%H:%M:%S",
        ) else {
            continue;
        };

        let mut body_lines = Vec::new();
        for next in lines.by_ref() {
            if next.trim() == "---" {
                break;
            }
            body_lines.push(next);
        }
        let body = body_lines.join("\n").trim().to_string();
        if body.is_empty() {
            continue;
        }

        let timestamp = DateTime::<Utc>::from_naive_utc_and_offset(date.and_time(time), Utc);
        entries.push(LongTermMemoryEntry::with_timestamp(body, timestamp));
    }

    entries
}
