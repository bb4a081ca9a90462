//! Long-term memory management
//!
//! This module provides functions and structures for managing long-term memory stored in MEMORY.md

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::fs;
use tokio::sync::Mutex;

use crate::memory::types::MemoryError;

/// Maximum file size for MEMORY.md (1MB)
const MEMORY_FILE_SIZE_LIMIT: u64 = 1024 * 1024;

/// Timestamp format suffix in memory entries: "(added at YYYY-MM-DDTHH:MM:SSZ)"
const TIMESTAMP_SUFFIX: &str = "(added at ";

/// Checks file size and logs warning if exceeds limit
///
/// # Arguments
/// * `file_path` - Path to the file to check
///
/// # Returns
/// * `Ok(())` - Always returns Ok, logs warning if file is too large
/// * `Err(MemoryError)` - Only for metadata read errors
async fn check_file_size(file_path: &Path) -> Result<(), MemoryError> {
    if file_path.exists() {
        let metadata = fs::metadata(file_path)
            .await
            .map_err(|e| MemoryError::StorageFailed {
                operation: format!("get file metadata for {}", file_path.display()),
                source: e,
            })?;
        
        let size = metadata.len();
        if size > MEMORY_FILE_SIZE_LIMIT {
            tracing::warn!(
                "Memory file '{}' exceeds size limit: {} bytes (limit: {} bytes). Consider memory maintenance.",
                file_path.display(),
                size,
                MEMORY_FILE_SIZE_LIMIT
            );
        }
    }
    
    Ok(())
}

/// A long-term memory entry with content and timestamp
#[derive(Debug, Clone)]
pub struct LongTermMemoryEntry {
    /// The content of the memory entry
    pub content: String,
    /// When the entry was created (ISO 8601 UTC)
    pub timestamp: DateTime<Utc>,
}

impl LongTermMemoryEntry {
    /// Creates a new long-term memory entry with the current timestamp
    ///
    /// # Arguments
    /// * `content` - The content to store
    pub fn new(content: String) -> Self {
        Self {
            content,
            timestamp: Utc::now(),
        }
    }

    /// Creates a long-term memory entry with a specific timestamp
    ///
    /// # Arguments
    /// * `content` - The content to store
    /// * `timestamp` - The timestamp to use
    pub fn with_timestamp(content: String, timestamp: DateTime<Utc>) -> Self {
        Self { content, timestamp }
    }

    /// Parses a memory entry from a bullet point line
    ///
    /// Extracts content and timestamp from format: "- Content (added at 2026-02-16T10:30:00Z)"
    ///
    /// # Arguments
    /// * `line` - The bullet point line to parse
    ///
    /// # Returns
    /// * `Some(LongTermMemoryEntry)` - If parsing succeeds
    /// * `None` - If format is invalid
    fn parse_from_line(line: &str) -> Self {
        let content_str = line.trim();
        
        // Try to extract timestamp from "(added at ...)" suffix
        if let Some(timestamp_start) = content_str.rfind(TIMESTAMP_SUFFIX) {
            let content = content_str[..timestamp_start].trim().to_string();
            let timestamp_str = &content_str[timestamp_start + TIMESTAMP_SUFFIX.len()..];
            
            // Extract timestamp until closing ')'
            if let Some(end_paren) = timestamp_str.find(')') {
                let timestamp_value = &timestamp_str[..end_paren];
                
                // Try to parse ISO 8601 timestamp
                if let Ok(timestamp) = DateTime::parse_from_rfc3339(timestamp_value) {
                    return Self {
                        content,
                        timestamp: timestamp.with_timezone(&Utc),
                    };
                }
            }
        }
        
        // Fallback: use entire line as content with current timestamp
        Self::new(content_str.to_string())
    }
}

/// A dated section in the memory file
#[derive(Debug, Clone)]
pub struct MemorySection {
    /// The date of this section (YYYY-MM-DD)
    pub date: NaiveDate,
    /// The entries in this section
    pub entries: Vec<LongTermMemoryEntry>,
}

/// Long-term memory storage using MEMORY.md file
///
/// Thread-safe via Arc<Mutex<>> for write serialization and caching.
/// Stores memory in Markdown format with dated sections (## YYYY-MM-DD) and bullet points.
#[derive(Debug, Clone)]
pub struct LongTermMemory {
    /// Path to the MEMORY.md file
    file_path: PathBuf,
    /// Cache of parsed sections (optional optimization)
    cache: Arc<Mutex<Option<Vec<MemorySection>>>>,
    /// Write lock to prevent concurrent write races
    write_lock: Arc<Mutex<()>>,
}

impl LongTermMemory {
    /// Creates a new LongTermMemory for the given workspace path
    ///
    /// # Arguments
    /// * `workspace_path` - The workspace directory (e.g., ~/.miniclaw/workspace)
    pub fn new(workspace_path: &Path) -> Self {
        let file_path = workspace_path.join("memory").join("MEMORY.md");
        Self {
            file_path,
            cache: Arc::new(Mutex::new(None)),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Path to the underlying MEMORY.md file.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Ensures the MEMORY.md file exists with a default template
    ///
    /// Creates parent directories and sets file permissions to 0600.
    ///
    /// # Returns
    /// * `Ok(())` - File exists or was created successfully
    /// * `Err(MemoryError)` - If creation fails
    pub async fn ensure_exists(&self) -> Result<(), MemoryError> {
        if !self.file_path.exists() {
            // Create parent directories
            if let Some(parent) = self.file_path.parent() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| MemoryError::StorageFailed {
                        operation: format!("create memory directory {}", parent.display()),
                        source: e,
                    })?;
            }

            // Create default template
            let template = "# Memory\n\n";
            fs::write(&self.file_path, template)
                .await
                .map_err(|e| MemoryError::StorageFailed {
                    operation: format!("create memory file {}", self.file_path.display()),
                    source: e,
                })?;

            // Set permissions to 0600 (owner read/write only)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let perms = std::fs::Permissions::from_mode(0o600);
                std::fs::set_permissions(&self.file_path, perms)
                    .map_err(|e| MemoryError::StorageFailed {
                        operation: format!("set file permissions for {}", self.file_path.display()),
                        source: e,
                    })?;
            }

            tracing::info!("Created long-term memory file: {}", self.file_path.display());
        }

        Ok(())
    }

    /// Appends content to long-term memory
    ///
    /// Groups entries by date (## YYYY-MM-DD) and adds bullet points.
    /// Creates the file if it doesn't exist.
    /// Thread-safe: uses write lock to prevent concurrent modifications.
    ///
    /// # Arguments
    /// * `content` - The content to append
    ///
    /// # Returns
    /// * `Ok(())` - Content appended successfully
    /// * `Err(MemoryError)` - If append fails
    pub async fn append_entry(&self, content: &str) -> Result<(), MemoryError> {
        if content.trim().is_empty() {
            return Err(MemoryError::InvalidContent("Content cannot be empty".to_string()));
        }

        // Acquire write lock to prevent concurrent modifications
        let _lock = self.write_lock.lock().await;

        self.ensure_exists().await?;

        // Check file size
        if let Err(e) = check_file_size(&self.file_path).await {
            tracing::warn!("Memory file size check: {}", e);
        }

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let timestamp = Utc::now().to_rfc3339();
        let entry_line = format!("- {} {} {})\n", content.trim(), TIMESTAMP_SUFFIX, timestamp);

        // Read existing content
        let existing = fs::read_to_string(&self.file_path)
            .await
            .map_err(|e| MemoryError::StorageFailed {
                operation: format!("read memory file {}", self.file_path.display()),
                source: e,
            })?;

        // Check if today's section exists
        let today_header = format!("## {}", today);
        let new_content = if existing.contains(&today_header) {
            // Append to existing today section - use replacen to replace only first occurrence
            existing.replacen(
                &format!("{}\n", today_header),
                &format!("{}\n{}", today_header, entry_line),
                1,
            )
        } else {
            // Create new today section at end
            format!("{}\n{}\n{}", existing.trim(), today_header, entry_line)
        };

        // Write updated content
        fs::write(&self.file_path, new_content)
            .await
            .map_err(|e| MemoryError::StorageFailed {
                operation: format!("write memory file {}", self.file_path.display()),
                source: e,
            })?;

        // Set permissions again in case file was recreated
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&self.file_path, perms);
        }

        // Invalidate cache
        let mut cache = self.cache.lock().await;
        *cache = None;

        tracing::debug!(
            file = %self.file_path.display(),
            date = %today,
            "Added entry to long-term memory"
        );

        Ok(())
    }

    /// Reads all memory sections from the file
    ///
    /// Parses the Markdown structure and extracts dated sections.
    /// Returns empty Vec if file doesn't exist.
    ///
    /// # Returns
    /// * `Ok(Vec<MemorySection>)` - All memory sections
    /// * `Err(MemoryError)` - If reading fails
    pub async fn read_all(&self) -> Result<Vec<MemorySection>, MemoryError> {
        // Check cache first
        let cache = self.cache.lock().await;
        if let Some(ref sections) = *cache {
            return Ok(sections.clone());
        }
        drop(cache);

        if !self.file_path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.file_path)
            .await
            .map_err(|e| MemoryError::StorageFailed {
                operation: format!("read memory file {}", self.file_path.display()),
                source: e,
            })?;

        let sections = Self::parse_memory_content(&content)?;

        // Update cache
        let mut cache = self.cache.lock().await;
        *cache = Some(sections.clone());

        Ok(sections)
    }

    /// Reads today's entries only
    ///
    /// Filters entries by current date (YYYY-MM-DD).
    /// Returns empty Vec if no entries for today.
    ///
    /// # Returns
    /// * `Ok(Vec<LongTermMemoryEntry>)` - Today's entries
    /// * `Err(MemoryError)` - If reading fails
    pub async fn read_today(&self) -> Result<Vec<LongTermMemoryEntry>, MemoryError> {
        let all = self.read_all().await?;
        let today = Utc::now().date_naive();

        Ok(all
            .into_iter()
            .find(|section| section.date == today)
            .map(|section| section.entries)
            .unwrap_or_default())
    }

    /// Parses memory content from Markdown format
    ///
    /// Extracts ## YYYY-MM-DD sections and bullet points with timestamps.
    fn parse_memory_content(content: &str) -> Result<Vec<MemorySection>, MemoryError> {
        let mut sections = Vec::new();
        let mut current_section: Option<MemorySection> = None;

        for line in content.lines() {
            if let Some(date_str) = line.strip_prefix("## ") {
                // Save previous section if exists
                if let Some(section) = current_section.take() {
                    sections.push(section);
                }

                // Parse date from header
                if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                    current_section = Some(MemorySection {
                        date,
                        entries: Vec::new(),
                    });
                }
            } else if let Some(entry_content) = line.strip_prefix("- ") {
                if let Some(ref mut section) = current_section {
                    // Parse bullet point entry with timestamp extraction
                    let entry = LongTermMemoryEntry::parse_from_line(entry_content);
                    section.entries.push(entry);
                }
            }
        }

        // Don't forget last section
        if let Some(section) = current_section {
            sections.push(section);
        }

        Ok(sections)
    }
}
