//! Filesystem tool for the agent
//!
//! This tool provides filesystem operations (read, write, list) with security constraints.
//! All paths are validated and canonicalized to prevent path traversal attacks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::fs;

use crate::agent::tools::types::{Tool, ToolError, ToolExecutionContext, ToolResult};
use crate::utils::paths::{validate_path, PathValidationError};

/// Tool for filesystem operations
///
/// Provides read, write, and list operations on files within a restricted
/// base directory. All paths are validated to prevent path traversal attacks.
///
/// # Security
/// This tool implements NFR-S3: All paths are canonicalized and validated
/// using the centralized path validation utilities in `crate::utils::paths`.
pub struct FilesystemTool {
    /// The canonicalized base directory that all operations are restricted to
    /// This is stored in canonical form for performance (no repeated canonicalization)
    base_dir: PathBuf,
}

impl FilesystemTool {
    /// Creates a new FilesystemTool with the specified base directory
    ///
    /// The base directory is canonicalized once during construction and stored
    /// for efficient reuse in path validation operations.
    ///
    /// # Arguments
    /// * `base_dir` - The root directory that all filesystem operations are restricted to
    ///
    /// # Panics
    /// Panics if the base directory cannot be canonicalized (doesn't exist or is inaccessible)
    ///
    /// # Note
    /// For async construction, use `new_async()` instead
    pub fn new(base_dir: PathBuf) -> Self {
        // Canonicalize the base directory once for performance
        // In production, this should be validated during app initialization
        let canonical_base = std::fs::canonicalize(&base_dir)
            .unwrap_or_else(|e| panic!("Failed to canonicalize base directory {:?}: {}", base_dir, e));
        
        Self {
            base_dir: canonical_base,
        }
    }

    /// Validates a user-provided path using the centralized validation utilities
    ///
    /// # Arguments
    /// * `user_path` - The path provided by the user/agent
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - The canonicalized, validated path
    /// * `Err(ToolError)` - If path is invalid or outside allowed scope
    async fn validate_path_internal(&self, user_path: &str) -> ToolResult<PathBuf> {
        validate_path(&self.base_dir, user_path)
            .await
            .map_err(|e| match e {
                PathValidationError::OutsideBaseDirectory(path) => ToolError::PermissionDenied {
                    tool: self.name().to_string(),
                    message: format!("Path '{}' is outside the allowed base directory", path),
                },
                PathValidationError::SystemPathBlocked(path) => ToolError::PermissionDenied {
                    tool: self.name().to_string(),
                    message: format!("Access to system path '{}' is not allowed", path),
                },
                PathValidationError::CanonicalizationFailed { path, source } => {
                    ToolError::ExecutionFailed {
                        tool: self.name().to_string(),
                        message: format!("Failed to resolve path '{}': {}", path, source),
                    }
                }
                PathValidationError::InvalidBaseDirectory(msg) => ToolError::ExecutionFailed {
                    tool: self.name().to_string(),
                    message: format!("Base directory error: {}", msg),
                },
            })
    }

    /// Reads the contents of a file
    ///
    /// # Arguments
    /// * `path` - The validated, canonicalized path to read
    ///
    /// # Returns
    /// * `Ok(String)` - The file contents as UTF-8 text
    /// * `Err(ToolError)` - If file cannot be read
    async fn read_file(&self, path: &Path) -> ToolResult<String> {
        // Verify it's a file, not a directory
        let metadata = match fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ToolError::NotFound(format!(
                    "File not found: {}",
                    path.display()
                )));
            }
            Err(e) => {
                return Err(ToolError::ExecutionFailed {
                    tool: self.name().to_string(),
                    message: format!("Cannot access file metadata: {}", e),
                });
            }
        };

        if !metadata.is_file() {
            return Err(ToolError::ExecutionFailed {
                tool: self.name().to_string(),
                message: format!("'{}' is not a file", path.display()),
            });
        }

        // Read file content
        fs::read_to_string(path).await.map_err(|e| ToolError::ExecutionFailed {
            tool: self.name().to_string(),
            message: format!("Failed to read file '{}': {}", path.display(), e),
        })
    }

    /// Writes content to a file
    ///
    /// Creates parent directories if needed. Logs a warning if overwriting an existing file.
    ///
    /// # Arguments
    /// * `path` - The validated, canonicalized path to write
    /// * `content` - The content to write
    ///
    /// # Returns
    /// * `Ok(String)` - Success confirmation message
    /// * `Err(ToolError)` - If write fails
    async fn write_file(&self, path: &Path, content: &str) -> ToolResult<String> {
        // Check if file exists (for warning) - use async try_exists for non-blocking
        let exists = tokio::fs::try_exists(path)
            .await
            .unwrap_or(false);
        
        if exists {
            tracing::warn!(
                "File exists, overwriting: {}",
                path.display()
            );
        }

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| ToolError::ExecutionFailed {
                tool: self.name().to_string(),
                message: format!("Failed to create directory '{}': {}", parent.display(), e),
            })?;
        }

        // Write content
        fs::write(path, content).await.map_err(|e| ToolError::ExecutionFailed {
            tool: self.name().to_string(),
            message: format!("Failed to write file '{}': {}", path.display(), e),
        })?;

        Ok(format!("Successfully wrote to {}", path.display()))
    }

    /// Lists the contents of a directory
    ///
    /// # Arguments
    /// * `path` - The validated, canonicalized path to list
    ///
    /// # Returns
    /// * `Ok(String)` - JSON array of directory entries with name and type
    /// * `Err(ToolError)` - If path is not a directory or cannot be read
    ///
    /// # Entry Types
    /// - "file": Regular file
    /// - "directory": Directory
    /// - "other": Symlink, pipe, socket, or other special file type
    async fn list_dir(&self, path: &Path) -> ToolResult<String> {
        // Verify it's a directory
        let metadata = fs::metadata(path).await.map_err(|e| ToolError::ExecutionFailed {
            tool: self.name().to_string(),
            message: format!("Cannot access directory metadata: {}", e),
        })?;

        if !metadata.is_dir() {
            return Err(ToolError::ExecutionFailed {
                tool: self.name().to_string(),
                message: format!("Path '{}' is not a directory", path.display()),
            });
        }

        // Read directory entries
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(path).await.map_err(|e| ToolError::ExecutionFailed {
            tool: self.name().to_string(),
            message: format!("Failed to read directory '{}': {}", path.display(), e),
        })?;

        while let Some(entry) = dir.next_entry().await.map_err(|e| ToolError::ExecutionFailed {
            tool: self.name().to_string(),
            message: format!("Failed to read directory entry: {}", e),
        })? {
            let file_type = entry.file_type().await.ok();
            let entry_type = if file_type.map_or(false, |ft| ft.is_dir()) {
                "directory"
            } else if file_type.map_or(false, |ft| ft.is_file()) {
                "file"
            } else {
                "other"
            };

            entries.push(serde_json::json!({
                "name": entry.file_name().to_string_lossy().to_string(),
                "type": entry_type
            }));
        }

        // Return as JSON array
        serde_json::to_string(&entries).map_err(|e| ToolError::ExecutionFailed {
            tool: self.name().to_string(),
            message: format!("Failed to serialize directory listing: {}", e),
        })
    }
}

#[async_trait::async_trait]
impl Tool for FilesystemTool {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn description(&self) -> &str {
        "Read, write, and list files in the base directory. Supports three operations: \"read\" to read file contents, \"write\" to create or overwrite files, and \"list\" to list directory contents. All paths are restricted to the base directory for security."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["read", "write", "list"],
                    "description": "Filesystem operation to perform: read file, write file, or list directory"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory path relative to the base directory"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file (required for write operation)"
                }
            },
            "required": ["operation", "path"]
        })
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        _ctx: &ToolExecutionContext,
    ) -> ToolResult<String> {
        // Extract operation
        let operation = args
            .get("operation")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: "Missing required parameter 'operation'. Must be 'read', 'write', or 'list'.".to_string(),
            })?;

        // Extract path
        let path_str = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: "Missing required parameter 'path'".to_string(),
            })?;

        match operation {
            "read" => {
                let path = self.validate_path_internal(path_str).await?;
                self.read_file(&path).await
            }
            "write" => {
                let content = args
                    .get("content")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| ToolError::InvalidArguments {
                        tool: self.name().to_string(),
                        message: "Missing required parameter 'content' for write operation".to_string(),
                    })?;
                let path = self.validate_path_internal(path_str).await?;
                self.write_file(&path, content).await
            }
            "list" => {
                let path = self.validate_path_internal(path_str).await?;
                self.list_dir(&path).await
            }
            _ => Err(ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: format!(
                    "Invalid operation '{}'. Must be 'read', 'write', or 'list'.",
                    operation
                ),
            }),
        }
    }
}
