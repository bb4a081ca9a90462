//! Shell execution tool
//!
//! Runs an arbitrary shell command and returns its stdout/stderr. This is not
//! a sandbox: the guardrails below are best-effort string/path checks, not a
//! security boundary. Deployments that need real isolation should run the
//! agent inside an OS-level sandbox (container/VM/jail).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::Value;
use tokio::process::Command;

use crate::agent::tools::types::{Tool, ToolError, ToolExecutionContext, ToolResult};

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const MAX_OUTPUT_CHARS: usize = 10_000;

/// Environment variable names whose value is never passed to a spawned
/// command, regardless of suffix match below.
const EXPLICIT_SECRET_KEYS: &[&str] = &[
    "OPENAI_API_KEY",
    "OPENROUTER_API_KEY",
    "ANTHROPIC_API_KEY",
    "GROQ_API_KEY",
    "BRAVE_API_KEY",
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_AD_TOKEN",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "TELEGRAM_BOT_TOKEN",
];

fn default_deny_patterns() -> Vec<&'static str> {
    vec![
        r"\brm\s+-[rf]{1,2}\b",
        r"\bdel\s+/[fq]\b",
        r"\brmdir\s+/s\b",
        r"\b(format|mkfs|diskpart)\b",
        r"\bdd\s+if=",
        r">\s*/dev/sd",
        r"\b(shutdown|reboot|poweroff)\b",
        r":\(\)\s*\{.*\};\s*:",
    ]
}

/// Tool to execute shell commands.
pub struct ExecTool {
    timeout_secs: u64,
    base_dir: PathBuf,
    deny_patterns: Vec<Regex>,
    secret_suffix: Regex,
}

impl ExecTool {
    /// Creates a new `ExecTool` restricted to `workspace_path`. All relative
    /// commands and `cd`/working-directory overrides are resolved against
    /// this root and may not escape it.
    pub fn new(workspace_path: PathBuf) -> Result<Self, ToolError> {
        let base_dir = std::fs::canonicalize(&workspace_path).map_err(|e| ToolError::ExecutionFailed {
            tool: "exec".to_string(),
            message: format!("Failed to canonicalize workspace {:?}: {}", workspace_path, e),
        })?;

        let deny_patterns = default_deny_patterns()
            .into_iter()
            .map(|p| Regex::new(p).expect("deny pattern must compile"))
            .collect();

        let secret_suffix = Regex::new(r"(?i)(_API_KEY|_ACCESS_KEY|_SECRET(_KEY)?|_TOKEN|PASSWORD)$")
            .expect("secret suffix pattern must compile");

        Ok(Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_dir,
            deny_patterns,
            secret_suffix,
        })
    }

    fn guard_command(&self, command: &str, cwd: &Path) -> Option<String> {
        let lower = command.to_lowercase();

        for pattern in &self.deny_patterns {
            if pattern.is_match(&lower) {
                return Some("Error: Command blocked by safety guard (dangerous pattern detected)".to_string());
            }
        }

        if let Ok(resolved) = cwd.canonicalize() {
            if resolved != self.base_dir && !resolved.starts_with(&self.base_dir) {
                return Some(
                    "Error: Command blocked by safety guard (working_dir outside workspace)".to_string(),
                );
            }
        } else {
            return Some("Error: Command blocked by safety guard (invalid working_dir)".to_string());
        }

        if command.contains("../") || command.contains("..\\") {
            return Some("Error: Command blocked by safety guard (path traversal detected)".to_string());
        }

        None
    }

    /// Builds the environment passed to the subprocess with secret-looking
    /// variables removed, so `env`/`printenv` can't trivially leak API keys.
    fn build_subprocess_env(&self) -> HashMap<String, String> {
        std::env::vars()
            .filter(|(k, _)| {
                !EXPLICIT_SECRET_KEYS.contains(&k.as_str()) && !self.secret_suffix.is_match(k)
            })
            .collect()
    }

    fn resolve_cwd(&self, working_dir: Option<&str>) -> PathBuf {
        match working_dir {
            Some(dir) => {
                let candidate = Path::new(dir);
                if candidate.is_absolute() {
                    candidate.to_path_buf()
                } else {
                    self.base_dir.join(candidate)
                }
            }
            None => self.base_dir.clone(),
        }
    }

    fn truncate_output(output: String) -> String {
        if output.chars().count() <= MAX_OUTPUT_CHARS {
            return output;
        }
        let truncated: String = output.chars().take(MAX_OUTPUT_CHARS).collect();
        let omitted = output.chars().count() - MAX_OUTPUT_CHARS;
        format!("{}\n... (truncated, {} more chars)", truncated, omitted)
    }
}

#[async_trait::async_trait]
impl Tool for ExecTool {
    fn name(&self) -> &str {
        "exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Commands time out after 60s. \
         Output is truncated at 10000 chars. Destructive commands (rm -rf, format, etc.) \
         are blocked. API keys are stripped from the subprocess environment."
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "working_dir": {
                    "type": "string",
                    "description": "Optional working directory for the command, relative to the workspace"
                }
            },
            "required": ["command"]
        })
    }

    fn max_retries(&self) -> u32 {
        1
    }

    fn parallel_safe(&self) -> bool {
        // Shell commands can mutate shared workspace state (files the LLM
        // just wrote, processes it's waiting on); run them one at a time.
        false
    }

    async fn execute(
        &self,
        args: HashMap<String, Value>,
        _ctx: &ToolExecutionContext,
    ) -> ToolResult<String> {
        let command = args
            .get("command")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments {
                tool: self.name().to_string(),
                message: "Missing required parameter 'command'".to_string(),
            })?;

        let working_dir = args.get("working_dir").and_then(|v| v.as_str());
        let cwd = self.resolve_cwd(working_dir);

        if let Some(blocked) = self.guard_command(command, &cwd) {
            return Ok(blocked);
        }

        let env = self.build_subprocess_env();

        let mut cmd = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        };
        cmd.current_dir(&cwd);
        cmd.env_clear();
        cmd.envs(&env);
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());

        let child = cmd.spawn().map_err(|e| ToolError::ExecutionFailed {
            tool: self.name().to_string(),
            message: format!("Failed to spawn command: {}", e),
        })?;

        let timeout = std::time::Duration::from_secs(self.timeout_secs);
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Ok(format!("Error executing command: {}", e));
            }
            Err(_) => {
                return Ok(format!("Error: Command timed out after {} seconds", self.timeout_secs));
            }
        };

        let mut parts = Vec::new();
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !stdout.is_empty() {
            parts.push(stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stderr.trim().is_empty() {
            parts.push(format!("STDERR:\n{}", stderr));
        }
        if !output.status.success() {
            parts.push(format!("\nExit code: {}", output.status.code().unwrap_or(-1)));
        }

        let result = if parts.is_empty() {
            "(no output)".to_string()
        } else {
            parts.join("\n")
        };

        Ok(Self::truncate_output(result))
    }
}
