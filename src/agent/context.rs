//! Context Builder — assembles the system prompt and per-call message list
//! consumed by the Agent Loop.
//!
//! The system prompt is four sections joined by `\n\n---\n\n`: a freshly
//! generated identity block, the workspace bootstrap files, memory retrieved
//! for the current turn, and the skills available to this call. Bootstrap and
//! skills are cached against a fingerprint of what would change them; memory
//! never is, since its query depends on the current message.

use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use tokio::fs;

use crate::agent::agent_loop::{AgentError, ContextBuilder, LlmMessage, LlmRole, Result};
use crate::chat::InboundMessage;
use crate::memory::MemoryStore;
use crate::providers::LlmToolCall;
use crate::session::{Message, Session};
use crate::skills::loader::load_all_skills;
use crate::skills::types::Skill;

/// Bootstrap files, in load order. Only the ones present are concatenated.
const BOOTSTRAP_FILES: &[&str] = &["AGENTS.md", "SOUL.md", "USER.md", "TOOLS.md", "IDENTITY.md"];

/// Configuration for context building
#[derive(Debug, Clone)]
pub struct ContextBuilderConfig {
    /// Head-truncation budget for the concatenated bootstrap files
    pub bootstrap_max_chars: usize,
    /// Tail-truncation budget for the retrieved-memory section
    pub memory_max_chars: usize,
    /// Tail-truncation budget for the skills section
    pub skills_max_chars: usize,
    /// Character budget the trimmed history must fit within
    pub history_max_chars: usize,
    /// Hard cap on how many recent session messages are even considered
    pub max_history_messages: usize,
    /// How many of the most recent user turns feed the memory query
    pub memory_query_turns: usize,
    /// Memory hits requested per scope (global + active)
    pub memory_limit_per_scope: usize,
}

impl Default for ContextBuilderConfig {
    fn default() -> Self {
        Self {
            bootstrap_max_chars: 6000,
            memory_max_chars: 3000,
            skills_max_chars: 4000,
            history_max_chars: 12000,
            max_history_messages: 50,
            memory_query_turns: 10,
            memory_limit_per_scope: 8,
        }
    }
}

struct CachedSection {
    fingerprint: u64,
    content: String,
}

#[derive(Default)]
struct SectionCache {
    bootstrap: Option<CachedSection>,
    skills: Option<CachedSection>,
}

/// Builds the system prompt and message list for a single LLM call.
pub struct ContextBuilderImpl {
    workspace_path: PathBuf,
    config: ContextBuilderConfig,
    memory_store: MemoryStore,
    cache: Mutex<SectionCache>,
}

impl ContextBuilderImpl {
    /// Creates a new ContextBuilderImpl with the given workspace path
    pub fn new(workspace_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_config(workspace_path, ContextBuilderConfig::default())
    }

    /// Creates a new ContextBuilderImpl with a custom configuration
    pub fn with_config(workspace_path: impl AsRef<Path>, config: ContextBuilderConfig) -> Result<Self> {
        let workspace_path = workspace_path.as_ref().to_path_buf();

        if !workspace_path.exists() {
            return Err(AgentError::ContextBuildError(format!(
                "Workspace path does not exist: {:?}",
                workspace_path
            )));
        }

        let memory_store = MemoryStore::new(workspace_path.clone());

        Ok(Self {
            workspace_path,
            config,
            memory_store,
            cache: Mutex::new(SectionCache::default()),
        })
    }

    fn build_identity_section(&self) -> String {
        format!(
            "You are miniclaw, a personal agent running against the workspace at {}.\nCurrent time: {}\nMemory lives under {}.",
            self.workspace_path.display(),
            Utc::now().to_rfc3339(),
            self.workspace_path.join("memory").display(),
        )
    }

    async fn bootstrap_fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        for name in BOOTSTRAP_FILES {
            let mtime_ns = file_mtime_ns(&self.workspace_path.join(name)).await;
            name.hash(&mut hasher);
            mtime_ns.hash(&mut hasher);
        }
        self.config.bootstrap_max_chars.hash(&mut hasher);
        hasher.finish()
    }

    /// Loads and concatenates the bootstrap files, head-truncated and cached
    /// against the files' mtimes.
    async fn build_bootstrap_section(&self) -> String {
        let fingerprint = self.bootstrap_fingerprint().await;
        if let Some(cached) = self.cached_bootstrap(fingerprint) {
            return cached;
        }

        let mut parts = Vec::new();
        for name in BOOTSTRAP_FILES {
            let path = self.workspace_path.join(name);
            if let Ok(content) = fs::read_to_string(&path).await {
                if !content.trim().is_empty() {
                    parts.push(content);
                }
            }
        }

        let joined = parts.join("\n\n");
        let content = truncate_head(&joined, self.config.bootstrap_max_chars, "bootstrap");

        let mut cache = self.cache.lock().unwrap();
        cache.bootstrap = Some(CachedSection {
            fingerprint,
            content: content.clone(),
        });
        content
    }

    fn cached_bootstrap(&self, fingerprint: u64) -> Option<String> {
        let cache = self.cache.lock().unwrap();
        cache
            .bootstrap
            .as_ref()
            .filter(|c| c.fingerprint == fingerprint)
            .map(|c| c.content.clone())
    }

    /// Queries the memory index using the current message plus recent user
    /// turns. Never cached — the query text changes every call.
    async fn build_memory_section(&self, session: &Session, current_message: &InboundMessage) -> Option<String> {
        let mut query_parts: Vec<String> = session
            .messages
            .iter()
            .rev()
            .filter(|m| m.is_user())
            .take(self.config.memory_query_turns)
            .map(|m| m.content.clone())
            .collect();
        query_parts.reverse();
        query_parts.push(current_message.content.clone());
        let query = query_parts.join(" ");

        let scope = format!("{}:{}", session.channel, session.chat_id);
        let hits = self
            .memory_store
            .index()
            .search_global_and_scope(&scope, &query, self.config.memory_limit_per_scope)
            .await
            .unwrap_or_default();

        if hits.is_empty() {
            return None;
        }

        let mut seen = HashSet::new();
        let mut lines = Vec::new();
        for hit in hits {
            let normalized = normalize_hit(&hit.content);
            if seen.insert(normalized.clone()) {
                lines.push(format!("- {}", normalized));
            }
        }

        let body = format!("Retrieved memory:\n{}", lines.join("\n"));
        Some(truncate_tail(&body, self.config.memory_max_chars, "retrieved memory"))
    }

    fn skills_fingerprint(&self, skills: &[Skill], requested: &[String]) -> u64 {
        let mut hasher = DefaultHasher::new();
        for skill in skills {
            skill.directory_name.hash(&mut hasher);
            skill.content.hash(&mut hasher);
        }
        requested.hash(&mut hasher);
        for bin in required_bins_of_all(skills) {
            bin.hash(&mut hasher);
            which(&bin).hash(&mut hasher);
        }
        self.config.skills_max_chars.hash(&mut hasher);
        hasher.finish()
    }

    /// Always-on skills are inlined unconditionally (if available);
    /// requested skills are inlined if not already covered; every skill
    /// (inlined or not) appears in a trailing availability summary.
    async fn build_skills_section(&self, requested: &[String]) -> Option<String> {
        let skills_dir = self.workspace_path.join("skills");
        let skills = load_all_skills(&skills_dir).unwrap_or_default();
        if skills.is_empty() {
            return None;
        }

        let fingerprint = self.skills_fingerprint(&skills, requested);
        if let Some(cached) = self.cached_skills(fingerprint) {
            return Some(cached);
        }

        let mut inlined = HashSet::new();
        let mut body = String::new();

        for skill in skills.iter().filter(|s| is_always_on(s)) {
            if is_skill_available(skill) {
                body.push_str(&format!("## {} (always-on)\n{}\n\n", skill.name, skill.content));
                inlined.insert(skill.directory_name.clone());
            }
        }

        for name in requested {
            if inlined.contains(name) {
                continue;
            }
            if let Some(skill) = skills
                .iter()
                .find(|s| &s.directory_name == name || &s.name == name)
            {
                if is_skill_available(skill) {
                    body.push_str(&format!("## {} (requested)\n{}\n\n", skill.name, skill.content));
                    inlined.insert(skill.directory_name.clone());
                }
            }
        }

        body.push_str("<skills>\n");
        for skill in &skills {
            let missing = missing_requirements(skill);
            body.push_str(&format!(
                "  <skill name=\"{}\" available=\"{}\"{} />\n",
                skill.name,
                missing.is_empty(),
                if missing.is_empty() {
                    String::new()
                } else {
                    format!(" missing=\"{}\"", missing.join(","))
                }
            ));
        }
        body.push_str("</skills>");

        let content = truncate_tail(&body, self.config.skills_max_chars, "skills");

        let mut cache = self.cache.lock().unwrap();
        cache.skills = Some(CachedSection {
            fingerprint,
            content: content.clone(),
        });
        Some(content)
    }

    fn cached_skills(&self, fingerprint: u64) -> Option<String> {
        let cache = self.cache.lock().unwrap();
        cache
            .skills
            .as_ref()
            .filter(|c| c.fingerprint == fingerprint)
            .map(|c| c.content.clone())
    }

    /// Takes the most recent `max_history_messages`, then drops from the
    /// front until the total fits `history_max_chars`, prepending an
    /// omission notice when anything was dropped.
    fn build_history(&self, session: &Session) -> Vec<LlmMessage> {
        let mut history: Vec<LlmMessage> = session
            .messages
            .iter()
            .rev()
            .take(self.config.max_history_messages)
            .map(to_llm_message)
            .collect();
        history.reverse();

        let mut total: usize = history.iter().map(|m| m.content.len()).sum();
        let mut omitted = 0usize;
        while total > self.config.history_max_chars && !history.is_empty() {
            let removed = history.remove(0);
            total = total.saturating_sub(removed.content.len());
            omitted += 1;
        }

        if omitted > 0 {
            history.insert(
                0,
                LlmMessage {
                    role: LlmRole::User,
                    content: format!(
                        "{} earlier messages were omitted to stay within the context budget.",
                        omitted
                    ),
                    tool_calls: None,
                },
            );
        }

        history
    }
}

#[async_trait::async_trait]
impl ContextBuilder for ContextBuilderImpl {
    async fn build_context(&self, session: &Session, current_message: &InboundMessage) -> Result<Vec<LlmMessage>> {
        let mut sections = vec![self.build_identity_section()];
        sections.push(self.build_bootstrap_section().await);

        if let Some(memory) = self.build_memory_section(session, current_message).await {
            sections.push(memory);
        }

        let requested = requested_skills(current_message);
        if let Some(skills) = self.build_skills_section(&requested).await {
            sections.push(skills);
        }

        let system_prompt = sections.join("\n\n---\n\n");

        let mut messages = vec![LlmMessage {
            role: LlmRole::System,
            content: system_prompt,
            tool_calls: None,
        }];
        messages.extend(self.build_history(session));
        messages.push(LlmMessage {
            role: LlmRole::User,
            content: current_message.content.clone(),
            tool_calls: None,
        });

        tracing::debug!(message_count = messages.len(), "context built");

        Ok(messages)
    }
}

fn to_llm_message(msg: &Message) -> LlmMessage {
    let role = match msg.role.as_str() {
        "user" => LlmRole::User,
        "assistant" => LlmRole::Assistant,
        "tool" | "tool_result" => LlmRole::Tool,
        _ => LlmRole::System,
    };
    LlmMessage {
        role,
        content: msg.content.clone(),
        tool_calls: msg.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|c| LlmToolCall {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    arguments: c.arguments.clone(),
                })
                .collect()
        }),
    }
}

fn requested_skills(message: &InboundMessage) -> Vec<String> {
    message
        .metadata
        .get("requested_skills")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn normalize_hit(content: &str) -> String {
    let single_line = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() > 400 {
        let truncated: String = single_line.chars().take(400).collect();
        format!("{}…", truncated)
    } else {
        single_line
    }
}

/// A skill opts into always being inlined by carrying a bare
/// `Always: true` line anywhere in its SKILL.md body.
fn is_always_on(skill: &Skill) -> bool {
    skill
        .content
        .lines()
        .any(|l| l.trim().eq_ignore_ascii_case("Always: true"))
}

/// Binaries a skill needs, declared under a `## Requires` section as a
/// `- name` list, the same convention the loader already uses for `##
/// Parameters`.
fn required_bins(skill: &Skill) -> Vec<String> {
    let mut in_section = false;
    let mut bins = Vec::new();
    for line in skill.content.lines() {
        let trimmed = line.trim();
        if trimmed == "## Requires" {
            in_section = true;
            continue;
        }
        if in_section {
            if trimmed.starts_with("## ") {
                break;
            }
            if let Some(rest) = trimmed.strip_prefix("- ") {
                let rest = rest.trim();
                if !rest.is_empty() {
                    bins.push(rest.to_string());
                }
            }
        }
    }
    bins
}

fn required_bins_of_all(skills: &[Skill]) -> Vec<String> {
    let mut bins: Vec<String> = skills.iter().flat_map(required_bins).collect();
    bins.sort();
    bins.dedup();
    bins
}

fn which(bin: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(bin).is_file()))
        .unwrap_or(false)
}

fn is_skill_available(skill: &Skill) -> bool {
    missing_requirements(skill).is_empty()
}

fn missing_requirements(skill: &Skill) -> Vec<String> {
    required_bins(skill)
        .into_iter()
        .filter(|bin| !which(bin))
        .collect()
}

async fn file_mtime_ns(path: &Path) -> Option<i128> {
    let metadata = fs::metadata(path).await.ok()?;
    let modified = metadata.modified().ok()?;
    modified
        .duration_since(std::time::UNIX_EPOCH)
        .ok()
        .map(|d| d.as_nanos() as i128)
}

/// Keeps the first `max_chars` characters, dropping the tail.
pub fn truncate_head(text: &str, max_chars: usize, label: &str) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("[truncated {} to first {} chars]\n{}", label, max_chars, kept)
}

/// Keeps the last `max_chars` characters, dropping the head.
pub fn truncate_tail(text: &str, max_chars: usize, label: &str) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        return text.to_string();
    }
    let skip = char_count - max_chars;
    let kept: String = text.chars().skip(skip).collect();
    format!("[truncated {} to last {} chars]\n{}", label, max_chars, kept)
}
