use serde::{Deserialize, Serialize};

use crate::providers::ProviderConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_token: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_whitelist: Option<Vec<String>>,

    /// Structured provider configuration (preferred over the bare `api_key`
    /// field once onboarding has run).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<ProviderConfig>,

    /// Provider type name, kept for diagnostics/onboarding prompts; the
    /// source of truth for actually talking to a provider is `provider_config`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<String>,

    /// Default channel new inbound messages are attributed to when a
    /// request doesn't otherwise specify one (e.g. the one-shot CLI path).
    #[serde(default = "default_channel")]
    pub default_channel: String,

    /// Chat/user ids allowed to talk to the agent over external channels.
    /// Empty means "nothing is allowed" (secure by default), not "everyone".
    #[serde(default)]
    pub allow_from: Vec<String>,
}

fn default_channel() -> String {
    "telegram".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: Some("google/gemini-2.5-flash".to_string()),
            telegram_token: None,
            telegram_whitelist: None,
            provider_config: None,
            provider_type: None,
            default_channel: default_channel(),
            allow_from: Vec::new(),
        }
    }
}
