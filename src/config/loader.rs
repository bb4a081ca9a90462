use crate::config::schema::Config;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use thiserror::Error;

#[cfg(test)]
use std::sync::Mutex;

#[cfg(test)]
static CONFIG_TEST_ENV_LOCK: Mutex<()> = Mutex::new(());

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file contains invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
}

pub fn load_config(cli_model: Option<String>, cli_config_path: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::default();

    // Layer 1: Load from config file (~/.miniclaw/config.json)
    let config_file = cli_config_path.or_else(get_default_config_path);

    if let Some(path) = config_file {
        if path.exists() {
            config = merge_config_from_file(config, &path)?;
        }
    }

    // Layer 2: Environment variables override
    config = merge_env_variables(config);

    // Layer 3: CLI flags override (highest precedence)
    if let Some(model) = cli_model {
        config.model = Some(model);
    }

    Ok(config)
}

fn get_default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".miniclaw").join("config.json"))
}

fn merge_config_from_file(config: Config, path: &PathBuf) -> Result<Config> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(config),
        Err(e) => return Err(e).context("Failed to read metadata for config file"),
    };

    let permissions = metadata.permissions();
    let mode = permissions.mode() & 0o777;

    if mode != 0o600 {
        tracing::warn!(
            "Config file {:?} has permissions {:o}, expected 0600 - skipping",
            path,
            mode
        );
        return Ok(config);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let file_config: Config = serde_json::from_str(&content).map_err(|e| {
        eprintln!("Error: Configuration file contains invalid JSON.");
        eprintln!("Suggestion: Run 'miniclaw onboard' to recreate the configuration file.");
        ConfigError::InvalidJson(e)
    })?;

    Ok(Config {
        api_key: file_config.api_key.or(config.api_key),
        model: file_config.model.or(config.model),
        telegram_token: file_config.telegram_token.or(config.telegram_token),
        telegram_whitelist: file_config.telegram_whitelist.or(config.telegram_whitelist),
        provider_config: file_config.provider_config.or(config.provider_config),
        provider_type: file_config.provider_type.or(config.provider_type),
        default_channel: if file_config.default_channel.is_empty() {
            config.default_channel
        } else {
            file_config.default_channel
        },
        allow_from: if file_config.allow_from.is_empty() {
            config.allow_from
        } else {
            file_config.allow_from
        },
    })
}

fn merge_env_variables(config: Config) -> Config {
    Config {
        api_key: std::env::var("OPENROUTER_API_KEY")
            .ok()
            .or(std::env::var("MINICLAW_API_KEY").ok())
            .or_else(|| config.api_key),
        model: std::env::var("MINICLAW_MODEL")
            .ok()
            .or_else(|| config.model),
        telegram_token: std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .or_else(|| config.telegram_token),
        telegram_whitelist: std::env::var("MINICLAW_TELEGRAM_WHITELIST")
            .ok()
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
            .or_else(|| config.telegram_whitelist),
        default_channel: std::env::var("MINICLAW_DEFAULT_CHANNEL")
            .ok()
            .unwrap_or(config.default_channel),
        allow_from: std::env::var("MINICLAW_ALLOW_FROM")
            .ok()
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or(config.allow_from),
        provider_config: config.provider_config,
        provider_type: config.provider_type,
    }
}

pub fn save_config(config: &Config, path: &PathBuf) -> Result<()> {
    // Create parent directory if it doesn't exist
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let json = serde_json::to_string_pretty(config)?;

    let mut file = fs::File::create(path)
        .with_context(|| format!("Failed to create config file: {:?}", path))?;

    file.write_all(json.as_bytes())
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    // Set file permissions to 0600 (owner read/write only)
    let mut permissions = file.metadata()?.permissions();
    permissions.set_mode(0o600);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("Failed to set permissions on config file: {:?}", path))?;

    tracing::info!("Configuration saved to {:?}", path);
    Ok(())
}

pub fn get_config_path() -> Option<PathBuf> {
    get_default_config_path()
}
