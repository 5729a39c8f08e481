//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GuardConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `tokens.secret`.
pub const SECRET_ENV: &str = "GUARD_TOKEN_SECRET";

/// Environment variable overriding `store.redis_url`.
pub const REDIS_URL_ENV: &str = "GUARD_REDIS_URL";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse TOML text, apply environment overrides, and validate.
pub fn parse_config(content: &str) -> Result<GuardConfig, ConfigError> {
    let mut config: GuardConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn apply_env_overrides(config: &mut GuardConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(secret) = lookup(SECRET_ENV).filter(|s| !s.is_empty()) {
        config.tokens.secret = secret;
    }
    if let Some(url) = lookup(REDIS_URL_ENV).filter(|s| !s.is_empty()) {
        config.store.redis_url = Some(url);
    }
}
