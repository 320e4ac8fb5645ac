//! Agent configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::AgentConfig;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {0}")]
    Validation(String),
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AgentConfig = toml::from_str(&content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AgentConfig) -> Result<(), ConfigError> {
    for pattern in config.discovery.read.iter().chain(&config.discovery.watch) {
        if pattern.trim().is_empty() {
            return Err(ConfigError::Validation("empty glob pattern".to_string()));
        }
    }
    if config.discovery.refresh_secs == 0 {
        return Err(ConfigError::Validation("refresh_secs must be positive".to_string()));
    }
    Ok(())
}
