//! Configuration loading from disk.

use std::path::Path;

use thiserror::Error;

use crate::config::schema::{DirectoryConfig, ServerConfig};
use crate::config::validation::{self, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("Parse error: {0}")]
    ParseJson(#[from] serde_json::Error),

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

/// Load and validate the server configuration from a TOML file.
pub fn load_server_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: ServerConfig = toml::from_str(&content)?;
    validation::validate_server(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate one tenant's `directory.json`.
pub async fn load_directory_config(path: &Path) -> Result<DirectoryConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path).await?;
    let config: DirectoryConfig = serde_json::from_str(&content)?;
    validation::validate_directory(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
