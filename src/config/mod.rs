//! Server configuration: TOML file, defaults and validation.

pub mod types;

use std::fs;
use std::path::Path;

use types::{ConfigError, ServerConfig, ValidationError};

/// Reads, parses and validates a TOML configuration file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Collects every problem rather than stopping at the first.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.chunk_size == 0 {
        errors.push(ValidationError::ZeroChunkSize);
    }
    if config.max_header_bytes == 0 {
        errors.push(ValidationError::ZeroHeaderLimit);
    }
    if config.index_file.is_empty() || config.index_file.contains('/') {
        errors.push(ValidationError::InvalidIndexFile(config.index_file.clone()));
    }
    for mount in &config.mounts {
        if !mount.prefix.starts_with('/') {
            errors.push(ValidationError::InvalidMountPrefix(mount.prefix.clone()));
        }
        if mount.directory.as_os_str().is_empty() {
            errors.push(ValidationError::EmptyMountDirectory(mount.prefix.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
