use std::path::PathBuf;

use serde::Deserialize;

use crate::http::multipart::types::MultipartLimits;

/// A directory served under a URL prefix.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MountConfig {
    pub prefix: String,
    pub directory: PathBuf,
}

/// Everything the server needs to know before it accepts a connection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Where uploaded files live until the request that brought them is done.
    pub upload_dir: PathBuf,
    /// Multipart bodies with a Content-Length above this are decoded while
    /// they arrive instead of being buffered.
    pub streaming_threshold: usize,
    pub chunk_size: usize,
    pub max_header_bytes: usize,
    pub max_part_header_bytes: usize,
    pub max_field_bytes: usize,
    pub index_file: String,
    pub mounts: Vec<MountConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = MultipartLimits::default();
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 80,
            upload_dir: std::env::temp_dir().join("microrouter-uploads"),
            streaming_threshold: 8192,
            chunk_size: 1024,
            max_header_bytes: 8192,
            max_part_header_bytes: limits.max_part_header_bytes,
            max_field_bytes: limits.max_field_bytes,
            index_file: "index.html".to_string(),
            mounts: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn limits(&self) -> MultipartLimits {
        MultipartLimits {
            max_part_header_bytes: self.max_part_header_bytes,
            max_field_bytes: self.max_field_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("chunk_size must be greater than 0")]
    ZeroChunkSize,
    #[error("max_header_bytes must be greater than 0")]
    ZeroHeaderLimit,
    #[error("invalid index file {0:?}")]
    InvalidIndexFile(String),
    #[error("mount {0:?} has an empty directory")]
    EmptyMountDirectory(String),
    #[error("mount prefix {0:?} must start with '/'")]
    InvalidMountPrefix(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join(", ")
}
