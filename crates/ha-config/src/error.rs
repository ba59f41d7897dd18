//! Configuration errors

use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid YAML in {path}: {source}")]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `!include` whose argument is not a path
    #[error("Bad !include in {file}: {reason}")]
    BadInclude { file: PathBuf, reason: String },

    #[error("Circular !include of {path}")]
    CircularInclude { path: PathBuf },

    /// `!env_var` naming an unset variable, or given a non-string
    #[error("Bad !env_var {var}: {reason}")]
    BadEnvVar { var: String, reason: String },

    /// An integration rejected its section
    #[error("Invalid config for [{domain}]: {reason}")]
    InvalidSection { domain: String, reason: String },
}

impl ConfigError {
    pub fn invalid_section(domain: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ConfigError::InvalidSection {
            domain: domain.into(),
            reason: reason.to_string(),
        }
    }
}
