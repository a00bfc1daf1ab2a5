//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while locating, reading or validating config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No config file at the env-var location or any ancestor directory.
    #[error("could not find {file_name} (searched from {searched_from})")]
    NotFound {
        file_name: String,
        searched_from: PathBuf,
    },

    #[error("failed to read {path}: {reason}")]
    ReadFailed {
        path: PathBuf,
        reason: String,
    },

    #[error("failed to parse config: {reason}")]
    ParseFailed {
        reason: String,
    },

    /// Parsed, but a value is out of range.
    #[error("invalid config field {field}: {reason}")]
    Invalid {
        field: String,
        reason: String,
    },
}
