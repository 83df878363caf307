//! Error types for pages-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading and validating server configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, unreadable file, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load, with file path and line context from serde_yaml.
    #[error("failed to parse configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The configuration file did not exist at the expected path.
    #[error("configuration not found at {path}")]
    NotFound { path: PathBuf },

    /// The file parsed but violates a structural rule (no builders, no branch, ...).
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// `home` was omitted and `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set `home` in the configuration or $HOME")]
    HomeNotFound,
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
