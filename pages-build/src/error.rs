//! Error types for pages-build.

use std::path::PathBuf;

use thiserror::Error;

use pages_resolver::ResolveError;

/// All errors that can arise while building and publishing a site.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Configuration resolution failed before or around the generator step.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A command ran but did not succeed.
    #[error("`{command}` failed with {status}")]
    CommandFailed { command: String, status: String },

    /// A command could not be started at all.
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The built output could not be published.
    #[error("failed to publish {destination}: {message}")]
    Publish {
        destination: PathBuf,
        message: String,
    },

    /// Lock marker metadata could not be encoded.
    #[error("lock marker JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`BuildError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.into(),
        source,
    }
}
