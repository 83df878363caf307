//! Error types for pages-resolver.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while resolving a site's build configuration.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(
        "failed to build a site with a _config_internal.yml file without an \
         internal_site_dir defined in the builder configuration"
    )]
    InternalConfigWithoutInternalDir,

    #[error(
        "failed to build a site with a _config_external.yml file without a \
         corresponding _config_internal.yml file"
    )]
    ExternalConfigWithoutInternalConfig,

    /// The base URL would place output at or above a destination root.
    #[error("baseurl contains relative components: {baseurl}")]
    RelativeBaseurl { baseurl: String },

    /// The pages metadata file is not valid YAML.
    #[error("failed to parse {path}: {source}")]
    MetadataParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The pages metadata file parsed but has the wrong shape.
    #[error("invalid pages metadata in {path}: {message}")]
    MetadataShape { path: PathBuf, message: String },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`ResolveError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ResolveError {
    ResolveError::Io {
        path: path.into(),
        source,
    }
}
