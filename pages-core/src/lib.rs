//! Pages core library: domain types, server configuration, build log.
//!
//! Public API surface:
//! - [`types`]: newtypes and the normalized webhook event
//! - [`config`]: YAML server configuration: load / validate
//! - [`options`]: per-build paths derived from configuration
//! - [`build_log`]: the per-build log file
//! - [`error`]: [`ConfigError`]

pub mod build_log;
pub mod config;
pub mod error;
pub mod options;
pub mod types;

pub use build_log::BuildLogger;
pub use config::{BuilderConfig, PublishConfig, ServerConfig, WebhookType};
pub use error::ConfigError;
pub use options::BuilderOptions;
pub use types::{BranchName, BuildEvent, CommitInfo, Person, RepoName};
