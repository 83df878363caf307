//! Server configuration loaded from YAML.
//!
//! # File layout
//!
//! ```yaml
//! home: /usr/local/pages
//! port: 5000
//! git_url_prefix: git@github.com:example-org
//! pages_config: _config_pages.yml
//! builders:
//!   - branch: pages
//!     repository_dir: repos/pages.example.com
//!     generated_site_dir: sites/pages.example.com
//! ```
//!
//! # API pattern
//!
//! - `load_at(path)`: explicit path; used in tests with `TempDir`
//! - `load()`: resolves the path from `$PAGES_CONFIG` (or `./pages-config.yaml`)
//!   and delegates to `load_at`
//!
//! The loaded [`ServerConfig`] is passed by value (or behind an `Arc`) into every
//! component that needs it; there is no process-wide configuration state.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

/// Environment variable that overrides the default configuration path.
pub const CONFIG_ENV_VAR: &str = "PAGES_CONFIG";

/// Configuration file used when `$PAGES_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "pages-config.yaml";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Webhook payload dialect accepted by the HTTP listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WebhookType {
    #[default]
    Github,
    Bitbucket,
}

impl fmt::Display for WebhookType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WebhookType::Github => write!(f, "github"),
            WebhookType::Bitbucket => write!(f, "bitbucket"),
        }
    }
}

/// Upload settings for the `aws s3 sync` style publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    pub bucket: String,
    #[serde(default = "default_publish_program")]
    pub program: String,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// One site builder: which branch to watch and where its output goes.
///
/// Directory fields are relative to [`ServerConfig::home`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub repository_dir: PathBuf,
    pub generated_site_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_site_dir: Option<PathBuf>,
    /// Regex of branch names to build side by side under `<baseurl>/<branch>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_in_url_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_yaml: Option<String>,
}

impl BuilderConfig {
    /// Branch regex used for dispatch: the URL pattern wins over the plain branch.
    pub fn branch_pattern(&self) -> Option<&str> {
        self.branch_in_url_pattern
            .as_deref()
            .or(self.branch.as_deref())
    }
}

/// Root of the YAML configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base directory for repositories, generated sites and caches.
    #[serde(default)]
    pub home: PathBuf,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub webhook_type: WebhookType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_url_prefix: Option<String>,
    /// File name of the generated base-URL descriptor.
    #[serde(default = "default_pages_config")]
    pub pages_config: String,
    /// File name of the optional site metadata file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_yaml: Option<String>,
    #[serde(default = "default_bundler_cache_dir")]
    pub bundler_cache_dir: PathBuf,
    #[serde(default = "default_rsync_opts")]
    pub rsync_opts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishConfig>,
    #[serde(default)]
    pub builders: Vec<BuilderConfig>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_pages_config() -> String {
    "_config_pages.yml".to_string()
}

fn default_bundler_cache_dir() -> PathBuf {
    PathBuf::from(".bundle-cache")
}

fn default_rsync_opts() -> Vec<String> {
    ["-vaxp", "--delete", "--ignore-errors", "--exclude=.[A-Za-z0-9]*"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_publish_program() -> String {
    "aws".to_string()
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Path of the configuration file: `$PAGES_CONFIG`, else `./pages-config.yaml`.
pub fn default_config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
}

/// Load and validate the configuration at `path`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with path +
/// line context) if malformed, `ConfigError::Invalid` if a structural rule fails.
pub fn load_at(path: &Path) -> Result<ServerConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    parse(&contents, path)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<ServerConfig, ConfigError> {
    load_at(&default_config_path())
}

/// Parse and validate configuration text; `path` is used for error context only.
pub fn parse(contents: &str, path: &Path) -> Result<ServerConfig, ConfigError> {
    let mut config: ServerConfig =
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
    if config.home.as_os_str().is_empty() {
        config.home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
    }
    validate(&config)?;
    Ok(config)
}

fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.builders.is_empty() {
        return Err(ConfigError::Invalid(
            "at least one entry under `builders` is required".to_string(),
        ));
    }
    for (index, builder) in config.builders.iter().enumerate() {
        if builder.branch_pattern().is_none() {
            return Err(ConfigError::Invalid(format!(
                "builders[{index}] needs either `branch` or `branch_in_url_pattern`"
            )));
        }
        if builder.git_url_prefix.is_none() && config.git_url_prefix.is_none() {
            return Err(ConfigError::Invalid(format!(
                "builders[{index}] has no `git_url_prefix` and no top-level default is set"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
