//! Per-build options derived from the server configuration, one builder entry
//! and the repository named by the incoming event.

use std::path::PathBuf;

use crate::config::{BuilderConfig, ServerConfig};
use crate::types::{BranchName, RepoName};

/// Resolved paths and file names for one build of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderOptions {
    /// `<home>/<repository_dir>`: parent of every working copy for this builder.
    pub repo_dir: PathBuf,
    pub repo_name: RepoName,
    /// The working copy the site is built from: `<repo_dir>/<repo_name>`, or
    /// `<repo_dir>/<repo_name>-<branch>` when branches are built side by side,
    /// so every (repository, branch) lock key owns its own checkout.
    pub site_path: PathBuf,
    /// `<home>/<generated_site_dir>`: public destination root.
    pub dest_dir: PathBuf,
    /// `<home>/<internal_site_dir>`: internal destination root, if configured.
    pub internal_dest_dir: Option<PathBuf>,
    /// Clone URL prefix, always terminated by `/`.
    pub git_url_prefix: String,
    pub pages_config: String,
    pub pages_yaml: Option<String>,
    pub branch_in_url: bool,
}

impl BuilderOptions {
    /// Builder-level values override the top-level defaults in `config`.
    pub fn new(
        repo_name: RepoName,
        branch: &BranchName,
        config: &ServerConfig,
        builder: &BuilderConfig,
    ) -> Self {
        let repo_dir = config.home.join(&builder.repository_dir);
        let branch_in_url = builder.branch_in_url_pattern.is_some();
        let site_path = if branch_in_url {
            repo_dir.join(format!("{}-{}", repo_name, branch.file_stem()))
        } else {
            repo_dir.join(&repo_name.0)
        };

        let mut git_url_prefix = builder
            .git_url_prefix
            .clone()
            .or_else(|| config.git_url_prefix.clone())
            .unwrap_or_default();
        if !git_url_prefix.ends_with('/') {
            git_url_prefix.push('/');
        }

        Self {
            repo_dir,
            repo_name,
            site_path,
            dest_dir: config.home.join(&builder.generated_site_dir),
            internal_dest_dir: builder
                .internal_site_dir
                .as_ref()
                .map(|dir| config.home.join(dir)),
            git_url_prefix,
            pages_config: builder
                .pages_config
                .clone()
                .unwrap_or_else(|| config.pages_config.clone()),
            pages_yaml: builder
                .pages_yaml
                .clone()
                .or_else(|| config.pages_yaml.clone()),
            branch_in_url,
        }
    }

    /// Build log written during one build, next to the working copy.
    ///
    /// `tag` tells concurrent launches for the same working copy apart:
    /// `<site_path>.<tag>.log`.
    pub fn build_log_path(&self, tag: &str) -> PathBuf {
        let mut name = self.site_path.clone().into_os_string();
        name.push(format!(".{tag}.log"));
        PathBuf::from(name)
    }
}
