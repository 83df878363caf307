//! Working-copy synchronisation.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use pages_core::{BranchName, BuildLogger, BuilderOptions, RepoName};

use crate::command::CommandRunner;
use crate::error::{io_err, BuildError};

/// Brings the working copy to the head of a branch.
#[async_trait]
pub trait RepoSynchronizer: Send + Sync {
    async fn prepare_repo(&self, branch: &BranchName) -> Result<(), BuildError>;
}

/// `git`-backed synchroniser: fetch + hard reset, or a fresh clone.
pub struct GitSynchronizer {
    runner: Arc<dyn CommandRunner>,
    repo_dir: PathBuf,
    site_path: PathBuf,
    repo_name: RepoName,
    clone_url: String,
    logger: Arc<BuildLogger>,
}

impl GitSynchronizer {
    pub fn new(runner: Arc<dyn CommandRunner>, opts: &BuilderOptions, logger: Arc<BuildLogger>) -> Self {
        Self {
            runner,
            repo_dir: opts.repo_dir.clone(),
            site_path: opts.site_path.clone(),
            repo_name: opts.repo_name.clone(),
            clone_url: format!("{}{}.git", opts.git_url_prefix, opts.repo_name),
            logger,
        }
    }

    pub fn clone_url(&self) -> &str {
        &self.clone_url
    }

    async fn git(&self, args: &[&str], in_site: bool) -> Result<(), BuildError> {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let cwd = if in_site { &self.site_path } else { &self.repo_dir };
        self.runner.run("git", &args, cwd).await
    }
}

#[async_trait]
impl RepoSynchronizer for GitSynchronizer {
    async fn prepare_repo(&self, branch: &BranchName) -> Result<(), BuildError> {
        let branch = branch.as_str();
        let exists = tokio::fs::try_exists(&self.site_path)
            .await
            .map_err(|e| io_err(&self.site_path, e))?;

        if exists {
            self.logger.log(format!("syncing repo: {}", self.site_path.display()));
            let remote_branch = format!("origin/{branch}");
            self.git(&["fetch", "origin", branch], true).await?;
            self.git(&["clean", "-f", "-d"], true).await?;
            self.git(&["reset", "--hard", remote_branch.as_str()], true).await?;
        } else {
            self.logger.log(format!(
                "cloning {} into {}",
                self.repo_name,
                self.site_path.display()
            ));
            tokio::fs::create_dir_all(&self.repo_dir)
                .await
                .map_err(|e| io_err(&self.repo_dir, e))?;
            let target = self.site_path.display().to_string();
            self.git(
                &["clone", self.clone_url.as_str(), target.as_str(), "--branch", branch],
                false,
            )
            .await?;
        }

        let gitmodules = self.site_path.join(".gitmodules");
        let has_submodules = tokio::fs::try_exists(&gitmodules)
            .await
            .map_err(|e| io_err(&gitmodules, e))?;
        if has_submodules {
            self.git(&["submodule", "update", "--init", "--recursive"], true)
                .await?;
        }
        Ok(())
    }
}
