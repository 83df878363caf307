//! `pages build`: one-off build of a repository branch.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use pages_build::{launch_builder, LockTable};
use pages_core::{BranchName, BuildEvent, BuilderConfig, CommitInfo, Person, ServerConfig};
use pages_daemon::collection_from_git_url_prefix;

use crate::ConfigArg;

/// Arguments for `pages build`.
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Repository name, as it appears after the clone URL prefix.
    pub repository: String,

    /// Branch to build (defaults to the builder's `branch`).
    #[arg(long)]
    pub branch: Option<String>,

    /// Index of the builder under `builders` in the configuration.
    #[arg(long, default_value_t = 0)]
    pub builder: usize,

    #[command(flatten)]
    pub config: ConfigArg,
}

impl BuildArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        let builder = select_builder(&config, self.builder)?;
        let branch = match self.branch.as_deref().or(builder.branch.as_deref()) {
            Some(branch) => BranchName::from(branch),
            None => bail!(
                "builders[{}] matches branches by pattern; pass --branch",
                self.builder
            ),
        };
        let event = manual_event(&config, &builder, &self.repository, &branch);

        pages_daemon::init_tracing();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start tokio runtime")?;
        runtime
            .block_on(launch_builder(
                &event,
                branch.clone(),
                &builder,
                &config,
                Arc::new(LockTable::default()),
            ))
            .with_context(|| format!("build failed for {}@{branch}", self.repository))?;

        println!("{} {}@{branch} built", "✓".green(), self.repository);
        Ok(())
    }
}

fn select_builder(config: &ServerConfig, index: usize) -> Result<BuilderConfig> {
    config.builders.get(index).cloned().with_context(|| {
        format!(
            "no builder at index {index}; the configuration defines {}",
            config.builders.len()
        )
    })
}

/// Event standing in for a push when building from the command line.
fn manual_event(
    config: &ServerConfig,
    builder: &BuilderConfig,
    repository: &str,
    branch: &BranchName,
) -> BuildEvent {
    let prefix = builder
        .git_url_prefix
        .as_deref()
        .or(config.git_url_prefix.as_deref())
        .unwrap_or_default();
    let user = std::env::var("USER").unwrap_or_else(|_| "pages".to_string());
    BuildEvent {
        branch: format!("refs/heads/{branch}"),
        collection: collection_from_git_url_prefix(prefix),
        repository: repository.to_string(),
        commit: CommitInfo {
            id: "manual".to_string(),
            message: "manual build".to_string(),
            timestamp: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        },
        author: Person {
            name: user,
            email: String::new(),
        },
        committer: None,
        pusher: None,
    }
}
