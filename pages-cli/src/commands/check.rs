//! `pages check`: validate the configuration and show what each builder does.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use pages_core::ServerConfig;
use pages_daemon::{collection_from_git_url_prefix, Dispatcher};

use crate::ConfigArg;

/// Arguments for `pages check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub config: ConfigArg,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct BuilderSummary {
    index: usize,
    collection: String,
    branch: String,
    repository_dir: String,
    generated_site_dir: String,
    internal_site_dir: Option<String>,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        // Compiles every branch pattern the listener would use.
        Dispatcher::new(&config)?;

        let builders = summarize(&config);
        if self.json {
            println!("{}", serde_json::to_string_pretty(&builders)?);
            return Ok(());
        }

        println!(
            "{} {} ({} webhooks on {}:{})",
            "✓".green(),
            self.config.path().display(),
            config.webhook_type,
            config.host,
            config.port
        );
        for b in &builders {
            println!(
                "  [{}] {}/{} -> {}",
                b.index,
                b.collection.bold(),
                b.branch,
                b.generated_site_dir
            );
            if let Some(internal) = &b.internal_site_dir {
                println!("      internal -> {internal}");
            }
        }
        Ok(())
    }
}

fn summarize(config: &ServerConfig) -> Vec<BuilderSummary> {
    let home = &config.home;
    config
        .builders
        .iter()
        .enumerate()
        .map(|(index, builder)| {
            let prefix = builder
                .git_url_prefix
                .as_deref()
                .or(config.git_url_prefix.as_deref())
                .unwrap_or_default();
            BuilderSummary {
                index,
                collection: collection_from_git_url_prefix(prefix),
                branch: builder.branch_pattern().unwrap_or_default().to_string(),
                repository_dir: home.join(&builder.repository_dir).display().to_string(),
                generated_site_dir: home.join(&builder.generated_site_dir).display().to_string(),
                internal_site_dir: builder
                    .internal_site_dir
                    .as_ref()
                    .map(|dir| home.join(dir).display().to_string()),
            }
        })
        .collect()
}
