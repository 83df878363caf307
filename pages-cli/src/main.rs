//! Pages: webhook-driven static site builder.
//!
//! # Usage
//!
//! ```text
//! pages serve [--config <path>]
//! pages build <repository> [--branch <name>] [--builder <index>] [--config <path>]
//! pages check [--config <path>] [--json]
//! ```
//!
//! The configuration path defaults to `$PAGES_CONFIG`, else `./pages-config.yaml`.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use commands::{build::BuildArgs, check::CheckArgs, serve::ServeArgs};
use pages_core::{config, ServerConfig};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "pages",
    version,
    about = "Build and publish static sites when branches are pushed",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Listen for push webhooks and build matching branches.
    Serve(ServeArgs),

    /// Build one repository branch now, without a webhook.
    Build(BuildArgs),

    /// Load and validate the configuration, then list the builders.
    Check(CheckArgs),
}

// ---------------------------------------------------------------------------
// Shared --config argument
// ---------------------------------------------------------------------------

/// Configuration file selection shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArg {
    /// Path to the YAML configuration file.
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl ConfigArg {
    pub fn path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(config::default_config_path)
    }

    pub fn load(&self) -> Result<ServerConfig> {
        let path = self.path();
        config::load_at(&path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => args.run(),
        Commands::Build(args) => args.run(),
        Commands::Check(args) => args.run(),
    }
}
