//! `pages serve`: run the webhook listener in the foreground.

use anyhow::{Context, Result};
use clap::Args;

use crate::ConfigArg;

/// Arguments for `pages serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArg,
}

impl ServeArgs {
    pub fn run(self) -> Result<()> {
        let config = self.config.load()?;
        pages_daemon::start_blocking(config).context("webhook listener exited with error")
    }
}
