//! Static site generator invocation.

use std::path::PathBuf;
use std::sync::Arc;

use pages_resolver::BuildTarget;

use crate::command::CommandRunner;
use crate::error::BuildError;

/// Runs `jekyll build` once per [`BuildTarget`], in order.
pub struct BuildInvoker {
    runner: Arc<dyn CommandRunner>,
    site_path: PathBuf,
}

impl BuildInvoker {
    pub fn new(runner: Arc<dyn CommandRunner>, site_path: PathBuf) -> Self {
        Self { runner, site_path }
    }

    /// Build every target; the first failure stops the pass.
    ///
    /// With `bundler` the generator runs as `bundle exec jekyll`.
    pub async fn build(&self, targets: &[BuildTarget], bundler: bool) -> Result<(), BuildError> {
        for target in targets {
            let (program, args) = generator_command(target, bundler);
            self.runner.run(program, &args, &self.site_path).await?;
        }
        Ok(())
    }
}

/// Program and arguments for one generator pass.
pub fn generator_command(target: &BuildTarget, bundler: bool) -> (&'static str, Vec<String>) {
    let mut args: Vec<String> = ["build", "--trace", "--destination"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    args.push(target.destination.display().to_string());
    args.push("--config".to_string());
    args.push(target.config_arg());

    if bundler {
        let mut wrapped = vec!["exec".to_string(), "jekyll".to_string()];
        wrapped.extend(args);
        ("bundle", wrapped)
    } else {
        ("jekyll", args)
    }
}
