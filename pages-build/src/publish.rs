//! Publishing built output.
//!
//! [`LocalPublisher`] is used when sites are served straight from the
//! destination directories; [`CommandPublisher`] mirrors each destination to a
//! bucket with an `aws s3 sync` style client.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use pages_core::{BuildLogger, PublishConfig};

use crate::command::CommandRunner;
use crate::error::BuildError;

/// Publishes one build destination.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn sync(&self, destination: &Path) -> Result<(), BuildError>;
}

/// Output already sits where it is served from; nothing to upload.
pub struct LocalPublisher {
    logger: Arc<BuildLogger>,
}

impl LocalPublisher {
    pub fn new(logger: Arc<BuildLogger>) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl Publisher for LocalPublisher {
    async fn sync(&self, destination: &Path) -> Result<(), BuildError> {
        self.logger
            .log(format!("published {} locally", destination.display()));
        Ok(())
    }
}

/// Uploads with `<program> s3 sync <destination> s3://<bucket>/<relative path>`.
///
/// The object prefix is the destination relative to the server home, so the
/// bucket layout mirrors the generated site directories.
pub struct CommandPublisher {
    runner: Arc<dyn CommandRunner>,
    config: PublishConfig,
    home: PathBuf,
    logger: Arc<BuildLogger>,
}

impl CommandPublisher {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        config: PublishConfig,
        home: PathBuf,
        logger: Arc<BuildLogger>,
    ) -> Self {
        Self {
            runner,
            config,
            home,
            logger,
        }
    }

    /// `s3://<bucket>/<destination relative to home>`.
    pub fn remote_for(&self, destination: &Path) -> Result<String, BuildError> {
        let relative = destination
            .strip_prefix(&self.home)
            .map_err(|_| BuildError::Publish {
                destination: destination.to_path_buf(),
                message: format!("not under {}", self.home.display()),
            })?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Ok(format!("s3://{}/{}", self.config.bucket, key))
    }
}

#[async_trait]
impl Publisher for CommandPublisher {
    async fn sync(&self, destination: &Path) -> Result<(), BuildError> {
        let remote = self.remote_for(destination)?;
        self.logger
            .log(format!("syncing {} to {remote}", destination.display()));

        let mut args = vec![
            "s3".to_string(),
            "sync".to_string(),
            destination.display().to_string(),
            remote,
        ];
        args.extend(self.config.extra_args.iter().cloned());
        self.runner.run(&self.config.program, &args, &self.home).await
    }
}
