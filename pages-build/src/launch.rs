//! Entry point used by the daemon and the CLI for one build.
//!
//! Wraps the [`SiteBuilder`] pipeline with the build log lifecycle: a header
//! describing the push, a pass/fail line, and relocation of the finished log
//! to `<public destination>/build.log` where it is served next to the site.
//! Each launch writes its own log file; the outcome and relocation happen
//! under the repository lock, so a queued build cannot touch them.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use pages_core::{
    BranchName, BuildEvent, BuildLogger, BuilderConfig, BuilderOptions, RepoName, ServerConfig,
};

use crate::error::{io_err, BuildError};
use crate::lock::LockTable;
use crate::site_builder::{BuildSettings, Components, SiteBuilder};

/// File name of the relocated log inside the public destination.
pub const BUILD_LOG_NAME: &str = "build.log";

static LAUNCHES: AtomicU64 = AtomicU64::new(0);

/// Build `branch` of the repository named in `event` with the given builder.
pub async fn launch_builder(
    event: &BuildEvent,
    branch: BranchName,
    builder: &BuilderConfig,
    config: &ServerConfig,
    locks: Arc<LockTable>,
) -> Result<(), BuildError> {
    let opts = BuilderOptions::new(
        RepoName::from(event.repository.as_str()),
        &branch,
        config,
        builder,
    );
    let log_path = log_path_for(&opts, event);
    let logger = Arc::new(BuildLogger::create(&log_path).map_err(|e| io_err(&log_path, e))?);

    let components = Components::for_build(&opts, &branch, config, locks, logger.clone());
    let site_builder = SiteBuilder::new(
        branch,
        opts.site_path.clone(),
        components,
        BuildSettings::from_config(config),
    );
    run_logged_build(event, site_builder, &logger).await
}

/// A log path no other live launch uses: `<site_path>.<commit>-<pid>-<n>.log`.
pub fn log_path_for(opts: &BuilderOptions, event: &BuildEvent) -> PathBuf {
    let n = LAUNCHES.fetch_add(1, Ordering::Relaxed);
    opts.build_log_path(&format!("{}-{}-{n}", event.commit.id, std::process::id()))
}

/// Run `builder`, record the outcome in `logger`, then relocate the log.
///
/// Errors closing or relocating the log take precedence over the build result.
pub async fn run_logged_build(
    event: &BuildEvent,
    mut builder: SiteBuilder,
    logger: &BuildLogger,
) -> Result<(), BuildError> {
    log_event(event, logger);

    let lock = builder.lock().clone();
    let locked = lock
        .do_locked_operation(async {
            let result = builder.run_pipeline().await;
            Ok::<_, BuildError>(settle(event, &builder, logger, result).await)
        })
        .await;
    match locked {
        Ok(outcome) => outcome,
        // The lock could not be taken; nothing ran.
        Err(err) => settle(event, &builder, logger, Err(err)).await,
    }
}

async fn settle(
    event: &BuildEvent,
    builder: &SiteBuilder,
    logger: &BuildLogger,
    result: Result<(), BuildError>,
) -> Result<(), BuildError> {
    match &result {
        Ok(()) => logger.log(format!("{}: build successful", event.repository)),
        Err(err) => {
            logger.error(err.to_string());
            logger.error(format!("{}: build failed", event.repository));
        }
    }
    let closed = logger.close();

    let Some(source) = logger.path() else {
        return result;
    };
    let closed = closed.map_err(|e| io_err(source, e));
    if let Err(err) = &closed {
        tracing::error!(
            repo = %event.repository,
            branch = %builder.branch(),
            "Error closing build log: {err}"
        );
    }

    let target = builder.public_destination().join(BUILD_LOG_NAME);
    let relocated = relocate_log(source, &target).await;
    if let Err(err) = &relocated {
        tracing::error!(
            repo = %event.repository,
            branch = %builder.branch(),
            "Error moving build log: {err}"
        );
    }
    outcome(result, closed, relocated)
}

/// Relocation beats closing beats the build itself.
fn outcome(
    build: Result<(), BuildError>,
    closed: Result<(), BuildError>,
    relocated: Result<(), BuildError>,
) -> Result<(), BuildError> {
    relocated.and(closed).and(build)
}

fn log_event(event: &BuildEvent, logger: &BuildLogger) {
    logger.log(format!(
        "{}/{}: starting build at commit {}",
        event.collection, event.repository, event.commit.id
    ));
    logger.log(format!("description: {}", event.commit.message));
    logger.log(format!("timestamp: {}", event.commit.timestamp));
    logger.log(format!("author: {}", event.author));
    if let Some(committer) = &event.committer {
        logger.log(format!("committer: {committer}"));
    }
    if let Some(pusher) = &event.pusher {
        logger.log(format!("pusher: {pusher}"));
    }
}

/// Copy then delete, so the log can cross filesystems.
async fn relocate_log(source: &Path, target: &Path) -> Result<(), BuildError> {
    let mut reader = tokio::fs::File::open(source)
        .await
        .map_err(|e| io_err(source, e))?;
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    let mut writer = tokio::fs::File::create(target)
        .await
        .map_err(|e| io_err(target, e))?;
    tokio::io::copy(&mut reader, &mut writer)
        .await
        .map_err(|e| io_err(target, e))?;
    writer.flush().await.map_err(|e| io_err(target, e))?;
    tokio::fs::remove_file(source)
        .await
        .map_err(|e| io_err(source, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn io(path: &str) -> BuildError {
        io_err(path, std::io::Error::other("disk full"))
    }

    fn failed() -> BuildError {
        BuildError::CommandFailed {
            command: "jekyll build".to_string(),
            status: "exit code 1".to_string(),
        }
    }

    fn path_of(err: BuildError) -> PathBuf {
        match err {
            BuildError::Io { path, .. } => path,
            other => panic!("expected an I/O error, got {other}"),
        }
    }

    #[test]
    fn close_failure_outranks_build_result() {
        assert_eq!(path_of(outcome(Ok(()), Err(io("site.log")), Ok(())).unwrap_err()), Path::new("site.log"));
        assert_eq!(path_of(outcome(Err(failed()), Err(io("site.log")), Ok(())).unwrap_err()), Path::new("site.log"));
    }

    #[test]
    fn relocation_failure_outranks_everything() {
        let err = outcome(Err(failed()), Err(io("site.log")), Err(io("build.log"))).unwrap_err();
        assert_eq!(path_of(err), Path::new("build.log"));
    }

    #[test]
    fn clean_settlement_returns_build_result() {
        assert!(outcome(Ok(()), Ok(()), Ok(())).is_ok());
        assert!(matches!(
            outcome(Err(failed()), Ok(()), Ok(())),
            Err(BuildError::CommandFailed { .. })
        ));
    }

    #[tokio::test]
    async fn missing_source_log_is_reported_against_the_source() {
        let dir = TempDir::new().expect("tempdir");
        let source = dir.path().join("hub.deadbeef.log");
        let target = dir.path().join("dest").join(BUILD_LOG_NAME);

        let err = relocate_log(&source, &target).await.unwrap_err();
        assert_eq!(path_of(err), source);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn relocation_moves_contents() {
        let dir = TempDir::new().expect("tempdir");
        let source = dir.path().join("hub.deadbeef.log");
        std::fs::write(&source, "line\n").expect("source");
        let target = dir.path().join("dest").join("hub").join(BUILD_LOG_NAME);

        relocate_log(&source, &target).await.expect("relocate");
        assert!(!source.exists());
        assert_eq!(std::fs::read_to_string(&target).expect("target"), "line\n");
    }
}
