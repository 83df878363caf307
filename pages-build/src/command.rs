//! External command execution.
//!
//! Every tool the build touches (git, bundler, the generator, rsync, the
//! upload client) goes through a [`CommandRunner`], so the orchestrator can be
//! driven by a recording fake in tests.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use pages_core::BuildLogger;

use crate::error::{io_err, BuildError};

/// Runs one program to completion in a working directory.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<(), BuildError>;
}

/// `program arg1 arg2`, as shown in logs and error messages.
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spawns real processes and streams their output into the build log.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    logger: Arc<BuildLogger>,
}

impl ProcessRunner {
    pub fn new(logger: Arc<BuildLogger>) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> Result<(), BuildError> {
        let command = command_line(program, args);
        self.logger.log(&command);

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BuildError::Spawn {
                command: command.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (_, _, status) = tokio::join!(
            pump(stdout, &self.logger),
            pump(stderr, &self.logger),
            child.wait()
        );
        let status = status.map_err(|e| io_err(cwd, e))?;

        if status.success() {
            return Ok(());
        }
        let status = match status.code() {
            Some(code) => format!("exit code {code}"),
            None => "termination by signal".to_string(),
        };
        Err(BuildError::CommandFailed { command, status })
    }
}

async fn pump<R: AsyncRead + Unpin>(stream: Option<R>, logger: &BuildLogger) {
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => logger.log(line),
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(error = %err, "stopped reading command output");
                break;
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn command_line_joins_with_spaces() {
        assert_eq!(command_line("git", &args(&["clean", "-f", "-d"])), "git clean -f -d");
        assert_eq!(command_line("ls", &[]), "ls");
    }

    #[tokio::test]
    async fn output_lines_reach_the_build_log() {
        let dir = TempDir::new().expect("tempdir");
        let log_path = dir.path().join("site.log");
        let logger = Arc::new(BuildLogger::create(&log_path).expect("log"));
        let runner = ProcessRunner::new(logger.clone());

        runner
            .run("sh", &args(&["-c", "echo out; echo err >&2"]), dir.path())
            .await
            .expect("run");
        logger.close().expect("close");

        let contents = std::fs::read_to_string(&log_path).expect("read");
        assert!(contents.contains(" sh -c echo out; echo err >&2\n"), "{contents}");
        assert!(contents.contains(" out\n"));
        assert!(contents.contains(" err\n"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_with_code() {
        let dir = TempDir::new().expect("tempdir");
        let runner = ProcessRunner::new(Arc::new(BuildLogger::detached()));
        let err = runner
            .run("sh", &args(&["-c", "exit 3"]), dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "`sh -c exit 3` failed with exit code 3");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_error() {
        let dir = TempDir::new().expect("tempdir");
        let runner = ProcessRunner::new(Arc::new(BuildLogger::detached()));
        let err = runner
            .run("pages-no-such-program", &[], dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }), "got: {err}");
    }
}
