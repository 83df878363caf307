//! Per-repository, per-branch build exclusion.
//!
//! Two layers guard a build:
//! - an in-process async mutex keyed by `(repository, branch)`, shared through
//!   a [`LockTable`], which serialises builds inside one daemon;
//! - an advisory `flock` on the marker file
//!   `<repo_dir>/.update-lock-<repo>-<branch>`, which keeps a second process
//!   (say, a one-off `pages build`) off the same working copy. The kernel drops
//!   the flock when its holder exits, so a killed build never blocks the key.
//!
//! Both are released by guards, so every exit path of the locked operation
//! (return, error, panic, the future being dropped) frees the key.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{self, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::OwnedMutexGuard;

use pages_core::{BranchName, BuilderOptions, RepoName};

use crate::error::{io_err, BuildError};

/// How often a marker locked by another process is re-checked.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

type LockKey = (RepoName, BranchName);
type KeyMutex = Arc<tokio::sync::Mutex<()>>;

/// Shared table of per-key async mutexes. One per process.
///
/// An entry lives only while some build holds or waits for its key.
#[derive(Debug, Default)]
pub struct LockTable {
    entries: Mutex<HashMap<LockKey, KeyMutex>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: &LockKey) -> KeyMutex {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.entry(key.clone()).or_default().clone()
    }

    /// Forget `key` if `mutex` is its entry and nobody else references it.
    fn release(&self, key: &LockKey, mutex: &KeyMutex) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let unused = entries
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, mutex) && Arc::strong_count(mutex) == 2);
        if unused {
            entries.remove(key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Holds one key of a [`LockTable`]; prunes the entry on drop.
struct KeyGuard {
    table: Arc<LockTable>,
    key: LockKey,
    mutex: KeyMutex,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.held.take();
        self.table.release(&self.key, &self.mutex);
    }
}

/// Contents of the marker file while a build holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub repository: String,
    pub branch: String,
    pub started_at: DateTime<Utc>,
}

/// The lock for one repository branch.
#[derive(Debug, Clone)]
pub struct RepoLock {
    table: Arc<LockTable>,
    key: LockKey,
    marker: PathBuf,
    poll_interval: Duration,
}

impl RepoLock {
    pub fn new(table: Arc<LockTable>, opts: &BuilderOptions, branch: &BranchName) -> Self {
        let marker = opts.repo_dir.join(format!(
            ".update-lock-{}-{}",
            opts.repo_name,
            branch.file_stem()
        ));
        Self {
            table,
            key: (opts.repo_name.clone(), branch.clone()),
            marker,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker
    }

    /// Run `operation` while holding the key exclusively.
    ///
    /// Waits for any earlier holder to settle first. The operation's own
    /// result is returned unchanged.
    pub async fn do_locked_operation<F, T>(&self, operation: F) -> Result<T, BuildError>
    where
        F: Future<Output = Result<T, BuildError>>,
    {
        let mut key = KeyGuard {
            table: self.table.clone(),
            key: self.key.clone(),
            mutex: self.table.entry(&self.key),
            held: None,
        };
        key.held = Some(key.mutex.clone().lock_owned().await);
        let _marker = self.acquire_marker().await?;
        tracing::debug!(
            repo = %self.key.0,
            branch = %self.key.1,
            marker = %self.marker.display(),
            "build lock acquired"
        );
        operation.await
    }

    async fn acquire_marker(&self) -> Result<MarkerGuard, BuildError> {
        if let Some(parent) = self.marker.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_err(parent, e))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.marker)
            .map_err(|e| io_err(&self.marker, e))?;

        let mut warned = false;
        loop {
            match try_lock_exclusive(&file) {
                Ok(()) => break,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                    if !warned {
                        warned = true;
                        self.warn_contention();
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(err) => return Err(io_err(&self.marker, err)),
            }
        }

        let guard = MarkerGuard {
            file,
            path: self.marker.clone(),
        };
        guard.record(&LockHolder {
            pid: std::process::id(),
            repository: self.key.0.to_string(),
            branch: self.key.1.to_string(),
            started_at: Utc::now(),
        })?;
        Ok(guard)
    }

    fn warn_contention(&self) {
        let holder = std::fs::read(&self.marker)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<LockHolder>(&bytes).ok());
        match holder {
            Some(holder) => tracing::warn!(
                marker = %self.marker.display(),
                pid = holder.pid,
                started_at = %holder.started_at,
                "waiting for another process to finish building"
            ),
            None => tracing::warn!(
                marker = %self.marker.display(),
                "waiting for lock marker held by an unknown process"
            ),
        }
    }
}

/// The locked marker file. Emptied, then unlocked by closing, on drop.
#[derive(Debug)]
struct MarkerGuard {
    file: File,
    path: PathBuf,
}

impl MarkerGuard {
    fn record(&self, holder: &LockHolder) -> Result<(), BuildError> {
        let mut file = &self.file;
        file.set_len(0).map_err(|e| io_err(&self.path, e))?;
        file.rewind().map_err(|e| io_err(&self.path, e))?;
        serde_json::to_writer_pretty(file, holder)?;
        file.flush().map_err(|e| io_err(&self.path, e))
    }
}

impl Drop for MarkerGuard {
    fn drop(&mut self) {
        if let Err(err) = self.file.set_len(0) {
            tracing::warn!(
                marker = %self.path.display(),
                error = %err,
                "failed to clear lock marker"
            );
        }
    }
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
    use rustix::fs::{flock, FlockOperation};
    use std::os::unix::io::AsFd;

    flock(file.as_fd(), FlockOperation::NonBlockingLockExclusive)
        .map_err(|e| io::Error::from_raw_os_error(e.raw_os_error()))
}

/// Without `flock` only the in-process mutex applies.
#[cfg(not(unix))]
fn try_lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}
