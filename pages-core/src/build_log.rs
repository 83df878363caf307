//! Per-build log file.
//!
//! Every line is timestamped, appended to `<site_path>.log` and mirrored to
//! `tracing` so the daemon's own output carries the same record. After the
//! build settles the file is closed and relocated next to the published site.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};

/// Append-only build log shared by every component of one build.
#[derive(Debug)]
pub struct BuildLogger {
    path: Option<PathBuf>,
    file: Mutex<Option<BufWriter<File>>>,
}

impl BuildLogger {
    /// Open (truncating) the log file at `path`, creating parent directories.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            file: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// A logger with no backing file; lines only reach `tracing`.
    pub fn detached() -> Self {
        Self {
            path: None,
            file: Mutex::new(None),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn log(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::info!(target: "pages::build", "{message}");
        self.write_line("", message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        let message = message.as_ref();
        tracing::error!(target: "pages::build", "{message}");
        self.write_line("ERROR ", message);
    }

    /// Flush and close the file. Later calls to `log`/`error` only reach `tracing`.
    pub fn close(&self) -> io::Result<()> {
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        match guard.take() {
            Some(mut writer) => writer.flush(),
            None => Ok(()),
        }
    }

    fn write_line(&self, level: &str, message: &str) {
        let mut guard = self.file.lock().unwrap_or_else(|e| e.into_inner());
        let Some(writer) = guard.as_mut() else {
            return;
        };
        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let result = writeln!(writer, "{stamp} {level}{message}").and_then(|_| writer.flush());
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to append to build log");
        }
    }
}
