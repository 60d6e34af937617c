// LogSieve - platform/error_log.rs
//
// Durable error log. Appends `[timestamp] [SEVERITY] message` lines to a
// file that survives the process, independent of the tracing subscriber.
//
// - The file is rotated to a single backup once it grows past
//   ERROR_LOG_MAX_SIZE; the previous backup is replaced.
// - A failed append is retried ERROR_LOG_WRITE_ATTEMPTS times with a fixed
//   delay before the error is returned.
// - Appends are serialised through a mutex so concurrent runs never
//   interleave partial lines.

use crate::util::constants::{
    ERROR_LOG_BACKUP_FILE_NAME, ERROR_LOG_MAX_SIZE, ERROR_LOG_RETRY_DELAY_MS,
    ERROR_LOG_TIMESTAMP_FORMAT, ERROR_LOG_WRITE_ATTEMPTS,
};
use chrono::Local;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

/// Severity recorded with each error log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination for durable error records.
pub trait ErrorSink: Send + Sync {
    fn append(&self, severity: Severity, message: &str) -> io::Result<()>;
}

/// File-backed error log with size-based rotation.
#[derive(Debug)]
pub struct ErrorLog {
    path: PathBuf,
    backup_path: PathBuf,
    enabled: bool,
    lock: Mutex<()>,
}

impl ErrorLog {
    /// Error log at `path`; the backup lives next to it.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let backup_path = path
            .parent()
            .map(|p| p.join(ERROR_LOG_BACKUP_FILE_NAME))
            .unwrap_or_else(|| PathBuf::from(ERROR_LOG_BACKUP_FILE_NAME));
        Self {
            path,
            backup_path,
            enabled: true,
            lock: Mutex::new(()),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn rotate_if_needed(&self) -> io::Result<()> {
        match std::fs::metadata(&self.path) {
            Ok(meta) if meta.len() > ERROR_LOG_MAX_SIZE => {
                if self.backup_path.exists() {
                    std::fs::remove_file(&self.backup_path)?;
                }
                std::fs::rename(&self.path, &self.backup_path)?;
                tracing::debug!(
                    path = %self.path.display(),
                    backup = %self.backup_path.display(),
                    "Error log rotated"
                );
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn append_once(&self, line: &str) -> io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

impl ErrorSink for ErrorLog {
    fn append(&self, severity: Severity, message: &str) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let line = format!(
            "[{}] [{}] {}\n",
            Local::now().format(ERROR_LOG_TIMESTAMP_FORMAT),
            severity,
            message
        );

        // A poisoned lock only means another append panicked; the file is
        // still usable.
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        self.rotate_if_needed()?;

        let mut last_err: Option<io::Error> = None;
        for attempt in 0..ERROR_LOG_WRITE_ATTEMPTS {
            match self.append_once(&line) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    tracing::debug!(
                        path = %self.path.display(),
                        attempt = attempt + 1,
                        error = %e,
                        "Error log write failed"
                    );
                    last_err = Some(e);
                    if attempt + 1 < ERROR_LOG_WRITE_ATTEMPTS {
                        std::thread::sleep(Duration::from_millis(ERROR_LOG_RETRY_DELAY_MS));
                    }
                }
            }
        }

        Err(last_err.unwrap_or_else(|| io::Error::other("Error log write failed")))
    }
}

/// In-memory sink, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryErrorSink {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl MemoryErrorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record appended so far.
    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ErrorSink for MemoryErrorSink {
    fn append(&self, severity: Severity, message: &str) -> io::Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((severity, message.to_string()));
        Ok(())
    }
}
