use chrono::Local;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => f.write_str("INFO"),
            LogLevel::Error => f.write_str("ERROR"),
        }
    }
}

/// Append-only job log, one line per event:
/// `YYYY-MM-DD HH:MM:SS - LEVEL - message`.
///
/// This file is part of the tool's external interface — the surrounding UI
/// and operators read it to follow job progress — so its format is fixed
/// independently of the process-level tracing output.
#[derive(Debug)]
pub struct JobLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JobLog {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(JobLog {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: &str) {
        tracing::info!("{message}");
        self.append(LogLevel::Info, message);
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{message}");
        self.append(LogLevel::Error, message);
    }

    /// A log write failure must never abort the job it is describing, so I/O
    /// errors are reported on the tracing side only.
    fn append(&self, level: LogLevel, message: &str) {
        let line = format!(
            "{} - {} - {}",
            Local::now().format(TIMESTAMP_FORMAT),
            level,
            message
        );
        let mut file = match self.file.lock() {
            Ok(file) => file,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = writeln!(file, "{line}") {
            tracing::warn!("failed to append to job log {}: {err}", self.path.display());
        }
    }
}
