use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure while talking to the MySQL server in-process.
///
/// The raw driver error is always preserved as the source so the full
/// diagnostic can be logged and surfaced to the caller.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(#[source] sqlx::Error),

    #[error("server unreachable: {0}")]
    Unreachable(#[source] sqlx::Error),

    #[error("protocol error: {0}")]
    Protocol(#[source] sqlx::Error),
}

impl From<sqlx::Error> for ConnectionError {
    fn from(err: sqlx::Error) -> Self {
        let unreachable = matches!(
            &err,
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut
        );
        // SQLSTATE class 28 covers invalid authorization (MySQL error 1045).
        let auth = matches!(
            &err,
            sqlx::Error::Database(db) if db.code().is_some_and(|c| c.starts_with("28"))
        );
        if unreachable {
            ConnectionError::Unreachable(err)
        } else if auth {
            ConnectionError::AuthenticationFailed(err)
        } else {
            ConnectionError::Protocol(err)
        }
    }
}

/// Failure while running an external tool (`mysqldump` or `mysql`).
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{tool} executable not found in PATH")]
    NotFound {
        tool: String,
        #[source]
        source: which::Error,
    },

    #[error("failed to launch {tool}: {source}")]
    SpawnFailed {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} exited with code {code}: {stderr}")]
    NonZeroExit {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("I/O error while running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: io::Error,
    },
}

/// Failure while packaging a dump file into a zip archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("source file name {0} is not valid UTF-8")]
    BadSourceName(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("zip format error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to move archive into place at {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Top-level failure of a backup or restore job. User cancellation is not an
/// error; it is reported through `JobStatus::Cancelled`.
#[derive(Error, Debug)]
pub enum JobError {
    #[error("connection failed: {0}")]
    Connection(#[from] ConnectionError),

    #[error("database '{0}' is not present on the server")]
    UnknownDatabase(String),

    #[error("dump failed: {0}")]
    Dump(CommandError),

    #[error("restore failed: {0}")]
    Restore(CommandError),

    #[error("archive packaging failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("filesystem error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("another job is already running")]
    Busy,
}
