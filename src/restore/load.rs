use async_trait::async_trait;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use which::which;

use crate::config::ConnectionParams;
use crate::errors::CommandError;

pub const RESTORE_TOOL: &str = "mysql";

/// Replays a SQL script against one database.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Restorer: Send + Sync {
    async fn restore(
        &self,
        params: &ConnectionParams,
        database: &str,
        input_file: &Path,
    ) -> Result<(), CommandError>;
}

/// `Restorer` backed by the external `mysql` client, fed the script on stdin.
///
/// The operation is not transactional: if the client fails partway through,
/// the target database is left in a partially-restored state. That is a
/// property of the external tool and is surfaced, not hidden — the caller
/// gets the tool's exit code and stderr.
pub struct RestoreRunner {
    tool_path: PathBuf,
}

impl RestoreRunner {
    /// Locates the `mysql` client in the PATH.
    pub fn locate() -> Result<Self, CommandError> {
        let tool_path = which(RESTORE_TOOL).map_err(|source| CommandError::NotFound {
            tool: RESTORE_TOOL.to_string(),
            source,
        })?;
        tracing::debug!("found {RESTORE_TOOL} executable at {}", tool_path.display());
        Ok(RestoreRunner { tool_path })
    }

    /// Uses an explicit executable instead of searching the PATH.
    pub fn with_tool_path(tool_path: PathBuf) -> Self {
        RestoreRunner { tool_path }
    }
}

#[async_trait]
impl Restorer for RestoreRunner {
    async fn restore(
        &self,
        params: &ConnectionParams,
        database: &str,
        input_file: &Path,
    ) -> Result<(), CommandError> {
        if !input_file.is_file() {
            return Err(CommandError::Io {
                tool: RESTORE_TOOL.to_string(),
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("SQL script not found: {}", input_file.display()),
                ),
            });
        }
        let stdin_file = File::open(input_file).map_err(|source| CommandError::Io {
            tool: RESTORE_TOOL.to_string(),
            source,
        })?;

        let child = Command::new(&self.tool_path)
            .arg("-h")
            .arg(&params.host)
            .arg("-P")
            .arg(params.port.to_string())
            .arg("-u")
            .arg(&params.username)
            .arg(database)
            .env("MYSQL_PWD", &params.password)
            .stdin(Stdio::from(stdin_file))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CommandError::SpawnFailed {
                tool: RESTORE_TOOL.to_string(),
                source,
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| CommandError::Io {
                tool: RESTORE_TOOL.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(CommandError::NonZeroExit {
                tool: RESTORE_TOOL.to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
