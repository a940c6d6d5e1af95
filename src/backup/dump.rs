use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use which::which;

use crate::config::ConnectionParams;
use crate::errors::CommandError;

pub const DUMP_TOOL: &str = "mysqldump";

/// Serializes one database to a SQL script file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Dumper: Send + Sync {
    async fn dump(
        &self,
        params: &ConnectionParams,
        database: &str,
        output_file: &Path,
    ) -> Result<(), CommandError>;
}

/// `Dumper` backed by the external `mysqldump` utility. The tool's stdout is
/// streamed straight into the output file; stderr is captured for diagnostics.
pub struct DumpRunner {
    tool_path: PathBuf,
}

impl DumpRunner {
    /// Locates `mysqldump` in the PATH.
    pub fn locate() -> Result<Self, CommandError> {
        let tool_path = which(DUMP_TOOL).map_err(|source| CommandError::NotFound {
            tool: DUMP_TOOL.to_string(),
            source,
        })?;
        tracing::debug!("found {DUMP_TOOL} executable at {}", tool_path.display());
        Ok(DumpRunner { tool_path })
    }

    /// Uses an explicit executable instead of searching the PATH.
    pub fn with_tool_path(tool_path: PathBuf) -> Self {
        DumpRunner { tool_path }
    }
}

#[async_trait]
impl Dumper for DumpRunner {
    async fn dump(
        &self,
        params: &ConnectionParams,
        database: &str,
        output_file: &Path,
    ) -> Result<(), CommandError> {
        let stdout_file = File::create(output_file).map_err(|source| CommandError::Io {
            tool: DUMP_TOOL.to_string(),
            source,
        })?;

        // The password travels through the MYSQL_PWD environment variable
        // rather than argv, where it would be visible in the process listing.
        let child = Command::new(&self.tool_path)
            .arg("-h")
            .arg(&params.host)
            .arg("-P")
            .arg(params.port.to_string())
            .arg("-u")
            .arg(&params.username)
            .arg(database)
            .env("MYSQL_PWD", &params.password)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CommandError::SpawnFailed {
                tool: DUMP_TOOL.to_string(),
                source,
            })?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| CommandError::Io {
                tool: DUMP_TOOL.to_string(),
                source,
            })?;

        if !output.status.success() {
            return Err(CommandError::NonZeroExit {
                tool: DUMP_TOOL.to_string(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
