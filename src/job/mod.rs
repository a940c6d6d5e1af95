use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedSender;

use crate::backup::{Dumper, archive};
use crate::config::ConnectionParams;
use crate::connection::DatabaseServer;
use crate::errors::{ConnectionError, JobError};
use crate::joblog::JobLog;
use crate::restore::Restorer;

/// Subdirectory created under the chosen destination for backup artifacts.
pub const BACKUP_SUBDIR: &str = "NMRS_Backup";

/// Timestamp embedded in artifact file names: `<db>_<YYYY-MM-DD-HH-MM-SS>`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Terminal outcome of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Cancelled,
    Failed(String),
}

/// Result delivered to the caller once a job reaches a terminal state.
/// `artifact` is the archive path for a successful backup, `None` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub status: JobStatus,
    pub artifact: Option<PathBuf>,
}

impl JobResult {
    fn succeeded(artifact: Option<PathBuf>) -> Self {
        JobResult {
            status: JobStatus::Succeeded,
            artifact,
        }
    }

    fn cancelled() -> Self {
        JobResult {
            status: JobStatus::Cancelled,
            artifact: None,
        }
    }

    fn failed(err: &JobError) -> Self {
        JobResult {
            status: JobStatus::Failed(err.to_string()),
            artifact: None,
        }
    }
}

/// Progress notification sent to the caller as a job moves through its
/// states. Exactly one `Finished` is delivered per accepted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Validating,
    AwaitingConfirmation,
    Running,
    Finished(JobStatus),
}

/// Confirmation capability: asked exactly once per job, between validation
/// and execution. Answering `false` is the only cancellation point.
pub trait Confirm: Send + Sync {
    fn confirm(&self, summary: &str) -> bool;
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn confirm(&self, summary: &str) -> bool {
        self(summary)
    }
}

/// Sequences one backup or restore job: pre-flight validation, user
/// confirmation, external tool execution and (for backups) archive
/// packaging. At most one job runs at a time; a second request while one is
/// in flight is rejected, never interleaved.
pub struct Orchestrator {
    server: Box<dyn DatabaseServer>,
    dumper: Box<dyn Dumper>,
    restorer: Box<dyn Restorer>,
    log: JobLog,
    events: Option<UnboundedSender<JobEvent>>,
    busy: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        server: Box<dyn DatabaseServer>,
        dumper: Box<dyn Dumper>,
        restorer: Box<dyn Restorer>,
        log: JobLog,
    ) -> Self {
        Orchestrator {
            server,
            dumper,
            restorer,
            log,
            events: None,
            busy: AtomicBool::new(false),
        }
    }

    /// Wires the orchestrator for a real MySQL server: sqlx-backed
    /// enumeration plus `mysqldump`/`mysql` located in the PATH.
    pub fn mysql(log: JobLog) -> anyhow::Result<Self> {
        use crate::backup::DumpRunner;
        use crate::connection::MySqlServer;
        use crate::restore::RestoreRunner;

        Ok(Self::new(
            Box::new(MySqlServer),
            Box::new(DumpRunner::locate()?),
            Box::new(RestoreRunner::locate()?),
            log,
        ))
    }

    /// Registers a channel on which progress events are delivered.
    pub fn with_events(mut self, events: UnboundedSender<JobEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Enumerates the databases the server reports, in the server's return
    /// order.
    pub async fn list_databases(
        &self,
        params: &ConnectionParams,
    ) -> Result<Vec<String>, ConnectionError> {
        match self.server.list_databases(params).await {
            Ok(databases) => {
                self.log.info("Connection to MySQL successful");
                Ok(databases)
            }
            Err(err) => {
                self.log.error(&format!("Error: {err}"));
                Err(err)
            }
        }
    }

    /// Runs one backup job to completion and reports its terminal outcome.
    /// Never returns an `Err`; every failure is folded into the result and
    /// logged with its full diagnostic.
    pub async fn run_backup(
        &self,
        params: &ConnectionParams,
        database: &str,
        dest_dir: &Path,
        confirm: &dyn Confirm,
    ) -> JobResult {
        let Some(_guard) = self.acquire() else {
            return self.reject_busy("backup");
        };

        self.emit(JobEvent::Validating);
        if let Err(err) = self.preflight(params, database).await {
            self.log.error(&format!("Backup of {database} failed: {err}"));
            return self.finish(JobResult::failed(&err));
        }

        self.emit(JobEvent::AwaitingConfirmation);
        let summary = format!("Selected database: {database}\n\nDo you wish to proceed?");
        if !confirm.confirm(&summary) {
            self.log.info("Backup process canceled by user");
            return self.finish(JobResult::cancelled());
        }
        self.log.info("User confirmed the backup");

        self.emit(JobEvent::Running);
        self.log.info(&format!("Starting backup of {database}"));
        match self.execute_backup(params, database, dest_dir).await {
            Ok(archive_path) => {
                self.log
                    .info(&format!("Backup of {database} completed successfully"));
                self.finish(JobResult::succeeded(Some(archive_path)))
            }
            Err(err) => {
                self.log.error(&format!("Backup of {database} failed: {err}"));
                self.finish(JobResult::failed(&err))
            }
        }
    }

    /// Runs one restore job to completion and reports its terminal outcome.
    pub async fn run_restore(
        &self,
        params: &ConnectionParams,
        database: &str,
        sql_file: &Path,
        confirm: &dyn Confirm,
    ) -> JobResult {
        let Some(_guard) = self.acquire() else {
            return self.reject_busy("restore");
        };

        self.emit(JobEvent::Validating);
        if let Err(err) = self.preflight(params, database).await {
            self.log.error(&format!("Import to {database} failed: {err}"));
            return self.finish(JobResult::failed(&err));
        }

        self.emit(JobEvent::AwaitingConfirmation);
        let summary =
            format!("Selected database: {database}\n\nDo you wish to proceed with import?");
        if !confirm.confirm(&summary) {
            self.log.info("Import process canceled by user");
            return self.finish(JobResult::cancelled());
        }
        self.log.info("User confirmed the import");

        self.emit(JobEvent::Running);
        self.log
            .info(&format!("Starting import of {} into {database}", sql_file.display()));
        match self.restorer.restore(params, database, sql_file).await {
            Ok(()) => {
                self.log
                    .info(&format!("Import to {database} completed successfully"));
                self.finish(JobResult::succeeded(None))
            }
            Err(err) => {
                let err = JobError::Restore(err);
                self.log.error(&format!("Import to {database} failed: {err}"));
                self.finish(JobResult::failed(&err))
            }
        }
    }

    /// Re-validates the selection against a live enumeration, then pings the
    /// target database. Nothing is spawned and nothing is written before this
    /// passes.
    async fn preflight(
        &self,
        params: &ConnectionParams,
        database: &str,
    ) -> Result<(), JobError> {
        let databases = self.server.list_databases(params).await?;
        if !databases.iter().any(|name| name == database) {
            return Err(JobError::UnknownDatabase(database.to_string()));
        }
        self.server.ping_database(params, database).await?;
        self.log.info("Connection to MySQL successful");
        Ok(())
    }

    async fn execute_backup(
        &self,
        params: &ConnectionParams,
        database: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, JobError> {
        let backup_dir = dest_dir.join(BACKUP_SUBDIR);
        fs::create_dir_all(&backup_dir).map_err(|source| JobError::Io {
            path: backup_dir.clone(),
            source,
        })?;

        let stem = format!("{database}_{}", Local::now().format(TIMESTAMP_FORMAT));
        let dump_path = backup_dir.join(format!("{stem}.sql"));
        let archive_path = backup_dir.join(format!("{stem}.zip"));

        if let Err(err) = self.dumper.dump(params, database, &dump_path).await {
            // Partial dumps are never kept; the archive is the only artifact
            // a successful job leaves behind, and a failed one leaves none.
            if dump_path.exists() {
                match fs::remove_file(&dump_path) {
                    Ok(()) => self
                        .log
                        .info(&format!("Removed incomplete dump file {}", dump_path.display())),
                    Err(rm_err) => self.log.error(&format!(
                        "Failed to remove incomplete dump file {}: {rm_err}",
                        dump_path.display()
                    )),
                }
            }
            return Err(JobError::Dump(err));
        }

        if let Err(err) = archive::package_and_replace(&dump_path, &archive_path) {
            // The dump succeeded and is the only copy of the data, so it is
            // retained when only the packaging step fails.
            self.log.error(&format!(
                "Archive packaging failed; dump retained at {}",
                dump_path.display()
            ));
            return Err(JobError::Archive(err));
        }
        Ok(archive_path)
    }

    fn acquire(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()?;
        Some(BusyGuard(&self.busy))
    }

    fn reject_busy(&self, operation: &str) -> JobResult {
        let err = JobError::Busy;
        self.log
            .error(&format!("Rejected {operation} request: {err}"));
        // No events for a rejected request; the running job owns the channel.
        JobResult::failed(&err)
    }

    fn finish(&self, result: JobResult) -> JobResult {
        self.emit(JobEvent::Finished(result.status.clone()));
        result
    }

    fn emit(&self, event: JobEvent) {
        tracing::debug!(?event, "job state transition");
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = events.send(event);
        }
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
