//! End-to-end backup and restore flows: a stub server client plus fake
//! external tools, real filesystem, real zip packaging.

#![cfg(unix)]

use async_trait::async_trait;
use std::fs::{self, File};
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use mysql_backup_tool::backup::DumpRunner;
use mysql_backup_tool::config::ConnectionParams;
use mysql_backup_tool::connection::DatabaseServer;
use mysql_backup_tool::errors::ConnectionError;
use mysql_backup_tool::job::{BACKUP_SUBDIR, JobStatus, Orchestrator};
use mysql_backup_tool::joblog::JobLog;
use mysql_backup_tool::restore::RestoreRunner;

struct StaticServer(Vec<String>);

#[async_trait]
impl DatabaseServer for StaticServer {
    async fn list_databases(
        &self,
        _params: &ConnectionParams,
    ) -> Result<Vec<String>, ConnectionError> {
        Ok(self.0.clone())
    }

    async fn ping_database(
        &self,
        _params: &ConnectionParams,
        _database: &str,
    ) -> Result<(), ConnectionError> {
        Ok(())
    }
}

fn params() -> ConnectionParams {
    ConnectionParams {
        host: "localhost".into(),
        port: 3306,
        username: "root".into(),
        password: "x".into(),
    }
}

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).expect("chmod script");
    path
}

fn build_orchestrator(tools_dir: &Path, dump_body: &str, restore_body: &str, log_path: &Path) -> Orchestrator {
    let dump_tool = write_script(tools_dir, "fake_mysqldump", dump_body);
    let restore_tool = write_script(tools_dir, "fake_mysql", restore_body);
    Orchestrator::new(
        Box::new(StaticServer(vec!["shop".into(), "crm".into()])),
        Box::new(DumpRunner::with_tool_path(dump_tool)),
        Box::new(RestoreRunner::with_tool_path(restore_tool)),
        JobLog::open(log_path).expect("open job log"),
    )
}

fn zip_entries(archive: &Path) -> Vec<(String, String)> {
    let mut zip =
        zip::ZipArchive::new(File::open(archive).expect("open archive")).expect("read archive");
    let mut entries = Vec::new();
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).expect("archive entry");
        let mut content = String::new();
        entry.read_to_string(&mut content).expect("read entry");
        entries.push((entry.name().to_string(), content));
    }
    entries
}

#[tokio::test]
async fn backup_produces_zip_with_single_sql_entry() {
    let tools = tempdir().expect("tools dir");
    let dest = tempdir().expect("dest dir");
    let log_path = tools.path().join("job.log");
    let orchestrator = build_orchestrator(
        tools.path(),
        "echo '-- MySQL dump'\necho 'CREATE TABLE orders (id INT);'",
        "exit 0",
        &log_path,
    );

    let result = orchestrator
        .run_backup(&params(), "shop", dest.path(), &|_: &str| true)
        .await;

    assert_eq!(result.status, JobStatus::Succeeded);
    let archive = result.artifact.expect("archive path");
    assert!(archive.starts_with(dest.path().join(BACKUP_SUBDIR)));
    let archive_name = archive.file_name().unwrap().to_str().unwrap();
    assert!(archive_name.starts_with("shop_") && archive_name.ends_with(".zip"));

    let entries = zip_entries(&archive);
    assert_eq!(entries.len(), 1);
    let (entry_name, content) = &entries[0];
    assert_eq!(entry_name.as_str(), archive_name.replace(".zip", ".sql"));
    assert!(content.contains("CREATE TABLE orders (id INT);"));

    // The uncompressed intermediate is gone after a successful backup.
    let sql_files: Vec<_> = fs::read_dir(dest.path().join(BACKUP_SUBDIR))
        .expect("read backup dir")
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "sql"))
        .collect();
    assert!(sql_files.is_empty());

    let log = fs::read_to_string(&log_path).expect("read job log");
    assert!(log.contains("Backup of shop completed successfully"));
}

#[tokio::test]
async fn repeated_backups_yield_distinct_archives() {
    let tools = tempdir().expect("tools dir");
    let dest = tempdir().expect("dest dir");
    let orchestrator = build_orchestrator(
        tools.path(),
        "echo 'SELECT 1;'",
        "exit 0",
        &tools.path().join("job.log"),
    );

    let first = orchestrator
        .run_backup(&params(), "shop", dest.path(), &|_: &str| true)
        .await;
    // File names carry second-resolution timestamps.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = orchestrator
        .run_backup(&params(), "shop", dest.path(), &|_: &str| true)
        .await;

    assert_eq!(first.status, JobStatus::Succeeded);
    assert_eq!(second.status, JobStatus::Succeeded);
    assert_ne!(first.artifact, second.artifact);
    assert!(first.artifact.unwrap().is_file());
    assert!(second.artifact.unwrap().is_file());
}

#[tokio::test]
async fn failed_dump_leaves_no_artifacts_behind() {
    let tools = tempdir().expect("tools dir");
    let dest = tempdir().expect("dest dir");
    let log_path = tools.path().join("job.log");
    let orchestrator = build_orchestrator(
        tools.path(),
        "echo 'partial output'\necho 'Access denied' >&2\nexit 2",
        "exit 0",
        &log_path,
    );

    let result = orchestrator
        .run_backup(&params(), "shop", dest.path(), &|_: &str| true)
        .await;

    match &result.status {
        JobStatus::Failed(reason) => assert!(reason.contains("Access denied")),
        other => panic!("expected failure, got {other:?}"),
    }
    let leftovers: Vec<_> = fs::read_dir(dest.path().join(BACKUP_SUBDIR))
        .expect("read backup dir")
        .filter_map(|entry| entry.ok())
        .collect();
    assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");

    let log = fs::read_to_string(&log_path).expect("read job log");
    assert!(log.contains("Access denied"));
}

#[tokio::test]
async fn restore_replays_script_and_reports_success() {
    let tools = tempdir().expect("tools dir");
    let log_path = tools.path().join("job.log");
    let orchestrator = build_orchestrator(
        tools.path(),
        "exit 0",
        "cat > /dev/null",
        &log_path,
    );
    let sql_file = tools.path().join("shop.sql");
    fs::write(&sql_file, "CREATE TABLE orders (id INT);\n").expect("write script");

    let result = orchestrator
        .run_restore(&params(), "shop", &sql_file, &|_: &str| true)
        .await;

    assert_eq!(result.status, JobStatus::Succeeded);
    assert!(result.artifact.is_none());
    let log = fs::read_to_string(&log_path).expect("read job log");
    assert!(log.contains("Import to shop completed successfully"));
}

#[tokio::test]
async fn unknown_database_fails_before_any_tool_runs() {
    let tools = tempdir().expect("tools dir");
    let dest = tempdir().expect("dest dir");
    // A dump tool that would leave a marker if it ever ran.
    let orchestrator = build_orchestrator(
        tools.path(),
        "touch \"$(dirname \"$0\")/dump-ran\"",
        "exit 0",
        &tools.path().join("job.log"),
    );

    let result = orchestrator
        .run_backup(&params(), "payroll", dest.path(), &|_: &str| true)
        .await;

    match &result.status {
        JobStatus::Failed(reason) => assert!(reason.contains("not present")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!tools.path().join("dump-ran").exists());
    assert!(!dest.path().join(BACKUP_SUBDIR).exists());
}
