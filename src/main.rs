//! MySQL Database Backup and Import Tool
//!
//! Interactive CLI around the backup/restore orchestrator: connect, pick a
//! database, confirm, and run the job.

use anyhow::{Context, Result};
use std::env;
use std::io::{Write, stdin, stdout};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use mysql_backup_tool::config::AppConfig;
use mysql_backup_tool::job::{JobStatus, Orchestrator};
use mysql_backup_tool::joblog::JobLog;

enum Operation {
    Backup,
    Restore,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();

    match run_app().await {
        Ok(JobStatus::Succeeded) => ExitCode::SUCCESS,
        Ok(JobStatus::Cancelled) => {
            println!("Operation canceled.");
            ExitCode::SUCCESS
        }
        Ok(JobStatus::Failed(reason)) => {
            eprintln!("❌ {reason}");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("❌ Error: {e:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<JobStatus> {
    let config_path = PathBuf::from(
        env::var("CONFIG_PATH").unwrap_or_else(|_| "config.json".to_string()),
    );
    let config = AppConfig::load_from_json(&config_path).with_context(|| {
        format!(
            "Failed to load application configuration from {}",
            config_path.display()
        )
    })?;

    let log = JobLog::open(&config.log_file).with_context(|| {
        format!("Failed to open job log at {}", config.log_file.display())
    })?;
    let orchestrator =
        Orchestrator::mysql(log).context("Failed to set up the backup orchestrator")?;

    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else {
        prompt_choice()?
    };
    let operation = match choice.as_str() {
        "1" | "backup" => Operation::Backup,
        "2" | "restore" => Operation::Restore,
        _ => {
            println!("❌ Invalid choice. Please enter '1' (backup) or '2' (restore).");
            anyhow::bail!("Invalid operation choice");
        }
    };

    let databases = orchestrator
        .list_databases(&config.server)
        .await
        .context("Failed to connect to MySQL server")?;
    println!("✅ Connection to MySQL successful");
    let database = prompt_database(&databases)?;

    let confirm = |summary: &str| {
        println!("{summary}");
        print!("[y/N]: ");
        let _ = stdout().flush();
        let mut answer = String::new();
        if stdin().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
    };

    let result = match operation {
        Operation::Backup => {
            let dest_dir = match &config.backup_destination {
                Some(dir) => dir.clone(),
                None => PathBuf::from(prompt_line("Backup destination directory: ")?),
            };
            println!("🚀 Starting backup of {database}...");
            orchestrator
                .run_backup(&config.server, &database, &dest_dir, &confirm)
                .await
        }
        Operation::Restore => {
            let sql_file = match &config.restore_sql_file {
                Some(file) => file.clone(),
                None => PathBuf::from(prompt_line("Path to SQL file: ")?),
            };
            println!("🔄 Starting import into {database}...");
            orchestrator
                .run_restore(&config.server, &database, &sql_file, &confirm)
                .await
        }
    };

    if result.status == JobStatus::Succeeded {
        match &result.artifact {
            Some(archive) => println!("✅ Backup archive created at {}", archive.display()),
            None => println!("✅ Import completed successfully."),
        }
    }
    Ok(result.status)
}

/// Prompts the user to select backup or restore.
fn prompt_choice() -> Result<String> {
    println!("Select an operation:");
    println!("1. Take Backup (or type 'backup')");
    println!("2. Import SQL File (or type 'restore')");
    prompt_line("Enter your choice: ")
}

/// Prints the enumerated databases and lets the user pick one by number or
/// by name. The selection is re-validated against a live enumeration by the
/// orchestrator before anything runs.
fn prompt_database(databases: &[String]) -> Result<String> {
    if databases.is_empty() {
        anyhow::bail!("The server reported no databases");
    }
    println!("Available databases:");
    for (index, name) in databases.iter().enumerate() {
        println!("{}. {}", index + 1, name);
    }
    let answer = prompt_line("Select a database (number or name): ")?;
    if let Ok(index) = answer.parse::<usize>() {
        if index >= 1 && index <= databases.len() {
            return Ok(databases[index - 1].clone());
        }
        anyhow::bail!("Database number out of range: {index}");
    }
    Ok(answer)
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{label}");
    stdout().flush().context("Failed to flush stdout")?;
    let mut input = String::new();
    stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    Ok(input.trim().to_string())
}

fn init_tracing() {
    let level = match env::var("LOG_LEVEL").unwrap_or_default().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
