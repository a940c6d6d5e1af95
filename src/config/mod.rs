use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_LOG_FILE: &str = "mysql_backup.log";

/// Credentials and endpoint for one MySQL server.
///
/// Supplied fresh for every operation; nothing here is persisted between
/// calls. `Debug` never prints the password.
#[derive(Clone, Deserialize)]
pub struct ConnectionParams {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ConnectionParams {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            anyhow::bail!("server.host must not be empty");
        }
        if self.port == 0 {
            anyhow::bail!("server.port must be in the range 1-65535");
        }
        if self.username.trim().is_empty() {
            anyhow::bail!("server.username must not be empty");
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

// Structs for deserializing config.json
#[derive(Debug, Clone, Deserialize)]
pub struct JsonBackupConfig {
    pub destination_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRestoreConfig {
    pub sql_file: Option<PathBuf>,
}

#[derive(Deserialize)]
struct RawJsonConfig {
    server: ConnectionParams,
    backup: Option<JsonBackupConfig>,
    restore: Option<JsonRestoreConfig>,
    log_file: Option<PathBuf>,
}

/// Application configuration: server parameters plus the optional per-operation
/// paths. Loaded from a JSON file, with the server fields overridable from the
/// environment (`MYSQL_HOST`, `MYSQL_PORT`, `MYSQL_USER`, `MYSQL_PASSWORD`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ConnectionParams,
    pub backup_destination: Option<PathBuf>,
    pub restore_sql_file: Option<PathBuf>,
    pub log_file: PathBuf,
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw: RawJsonConfig = serde_json::from_str(&config_content).with_context(|| {
            format!(
                "Failed to parse JSON from config file at {}",
                config_path.display()
            )
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawJsonConfig) -> Result<Self> {
        let mut server = raw.server;
        if let Ok(host) = env::var("MYSQL_HOST") {
            server.host = host;
        }
        if let Ok(port) = env::var("MYSQL_PORT") {
            server.port = port
                .parse()
                .context("MYSQL_PORT must be an integer in the range 1-65535")?;
        }
        if let Ok(user) = env::var("MYSQL_USER") {
            server.username = user;
        }
        if let Ok(password) = env::var("MYSQL_PASSWORD") {
            server.password = password;
        }
        server.validate()?;

        Ok(AppConfig {
            server,
            backup_destination: raw.backup.and_then(|b| b.destination_dir),
            restore_sql_file: raw.restore.and_then(|r| r.sql_file),
            log_file: raw
                .log_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create temp config");
        file.write_all(json.as_bytes()).expect("write temp config");
        file
    }

    #[test]
    fn loads_full_config() {
        let file = write_config(
            r#"{
                "server": {"host": "db.example", "port": 3307, "username": "root", "password": "x"},
                "backup": {"destination_dir": "/tmp/out"},
                "restore": {"sql_file": "restore.sql"},
                "log_file": "tool.log"
            }"#,
        );
        let config = AppConfig::load_from_json(file.path()).expect("config should parse");
        assert_eq!(config.server.host, "db.example");
        assert_eq!(config.server.port, 3307);
        assert_eq!(config.backup_destination, Some(PathBuf::from("/tmp/out")));
        assert_eq!(config.restore_sql_file, Some(PathBuf::from("restore.sql")));
        assert_eq!(config.log_file, PathBuf::from("tool.log"));
    }

    #[test]
    fn defaults_port_and_log_file() {
        let file = write_config(r#"{"server": {"host": "localhost", "username": "root"}}"#);
        let config = AppConfig::load_from_json(file.path()).expect("config should parse");
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.password, "");
        assert_eq!(config.log_file, PathBuf::from(DEFAULT_LOG_FILE));
        assert!(config.backup_destination.is_none());
    }

    #[test]
    fn rejects_port_zero() {
        let file = write_config(
            r#"{"server": {"host": "localhost", "port": 0, "username": "root"}}"#,
        );
        let err = AppConfig::load_from_json(file.path()).unwrap_err();
        assert!(err.to_string().contains("1-65535"));
    }

    #[test]
    fn rejects_empty_host() {
        let file = write_config(r#"{"server": {"host": " ", "username": "root"}}"#);
        assert!(AppConfig::load_from_json(file.path()).is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let params = ConnectionParams {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            username: "root".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{params:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
