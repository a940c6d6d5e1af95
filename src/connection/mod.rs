use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::{Connection, Row};

use crate::config::ConnectionParams;
use crate::errors::ConnectionError;

/// In-process access to the MySQL server: database enumeration and the scoped
/// pre-flight check. The actual dump/restore traffic never goes through this
/// connection; it belongs to the external tools.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DatabaseServer: Send + Sync {
    /// Opens a connection, lists the databases the server reports (in the
    /// server's return order), and closes the connection before returning.
    async fn list_databases(
        &self,
        params: &ConnectionParams,
    ) -> Result<Vec<String>, ConnectionError>;

    /// Opens a connection bound to `database`, pings it, and closes it.
    /// Confirms the target is reachable before an external tool is spawned.
    async fn ping_database(
        &self,
        params: &ConnectionParams,
        database: &str,
    ) -> Result<(), ConnectionError>;
}

/// `DatabaseServer` backed by the sqlx MySQL driver.
pub struct MySqlServer;

impl MySqlServer {
    fn connect_options(params: &ConnectionParams) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.username)
            .password(&params.password)
    }
}

#[async_trait]
impl DatabaseServer for MySqlServer {
    async fn list_databases(
        &self,
        params: &ConnectionParams,
    ) -> Result<Vec<String>, ConnectionError> {
        let mut conn = MySqlConnection::connect_with(&Self::connect_options(params)).await?;
        let query_result = sqlx::query("SHOW DATABASES").fetch_all(&mut conn).await;
        let close_result = conn.close().await;

        let rows = query_result?;
        close_result?;

        rows.iter()
            .map(|row| row.try_get::<String, _>(0).map_err(ConnectionError::from))
            .collect()
    }

    async fn ping_database(
        &self,
        params: &ConnectionParams,
        database: &str,
    ) -> Result<(), ConnectionError> {
        let options = Self::connect_options(params).database(database);
        let mut conn = MySqlConnection::connect_with(&options).await?;
        let ping_result = conn.ping().await;
        let close_result = conn.close().await;

        ping_result?;
        close_result?;
        Ok(())
    }
}
