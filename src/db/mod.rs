//! Database handles: credential model, URL building, and the narrow
//! query surface the SQL agent needs.
//!
//! SYSTEM CONTEXT
//! ==============
//! The connection manager turns a [`ConnectionConfig`] into a live handle
//! through a [`Connector`]; the agent only ever sees the [`Database`] trait.
//! Both traits exist so connection caching and the agent loop can be tested
//! without a MySQL server.

pub mod mysql;

use std::sync::Arc;

use serde::Deserialize;

pub const URL_SCHEME: &str = "mysql";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("{0}")]
    Connect(String),
    #[error("{0}")]
    Query(String),
    #[error("table_names {0} not found in database")]
    UnknownTables(String),
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        Self::Query(e.to_string())
    }
}

impl crate::error::ErrorCode for DbError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Connect(_) => "E_DB_CONNECT",
            Self::Query(_) => "E_DB_QUERY",
            Self::UnknownTables(_) => "E_DB_UNKNOWN_TABLES",
        }
    }
}

// =============================================================================
// CONNECTION CONFIG
// =============================================================================

/// The five credential fields collected from the sidebar form.
///
/// Identity is the exact tuple of fields; the cached connection is reused
/// only while an identical config is presented.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

impl ConnectionConfig {
    /// `true` when every field is non-blank.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        [&self.host, &self.port, &self.user, &self.password, &self.database]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    /// `mysql://<user>:<password>@<host>:<port>/<database>` with the password
    /// percent-encoded.
    #[must_use]
    pub fn url(&self) -> String {
        format!(
            "{URL_SCHEME}://{}:{}@{}:{}/{}",
            self.user,
            urlencoding::encode(&self.password),
            self.host,
            self.port,
            self.database
        )
    }
}

// =============================================================================
// TRAITS
// =============================================================================

/// Query surface used by the SQL agent's tools.
#[async_trait::async_trait]
pub trait Database: Send + Sync {
    /// SQL dialect name shown to the model.
    fn dialect(&self) -> &'static str;

    async fn list_tables(&self) -> Result<Vec<String>, DbError>;

    /// DDL plus sample rows for each requested table.
    ///
    /// # Errors
    ///
    /// [`DbError::UnknownTables`] if any name is not a table in the database.
    async fn table_info(&self, tables: &[String]) -> Result<String, DbError>;

    /// Execute one statement and render its rows as text.
    async fn run(&self, sql: &str) -> Result<String, DbError>;
}

/// Opens a [`Database`] handle from a connection URL.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Database>, DbError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
