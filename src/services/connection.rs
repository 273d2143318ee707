//! Connection manager — credential-driven, TTL-cached database handle.
//!
//! DESIGN
//! ======
//! One process-wide slot holds the live handle together with the agent
//! built on it. A handle is reused only while the same five credential
//! fields are presented and the TTL has not lapsed; any rebuild replaces
//! handle and agent together, so an agent never outlives its handle.
//!
//! The slot sits behind an async mutex held across the connect call:
//! concurrent configure requests serialize and connect at most once.
//! Invalidation drops the handle but remembers the last config, so
//! `active` can transparently reconnect on the next chat turn.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::agent::{AgentSettings, PREFIX, SqlAgent};
use super::env_parse;
use crate::db::{ConnectionConfig, Connector, Database, DbError};
use crate::llm::LlmChat;

pub const DEFAULT_CONNECTION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// `CONNECTION_TTL_SECS`, defaulting to two hours.
#[must_use]
pub fn ttl_from_env() -> Duration {
    Duration::from_secs(env_parse("CONNECTION_TTL_SECS", DEFAULT_CONNECTION_TTL.as_secs()))
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Please provide all MySQL connection details.")]
    MissingDetails,
    #[error("Database connection failed: {0}")]
    ConnectFailed(DbError),
    #[error("No database connection configured.")]
    NotConfigured,
}

impl crate::error::ErrorCode for ConnectionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingDetails => "E_MISSING_DETAILS",
            Self::ConnectFailed(_) => "E_CONNECT_FAILED",
            Self::NotConfigured => "E_NOT_CONFIGURED",
        }
    }
}

/// A live handle plus the agent bound to it.
pub struct LiveConnection {
    pub config: ConnectionConfig,
    pub database: Arc<dyn Database>,
    pub agent: Arc<SqlAgent>,
    created_at: Instant,
}

impl LiveConnection {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() < ttl
    }

    /// Time left before this handle expires.
    #[must_use]
    pub fn expires_in(&self, ttl: Duration) -> Duration {
        ttl.saturating_sub(self.created_at.elapsed())
    }
}

/// Non-secret view of the slot for the UI.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub host: Option<String>,
    pub port: Option<String>,
    pub user: Option<String>,
    pub database: Option<String>,
    pub expires_in_secs: Option<u64>,
}

#[derive(Default)]
struct Slot {
    live: Option<Arc<LiveConnection>>,
    last_config: Option<ConnectionConfig>,
}

pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    llm: Arc<dyn LlmChat>,
    agent_settings: AgentSettings,
    ttl: Duration,
    slot: Mutex<Slot>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        llm: Arc<dyn LlmChat>,
        agent_settings: AgentSettings,
        ttl: Duration,
    ) -> Self {
        Self { connector, llm, agent_settings, ttl, slot: Mutex::new(Slot::default()) }
    }

    /// Return the cached connection for `config`, connecting if the slot is
    /// empty, expired, or holds a different config.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::MissingDetails`] if any field is blank (no connect
    /// is attempted); [`ConnectionError::ConnectFailed`] if the connect fails.
    pub async fn configure(&self, config: ConnectionConfig) -> Result<Arc<LiveConnection>, ConnectionError> {
        if !config.is_complete() {
            return Err(ConnectionError::MissingDetails);
        }

        let mut slot = self.slot.lock().await;
        if let Some(live) = &slot.live {
            if live.config == config && live.is_fresh(self.ttl) {
                return Ok(Arc::clone(live));
            }
        }
        self.rebuild(&mut slot, config).await
    }

    /// Drop the cached handle unconditionally; the next `configure` or
    /// `active` call reconnects regardless of TTL.
    pub async fn invalidate(&self) {
        let mut slot = self.slot.lock().await;
        if slot.live.take().is_some() {
            info!("connection: invalidated");
        }
    }

    /// Invalidate, then configure with `config`.
    ///
    /// # Errors
    ///
    /// Same as [`ConnectionManager::configure`].
    pub async fn refresh(&self, config: ConnectionConfig) -> Result<Arc<LiveConnection>, ConnectionError> {
        self.invalidate().await;
        self.configure(config).await
    }

    /// The connection chat turns should use, rebuilt from the last
    /// credentials that connected successfully when expired or invalidated.
    ///
    /// # Errors
    ///
    /// [`ConnectionError::NotConfigured`] if nothing was ever configured, or
    /// [`ConnectionError::ConnectFailed`] if the rebuild fails.
    pub async fn active(&self) -> Result<Arc<LiveConnection>, ConnectionError> {
        let mut slot = self.slot.lock().await;
        if let Some(live) = &slot.live {
            if live.is_fresh(self.ttl) {
                return Ok(Arc::clone(live));
            }
        }
        let config = slot.last_config.clone().ok_or(ConnectionError::NotConfigured)?;
        self.rebuild(&mut slot, config).await
    }

    pub async fn status(&self) -> ConnectionStatus {
        let slot = self.slot.lock().await;
        match slot.live.as_ref().filter(|live| live.is_fresh(self.ttl)) {
            Some(live) => ConnectionStatus {
                connected: true,
                host: Some(live.config.host.clone()),
                port: Some(live.config.port.clone()),
                user: Some(live.config.user.clone()),
                database: Some(live.config.database.clone()),
                expires_in_secs: Some(live.expires_in(self.ttl).as_secs()),
            },
            None => ConnectionStatus {
                connected: false,
                host: None,
                port: None,
                user: None,
                database: None,
                expires_in_secs: None,
            },
        }
    }

    async fn rebuild(&self, slot: &mut Slot, config: ConnectionConfig) -> Result<Arc<LiveConnection>, ConnectionError> {
        // The old handle is released before connecting so a failed rebuild
        // never leaves a stale agent reachable.
        slot.live = None;

        info!(host = %config.host, port = %config.port, user = %config.user, database = %config.database, "connection: connecting");
        let database = match self.connector.connect(&config).await {
            Ok(db) => db,
            Err(e) => {
                warn!(host = %config.host, database = %config.database, error = %e, "connection: connect failed");
                return Err(ConnectionError::ConnectFailed(e));
            }
        };

        let agent = Arc::new(SqlAgent::new(Arc::clone(&self.llm), Arc::clone(&database), PREFIX, self.agent_settings));
        let live = Arc::new(LiveConnection { config: config.clone(), database, agent, created_at: Instant::now() });
        slot.live = Some(Arc::clone(&live));
        slot.last_config = Some(config);
        Ok(live)
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
