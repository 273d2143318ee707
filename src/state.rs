//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the process-wide connection slot (handle + agent) and the map
//! of per-browser chat sessions.

use std::sync::Arc;
use std::time::Duration;

use crate::db::Connector;
use crate::llm::LlmChat;
use crate::services::agent::AgentSettings;
use crate::services::chat::SessionStore;
use crate::services::connection::ConnectionManager;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionManager>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        llm: Arc<dyn LlmChat>,
        agent_settings: AgentSettings,
        connection_ttl: Duration,
    ) -> Self {
        Self {
            connections: Arc::new(ConnectionManager::new(connector, llm, agent_settings, connection_ttl)),
            sessions: Arc::new(SessionStore::new()),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use crate::services::connection::DEFAULT_CONNECTION_TTL;

    /// `AppState` over mock seams: no live database or LLM.
    #[must_use]
    pub fn test_app_state(connector: Arc<dyn Connector>, llm: Arc<dyn LlmChat>) -> AppState {
        AppState::new(connector, llm, AgentSettings::default(), DEFAULT_CONNECTION_TTL)
    }
}
