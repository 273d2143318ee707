//! Connection routes — sidebar form submit, refresh, status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use crate::db::ConnectionConfig;
use crate::error::ApiError;
use crate::services::connection::{ConnectionError, ConnectionStatus};
use crate::state::AppState;

pub const REFRESHED: &str = "Database connection refreshed.";
pub const CONNECTED: &str = "Connected to the database.";

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> String {
    "3306".to_string()
}

/// Sidebar form fields. Host and port fall back to the form defaults when
/// absent; the rest default to empty and fail validation.
#[derive(Deserialize)]
pub struct ConnectionForm {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub database: String,
}

impl From<ConnectionForm> for ConnectionConfig {
    /// Whitespace around host, port, user and database is dropped; the
    /// password is taken verbatim.
    fn from(form: ConnectionForm) -> Self {
        Self {
            host: form.host.trim().to_string(),
            port: form.port.trim().to_string(),
            user: form.user.trim().to_string(),
            password: form.password,
            database: form.database.trim().to_string(),
        }
    }
}

#[derive(Serialize)]
pub struct ConnectionReply {
    pub message: &'static str,
    pub status: ConnectionStatus,
}

pub(crate) fn connection_error_to_status(err: &ConnectionError) -> StatusCode {
    match err {
        ConnectionError::MissingDetails => StatusCode::BAD_REQUEST,
        ConnectionError::ConnectFailed(_) => StatusCode::BAD_GATEWAY,
        ConnectionError::NotConfigured => StatusCode::CONFLICT,
    }
}

fn error_response(err: &ConnectionError) -> Response {
    ApiError::new(connection_error_to_status(err), err).into_response()
}

/// `GET /api/connection` — non-secret view of the connection slot.
pub async fn status(State(state): State<AppState>) -> Json<ConnectionStatus> {
    Json(state.connections.status().await)
}

/// `POST /api/connection` — validate the form and connect (or reuse).
pub async fn configure(State(state): State<AppState>, Json(form): Json<ConnectionForm>) -> Response {
    match state.connections.configure(form.into()).await {
        Ok(_) => {
            let status = state.connections.status().await;
            Json(ConnectionReply { message: CONNECTED, status }).into_response()
        }
        Err(e) => error_response(&e),
    }
}

/// `POST /api/connection/refresh` — drop the cached handle and reconnect.
pub async fn refresh(State(state): State<AppState>, Json(form): Json<ConnectionForm>) -> Response {
    match state.connections.refresh(form.into()).await {
        Ok(_) => {
            let status = state.connections.status().await;
            Json(ConnectionReply { message: REFRESHED, status }).into_response()
        }
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
