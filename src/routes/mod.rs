//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! JSON API routes for the connection form and the chat relay, with the
//! single-page UI served as static files at `/`.

pub mod chat;
pub mod connection;

use std::path::PathBuf;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

fn api_routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/connection", get(connection::status).post(connection::configure))
        .route("/api/connection/refresh", post(connection::refresh))
        .route("/api/chat", post(chat::send))
        .route("/api/chat/messages", get(chat::messages))
        .route("/api/chat/clear", post(chat::clear))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

/// Resolve the directory holding the chat UI assets.
#[must_use]
pub fn static_dir() -> PathBuf {
    std::env::var("STATIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("static"))
}

/// API routes plus the static UI, traced per request.
pub fn app(state: AppState, static_dir: PathBuf) -> Router {
    let ui = ServeDir::new(static_dir).append_index_html_on_directories(true);
    api_routes(state)
        .fallback_service(ui)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
