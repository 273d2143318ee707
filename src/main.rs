mod db;
mod error;
mod llm;
mod routes;
mod services;
mod state;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 3000;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port = services::env_parse("PORT", DEFAULT_PORT);

    // The LLM key is mandatory: nothing works without the agent.
    let llm = match llm::LlmClient::from_env() {
        Ok(client) => {
            tracing::info!(model = client.model(), "LLM client initialized");
            client
        }
        Err(e) => {
            tracing::error!(error = %e, "LLM client not configured");
            std::process::exit(1);
        }
    };

    let state = state::AppState::new(
        Arc::new(db::mysql::MySqlConnector),
        Arc::new(llm),
        services::agent::AgentSettings::from_env(),
        services::connection::ttl_from_env(),
    );

    // Spawn background session sweeper.
    let _sweeper = services::chat::spawn_session_sweeper(
        Arc::clone(&state.sessions),
        services::chat::session_idle_from_env(),
    );

    let static_dir = routes::static_dir();
    tracing::info!(static_dir = %static_dir.display(), "serving chat UI");
    let app = routes::app(state, static_dir);

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%port, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(%port, "sqlchat listening");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}
