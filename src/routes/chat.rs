//! Chat routes — transcript fetch, one relay turn, clear.
//!
//! Each browser is tied to its transcript by the `sqlchat_session` cookie,
//! issued on first contact.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::connection::connection_error_to_status;
use crate::error::ApiError;
use crate::services::agent::AgentError;
use crate::services::chat::{ChatError, ChatMessage, QueryAnswerer, TurnOutcome};
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "sqlchat_session";

/// Resolve the caller's chat session, minting a cookie when absent or
/// unparseable.
pub(crate) fn session_id(jar: CookieJar) -> (CookieJar, Uuid) {
    if let Some(id) = jar
        .get(SESSION_COOKIE)
        .and_then(|c| Uuid::parse_str(c.value()).ok())
    {
        return (jar, id);
    }
    let id = Uuid::new_v4();
    let cookie = Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    (jar.add(cookie), id)
}

pub(crate) fn chat_error_to_status(err: &ChatError) -> StatusCode {
    match err {
        ChatError::Busy => StatusCode::CONFLICT,
        ChatError::EmptyInput => StatusCode::BAD_REQUEST,
        ChatError::Agent(AgentError::Parse(_) | AgentError::Llm(_)) => StatusCode::BAD_GATEWAY,
        ChatError::TurnAborted => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Serialize)]
pub struct TranscriptReply {
    pub messages: Vec<ChatMessage>,
    /// Banner text for a recovered turn failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// `GET /api/chat/messages`
pub async fn messages(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let (jar, id) = session_id(jar);
    let messages = state.sessions.messages(id).await;
    (jar, Json(TranscriptReply { messages, error: None }))
}

/// `POST /api/chat` — relay one message to the agent bound to the live
/// connection.
pub async fn send(State(state): State<AppState>, jar: CookieJar, Json(body): Json<ChatRequest>) -> Response {
    let (jar, id) = session_id(jar);
    if body.message.trim().is_empty() {
        let err = ChatError::EmptyInput;
        return (jar, ApiError::new(chat_error_to_status(&err), &err)).into_response();
    }

    let live = match state.connections.active().await {
        Ok(live) => live,
        Err(e) => return (jar, ApiError::new(connection_error_to_status(&e), &e)).into_response(),
    };

    let agent: Arc<dyn QueryAnswerer> = live.agent.clone();
    match state.sessions.relay_turn(id, agent, &body.message).await {
        Ok(reply) => {
            let error = match reply.outcome {
                TurnOutcome::Answered(_) => None,
                TurnOutcome::ParseFailed(banner) => Some(banner),
            };
            (jar, Json(TranscriptReply { messages: reply.messages, error })).into_response()
        }
        Err(e) => (jar, ApiError::new(chat_error_to_status(&e), &e)).into_response(),
    }
}

/// `POST /api/chat/clear` — reset the transcript to the greeting.
pub async fn clear(State(state): State<AppState>, jar: CookieJar) -> Response {
    let (jar, id) = session_id(jar);
    match state.sessions.clear(id).await {
        Ok(messages) => (jar, Json(TranscriptReply { messages, error: None })).into_response(),
        Err(e) => (jar, ApiError::new(chat_error_to_status(&e), &e)).into_response(),
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
