use axum_extra::extract::cookie::Cookie;
use serde_json::json;

use super::*;
use crate::llm::tools;
use crate::llm::types::{ChatResponse, LlmError};
use crate::state::test_helpers::test_app_state;
use crate::test_support::{CountingConnector, MockLlm, body_json, shop_config, text_response, tool_response};

fn jar_for(id: Uuid) -> CookieJar {
    CookieJar::new().add(Cookie::new(SESSION_COOKIE, id.to_string()))
}

fn request(message: &str) -> Json<ChatRequest> {
    Json(ChatRequest { message: message.into() })
}

async fn connected_state(script: Vec<Result<ChatResponse, LlmError>>) -> AppState {
    let state = test_app_state(CountingConnector::new(), MockLlm::new(script));
    assert!(state.connections.configure(shop_config("secret")).await.is_ok());
    state
}

// =============================================================================
// session cookie
// =============================================================================

#[test]
fn session_id_mints_cookie_on_first_contact() {
    let (jar, id) = session_id(CookieJar::new());
    let cookie = jar.get(SESSION_COOKIE).unwrap();
    assert_eq!(cookie.value(), id.to_string());
    assert_eq!(cookie.http_only(), Some(true));
}

#[test]
fn session_id_reuses_valid_cookie() {
    let id = Uuid::new_v4();
    let (_, resolved) = session_id(jar_for(id));
    assert_eq!(resolved, id);
}

#[test]
fn session_id_replaces_garbage_cookie() {
    let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, "not-a-uuid"));
    let (jar, id) = session_id(jar);
    assert_eq!(jar.get(SESSION_COOKIE).unwrap().value(), id.to_string());
}

#[test]
fn chat_errors_map_to_statuses() {
    assert_eq!(chat_error_to_status(&ChatError::Busy), StatusCode::CONFLICT);
    assert_eq!(chat_error_to_status(&ChatError::EmptyInput), StatusCode::BAD_REQUEST);
    assert_eq!(
        chat_error_to_status(&ChatError::Agent(AgentError::Llm(LlmError::ApiRequest("timeout".into())))),
        StatusCode::BAD_GATEWAY
    );
    assert_eq!(chat_error_to_status(&ChatError::TurnAborted), StatusCode::INTERNAL_SERVER_ERROR);
}

// =============================================================================
// handlers
// =============================================================================

#[tokio::test]
async fn messages_returns_greeting_for_new_session() {
    let state = test_app_state(CountingConnector::new(), MockLlm::new(vec![]));
    let body = body_json(messages(State(state), jar_for(Uuid::new_v4())).await.into_response()).await;
    assert_eq!(body["messages"], json!([{ "role": "assistant", "content": crate::services::chat::GREETING }]));
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn send_without_connection_is_conflict() {
    let state = test_app_state(CountingConnector::new(), MockLlm::new(vec![]));
    let response = send(State(state), jar_for(Uuid::new_v4()), request("show me all customers")).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"]["code"], "E_NOT_CONFIGURED");
}

#[tokio::test]
async fn send_blank_message_is_bad_request() {
    let state = connected_state(vec![]).await;
    let id = Uuid::new_v4();
    let response = send(State(state.clone()), jar_for(id), request("   ")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.sessions.messages(id).await.len(), 1);
}

#[tokio::test]
async fn send_appends_user_and_assistant_messages() {
    let state = connected_state(vec![
        Ok(tool_response("c1", tools::QUERY, json!({ "query": "SELECT * FROM customers LIMIT 10" }))),
        Ok(text_response("Your customers are Ada and Grace.")),
    ])
    .await;
    let id = Uuid::new_v4();

    let response = send(State(state), jar_for(id), request("show me all customers")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1], json!({ "role": "user", "content": "show me all customers" }));
    assert_eq!(messages[2], json!({ "role": "assistant", "content": "Your customers are Ada and Grace." }));
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn parse_error_is_a_banner_not_a_failure() {
    let state = connected_state(vec![Err(LlmError::ApiParse("unexpected token".into()))]).await;
    let id = Uuid::new_v4();

    let response = send(State(state), jar_for(id), request("list orders")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Parsing error occurred: could not parse LLM output: unexpected token");
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    assert_eq!(body["messages"][1]["role"], "user");
}

#[tokio::test]
async fn other_agent_errors_are_bad_gateway() {
    let state = connected_state(vec![Err(LlmError::ApiResponse { status: 401, body: "bad key".into() })]).await;
    let id = Uuid::new_v4();

    let response = send(State(state.clone()), jar_for(id), request("list orders")).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"]["code"], "E_LLM_ERROR");
    assert_eq!(state.sessions.messages(id).await.len(), 2);
}

#[tokio::test]
async fn send_rebuilds_invalidated_connection() {
    let connector = CountingConnector::new();
    let state = test_app_state(connector.clone(), MockLlm::new(vec![Ok(text_response("hi"))]));
    assert!(state.connections.configure(shop_config("secret")).await.is_ok());
    state.connections.invalidate().await;

    let response = send(State(state), jar_for(Uuid::new_v4()), request("hello")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(connector.count(), 2);
}

#[tokio::test]
async fn clear_resets_transcript() {
    let state = connected_state(vec![Ok(text_response("answer"))]).await;
    let id = Uuid::new_v4();
    send(State(state.clone()), jar_for(id), request("question")).await;
    assert_eq!(state.sessions.messages(id).await.len(), 3);

    let response = clear(State(state.clone()), jar_for(id)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["messages"].as_array().unwrap().len(), 1);
    assert_eq!(state.sessions.messages(id).await.len(), 1);
}

#[tokio::test]
async fn sessions_do_not_leak_between_cookies() {
    let state = connected_state(vec![Ok(text_response("answer"))]).await;
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    send(State(state.clone()), jar_for(a), request("question")).await;

    assert_eq!(state.sessions.messages(a).await.len(), 3);
    assert_eq!(state.sessions.messages(b).await.len(), 1);
}
