use super::*;
use crate::error::ErrorCode;

fn response(content: Vec<ContentBlock>) -> ChatResponse {
    ChatResponse { content, model: "mock".into(), stop_reason: "end_turn".into(), input_tokens: 0, output_tokens: 0 }
}

// =============================================================================
// LlmError
// =============================================================================

#[test]
fn error_codes_are_stable() {
    assert_eq!(LlmError::ConfigParse("x".into()).error_code(), "E_CONFIG_PARSE");
    assert_eq!(LlmError::MissingApiKey { var: "K".into() }.error_code(), "E_MISSING_API_KEY");
    assert_eq!(LlmError::ApiRequest("x".into()).error_code(), "E_API_REQUEST");
    assert_eq!(LlmError::ApiResponse { status: 400, body: String::new() }.error_code(), "E_API_RESPONSE");
    assert_eq!(LlmError::ApiParse("x".into()).error_code(), "E_API_PARSE");
    assert_eq!(LlmError::HttpClientBuild("x".into()).error_code(), "E_HTTP_CLIENT_BUILD");
}

#[test]
fn transient_failures_are_retryable() {
    assert!(LlmError::ApiRequest("conn refused".into()).retryable());
    assert!(LlmError::ApiResponse { status: 429, body: String::new() }.retryable());
    assert!(LlmError::ApiResponse { status: 503, body: String::new() }.retryable());
}

#[test]
fn client_errors_are_not_retryable() {
    assert!(!LlmError::ApiResponse { status: 401, body: String::new() }.retryable());
    assert!(!LlmError::ApiParse("json".into()).retryable());
    assert!(!LlmError::MissingApiKey { var: "GEMINI_API_KEY".into() }.retryable());
}

#[test]
fn missing_api_key_names_the_variable() {
    let err = LlmError::MissingApiKey { var: "GEMINI_API_KEY".into() };
    assert!(err.to_string().contains("GEMINI_API_KEY"));
}

// =============================================================================
// ContentBlock serde
// =============================================================================

#[test]
fn tool_use_block_uses_type_tag() {
    let block = ContentBlock::ToolUse {
        id: "call_1".into(),
        name: "sql_db_query".into(),
        input: serde_json::json!({ "query": "SELECT 1" }),
    };
    let value = serde_json::to_value(&block).unwrap();
    assert_eq!(value["type"], "tool_use");
    assert_eq!(value["input"]["query"], "SELECT 1");
}

#[test]
fn tool_result_omits_absent_error_flag() {
    let block = ContentBlock::ToolResult { tool_use_id: "call_1".into(), content: "ok".into(), is_error: None };
    let value = serde_json::to_value(&block).unwrap();
    assert!(value.get("is_error").is_none());
}

#[test]
fn unknown_block_type_deserializes_to_unknown() {
    let block: ContentBlock = serde_json::from_str(r#"{"type":"redacted_thinking","data":"x"}"#).unwrap();
    assert!(matches!(block, ContentBlock::Unknown));
}

#[test]
fn content_text_is_untagged_string() {
    let msg = Message::user_text("show me all customers");
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["role"], "user");
    assert_eq!(value["content"], "show me all customers");
}

// =============================================================================
// ChatResponse helpers
// =============================================================================

#[test]
fn text_joins_non_empty_text_blocks() {
    let resp = response(vec![
        ContentBlock::Text { text: "There are".into() },
        ContentBlock::Text { text: "   ".into() },
        ContentBlock::Text { text: "42 customers.".into() },
    ]);
    assert_eq!(resp.text().as_deref(), Some("There are\n42 customers."));
}

#[test]
fn text_is_none_for_tool_only_response() {
    let resp = response(vec![ContentBlock::ToolUse {
        id: "a".into(),
        name: "sql_db_list_tables".into(),
        input: serde_json::json!({}),
    }]);
    assert!(resp.text().is_none());
    assert_eq!(resp.tool_calls().len(), 1);
    assert_eq!(resp.tool_calls()[0].name, "sql_db_list_tables");
}
