//! Google Gemini `generateContent` client.
//!
//! Gemini addresses tool results by function *name*, not call id, and
//! older models omit call ids entirely. We synthesize ids of the form
//! `<name>#<index>` when absent and recover names from earlier
//! `ToolUse` blocks when encoding results.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::config::LlmTimeouts;
use super::http::{build_client, endpoint, post_json};
use super::types::{ChatResponse, Content, ContentBlock, LlmError, Message, Tool};

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String, base_url: String, timeouts: LlmTimeouts) -> Result<Self, LlmError> {
        Ok(Self { http: build_client(timeouts)?, api_key, base_url })
    }

    pub async fn chat(
        &self,
        model: &str,
        max_tokens: u32,
        system: &str,
        messages: &[Message],
        tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, LlmError> {
        let request = self
            .http
            .post(endpoint(&self.base_url, &format!("models/{model}:generateContent")))
            .header("x-goog-api-key", &self.api_key);
        let body = build_request(max_tokens, system, messages, tools);
        let text = post_json("gemini", request, &body).await?;
        parse_response(&text, model)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Request {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    contents: Vec<WireContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTools>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Value>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct WireTools {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Serialize, Debug)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

fn declaration(tool: &Tool) -> FunctionDeclaration {
    // Gemini rejects OBJECT schemas with an empty `properties` map.
    let has_properties = tool
        .input_schema
        .get("properties")
        .and_then(Value::as_object)
        .is_some_and(|p| !p.is_empty());
    FunctionDeclaration {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters: has_properties.then(|| tool.input_schema.clone()),
    }
}

fn build_request(max_tokens: u32, system: &str, messages: &[Message], tools: Option<&[Tool]>) -> Request {
    let mut call_names: HashMap<&str, &str> = HashMap::new();
    let mut contents = Vec::new();

    for message in messages {
        let role = if message.role == "assistant" { "model" } else { "user" };
        let mut parts = Vec::new();
        match &message.content {
            Content::Text(text) => parts.push(serde_json::json!({ "text": text })),
            Content::Blocks(blocks) => {
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } if !text.is_empty() => {
                            parts.push(serde_json::json!({ "text": text }));
                        }
                        ContentBlock::ToolUse { id, name, input } => {
                            call_names.insert(id.as_str(), name.as_str());
                            parts.push(serde_json::json!({ "functionCall": { "name": name, "args": input } }));
                        }
                        ContentBlock::ToolResult { tool_use_id, content, .. } => {
                            let name = call_names
                                .get(tool_use_id.as_str())
                                .copied()
                                .unwrap_or_else(|| name_from_call_id(tool_use_id));
                            parts.push(serde_json::json!({
                                "functionResponse": { "name": name, "response": { "content": content } }
                            }));
                        }
                        _ => {}
                    }
                }
            }
        }
        if !parts.is_empty() {
            contents.push(WireContent { role: Some(role), parts });
        }
    }

    let system_instruction = (!system.trim().is_empty())
        .then(|| WireContent { role: None, parts: vec![serde_json::json!({ "text": system })] });
    let tools = tools
        .filter(|t| !t.is_empty())
        .map(|t| vec![WireTools { function_declarations: t.iter().map(declaration).collect() }])
        .unwrap_or_default();

    Request { system_instruction, contents, tools, generation_config: GenerationConfig { max_output_tokens: max_tokens } }
}

fn name_from_call_id(id: &str) -> &str {
    id.split_once('#').map_or(id, |(name, _)| name)
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

pub(crate) fn parse_response(json_text: &str, requested_model: &str) -> Result<ChatResponse, LlmError> {
    let root: Value = serde_json::from_str(json_text).map_err(|e| LlmError::ApiParse(e.to_string()))?;

    let Some(candidate) = root
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|arr| arr.first())
    else {
        let reason = root
            .get("promptFeedback")
            .and_then(|f| f.get("blockReason"))
            .and_then(Value::as_str)
            .unwrap_or("no candidates");
        return Err(LlmError::ApiParse(format!("gemini: {reason}")));
    };

    let finish_reason = candidate
        .get("finishReason")
        .and_then(Value::as_str)
        .unwrap_or("STOP");
    if finish_reason == "MALFORMED_FUNCTION_CALL" {
        return Err(LlmError::ApiParse("gemini: malformed function call".to_string()));
    }

    let mut content = Vec::new();
    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array);
    for (index, part) in parts.into_iter().flatten().enumerate() {
        if part.get("thought").and_then(Value::as_bool) == Some(true) {
            continue;
        }
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            if !text.is_empty() {
                content.push(ContentBlock::Text { text: text.to_string() });
            }
        } else if let Some(call) = part.get("functionCall") {
            let Some(name) = call.get("name").and_then(Value::as_str) else {
                return Err(LlmError::ApiParse("gemini: functionCall missing name".to_string()));
            };
            let id = call
                .get("id")
                .and_then(Value::as_str)
                .map_or_else(|| format!("{name}#{index}"), str::to_owned);
            let input = call
                .get("args")
                .cloned()
                .unwrap_or_else(|| Value::Object(serde_json::Map::default()));
            content.push(ContentBlock::ToolUse { id, name: name.to_string(), input });
        }
    }

    let stop_reason = if content
        .iter()
        .any(|block| matches!(block, ContentBlock::ToolUse { .. }))
    {
        "tool_use"
    } else if finish_reason == "MAX_TOKENS" {
        "max_tokens"
    } else {
        "end_turn"
    };

    let usage = |key: &str| {
        root.get("usageMetadata")
            .and_then(|u| u.get(key))
            .and_then(Value::as_u64)
            .unwrap_or(0)
    };
    let model = root
        .get("modelVersion")
        .and_then(Value::as_str)
        .unwrap_or(requested_model)
        .to_string();

    Ok(ChatResponse {
        content,
        model,
        stop_reason: stop_reason.to_string(),
        input_tokens: usage("promptTokenCount"),
        output_tokens: usage("candidatesTokenCount"),
    })
}

#[cfg(test)]
#[path = "gemini_test.rs"]
mod tests;
