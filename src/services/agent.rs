//! SQL agent — natural-language request → tool calls → SQL → answer.
//!
//! DESIGN
//! ======
//! The agent gives the LLM four SQL tools (list tables, schema, query
//! checker, query) and loops: call the model, execute any tool calls
//! against the bound [`Database`], feed results back, until the model
//! answers in plain text or the iteration bound is hit.
//!
//! Malformed tool calls never abort the turn; they are answered with
//! [`INVALID_RESPONSE`] so the model can correct itself. A turn only fails
//! with [`AgentError::Parse`] when the provider response itself cannot be
//! parsed or the model twice returns nothing usable.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::env_parse;
use crate::db::Database;
use crate::error::ErrorCode;
use crate::llm::LlmChat;
use crate::llm::tools::{self, sql_tools};
use crate::llm::types::{ContentBlock, LlmError, Message, Tool, ToolCall};

/// Fixed instructions prepended to every agent system prompt.
pub const PREFIX: &str = "You are a highly skilled database assistant with full SQL privileges. \
Your primary function is to provide accurate, concise, and timely answers to user queries related to the database. \
You may execute SQL queries as needed, but the user should only see the final, processed results. \
Avoid displaying intermediate steps, unnecessary technical details, or sensitive information unless explicitly requested. \
If the user requests an update or change to the database, provide a clear and explicit confirmation statement before proceeding, \
including the scope of changes, potential effects, and any necessary warnings or caveats. \
Always prioritize data accuracy, integrity, security, and consistency in your responses, \
and adhere to best practices for data protection, backups, and recovery. ";

/// Observation returned to the model for a call it must redo.
pub const INVALID_RESPONSE: &str = "Invalid or incomplete response";
pub const ITERATION_LIMIT_ANSWER: &str = "Agent stopped due to iteration limit or time limit.";

const DEFAULT_AGENT_MAX_ITERATIONS: usize = 15;
const DEFAULT_AGENT_MAX_TOKENS: u32 = 2048;
const DEFAULT_AGENT_TOP_K: usize = 10;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The model's output could not be interpreted.
    #[error("{0}")]
    Parse(String),
    #[error("LLM error: {0}")]
    Llm(LlmError),
}

impl From<LlmError> for AgentError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::ApiParse(msg) => Self::Parse(format!("could not parse LLM output: {msg}")),
            other => Self::Llm(other),
        }
    }
}

impl ErrorCode for AgentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "E_AGENT_PARSE",
            Self::Llm(_) => "E_LLM_ERROR",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Llm(e) if e.retryable())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentSettings {
    pub max_iterations: usize,
    pub max_tokens: u32,
    /// Row limit the model is told to apply when the user names none.
    pub top_k: usize,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_AGENT_MAX_ITERATIONS,
            max_tokens: DEFAULT_AGENT_MAX_TOKENS,
            top_k: DEFAULT_AGENT_TOP_K,
        }
    }
}

impl AgentSettings {
    /// `AGENT_MAX_ITERATIONS`, `AGENT_MAX_TOKENS`, `AGENT_TOP_K`.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_iterations: env_parse("AGENT_MAX_ITERATIONS", defaults.max_iterations),
            max_tokens: env_parse("AGENT_MAX_TOKENS", defaults.max_tokens),
            top_k: env_parse("AGENT_TOP_K", defaults.top_k),
        }
    }
}

// =============================================================================
// AGENT
// =============================================================================

/// An agent bound to exactly one database handle.
pub struct SqlAgent {
    llm: Arc<dyn LlmChat>,
    database: Arc<dyn Database>,
    prefix: String,
    settings: AgentSettings,
    tools: Vec<Tool>,
}

impl SqlAgent {
    #[must_use]
    pub fn new(
        llm: Arc<dyn LlmChat>,
        database: Arc<dyn Database>,
        prefix: impl Into<String>,
        settings: AgentSettings,
    ) -> Self {
        Self { llm, database, prefix: prefix.into(), settings, tools: sql_tools() }
    }

    /// The handle this agent issues SQL against.
    #[must_use]
    pub fn database(&self) -> &Arc<dyn Database> {
        &self.database
    }

    /// Answer one natural-language request.
    ///
    /// # Errors
    ///
    /// [`AgentError::Parse`] when the model's output cannot be interpreted,
    /// [`AgentError::Llm`] for transport or provider failures.
    pub async fn run(&self, input: &str) -> Result<String, AgentError> {
        info!(input_len = input.len(), "agent: run");
        let system = self.system_prompt();
        let mut messages = vec![Message::user_text(input)];
        let mut empty_replies = 0;

        for iteration in 0..self.settings.max_iterations {
            let response = self
                .llm
                .chat(self.settings.max_tokens, &system, &messages, Some(&self.tools))
                .await?;

            info!(
                iteration,
                stop_reason = %response.stop_reason,
                input_tokens = response.input_tokens,
                output_tokens = response.output_tokens,
                "agent: LLM response"
            );

            let calls = response.tool_calls();
            if calls.is_empty() {
                if let Some(answer) = response.text() {
                    info!(iteration, answer_len = answer.len(), "agent: final answer");
                    return Ok(answer);
                }
                empty_replies += 1;
                warn!(iteration, empty_replies, "agent: empty reply");
                if empty_replies > 1 {
                    return Err(AgentError::Parse(
                        "could not parse LLM output: the model returned neither an answer nor a tool call"
                            .to_string(),
                    ));
                }
                messages.push(Message::user_text(format!(
                    "{INVALID_RESPONSE}. Call one of the tools or reply with the final answer."
                )));
                continue;
            }

            messages.push(Message::assistant_blocks(response.content));

            let mut results = Vec::with_capacity(calls.len());
            for call in &calls {
                info!(iteration, tool = %call.name, "agent: executing tool");
                let (content, is_error) = self.execute_tool(call).await?;
                if is_error {
                    warn!(iteration, tool = %call.name, "agent: tool error: {content}");
                }
                results.push(ContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content,
                    is_error: is_error.then_some(true),
                });
            }
            messages.push(Message::user_blocks(results));
        }

        warn!(max_iterations = self.settings.max_iterations, "agent: iteration limit reached");
        Ok(ITERATION_LIMIT_ANSWER.to_string())
    }

    pub(crate) fn system_prompt(&self) -> String {
        let dialect = self.database.dialect();
        let top_k = self.settings.top_k;
        format!(
            "{prefix}\n\n\
             You are interacting with a {dialect} database through the provided tools. Given a request, \
             find the relevant tables, inspect their schema, write a syntactically correct {dialect} query, \
             check it, run it, and answer from the results.\n\
             Unless the user asks for a specific number of rows, limit queries to at most {top_k} results. \
             Select only the columns you need. Never guess table or column names; look them up.\n\
             If a query fails, read the error, fix the query, and try again.\n\
             If the request is not about the database, answer it directly without tools.\n\
             Reply to the user in plain text once you have the answer.",
            prefix = self.prefix.trim_end(),
        )
    }

    /// Run one tool call. Returns the observation text and whether it is an
    /// error the model should correct. Only LLM failures inside the query
    /// checker abort the turn.
    async fn execute_tool(&self, call: &ToolCall) -> Result<(String, bool), AgentError> {
        let outcome = match call.name.as_str() {
            tools::LIST_TABLES => match self.database.list_tables().await {
                Ok(tables) => Ok(tables.join(", ")),
                Err(e) => Err(format!("Error: {e}")),
            },
            tools::SCHEMA => match string_arg(&call.input, "table_names") {
                Some(raw) => {
                    let tables = split_table_names(raw);
                    if tables.is_empty() {
                        Err(INVALID_RESPONSE.to_string())
                    } else {
                        self.database
                            .table_info(&tables)
                            .await
                            .map_err(|e| format!("Error: {e}"))
                    }
                }
                None => Err(INVALID_RESPONSE.to_string()),
            },
            tools::QUERY => match string_arg(&call.input, "query") {
                Some(query) => self
                    .database
                    .run(&clean_query(query))
                    .await
                    .map_err(|e| format!("Error: {e}")),
                None => Err(INVALID_RESPONSE.to_string()),
            },
            tools::QUERY_CHECKER => match string_arg(&call.input, "query") {
                Some(query) => Ok(self.check_query(&clean_query(query)).await?),
                None => Err(INVALID_RESPONSE.to_string()),
            },
            other => Err(format!("{other} is not a valid tool, try one of [{}].", self.tool_names())),
        };

        Ok(match outcome {
            Ok(text) => (text, false),
            Err(text) => (text, true),
        })
    }

    async fn check_query(&self, query: &str) -> Result<String, AgentError> {
        let dialect = self.database.dialect();
        let prompt = format!(
            "{query}\n\n\
             Double check the {dialect} query above for common mistakes, including:\n\
             - Using NOT IN with NULL values\n\
             - Using UNION when UNION ALL should have been used\n\
             - Using BETWEEN for exclusive ranges\n\
             - Data type mismatch in predicates\n\
             - Properly quoting identifiers\n\
             - Using the correct number of arguments for functions\n\
             - Casting to the correct data type\n\
             - Using the proper columns for joins\n\n\
             If there are any of the above mistakes, rewrite the query. If there are no mistakes, \
             just reproduce the original query.\n\n\
             Output the final SQL query only."
        );
        let response = self
            .llm
            .chat(self.settings.max_tokens, "You are a SQL expert.", &[Message::user_text(prompt)], None)
            .await?;
        Ok(response.text().map_or_else(|| query.to_string(), |text| clean_query(&text)))
    }

    fn tool_names(&self) -> String {
        self.tools
            .iter()
            .map(|t| t.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// =============================================================================
// ARGUMENT HELPERS
// =============================================================================

/// Read a non-blank string argument. Models sometimes pass the bare value
/// instead of an object; that is accepted as the argument too.
fn string_arg<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .or_else(|| input.as_str())
        .filter(|s| !s.trim().is_empty())
}

pub(crate) fn split_table_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().trim_matches('`').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Strip markdown code fences and surrounding whitespace from a query.
pub(crate) fn clean_query(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = body.strip_suffix("```").unwrap_or(body);
    let body = body
        .strip_prefix("sql")
        .or_else(|| body.strip_prefix("mysql"))
        .unwrap_or(body);
    body.trim().to_string()
}

#[cfg(test)]
#[path = "agent_test.rs"]
mod tests;
