//! Hand-written mocks of the crate's trait seams, shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::db::{ConnectionConfig, Connector, Database, DbError};
use crate::llm::types::{ChatResponse, ContentBlock, LlmChat, LlmError, Message, Tool};

// =============================================================================
// LLM
// =============================================================================

/// Replays scripted results in order; answers "done" once the script runs out.
pub struct MockLlm {
    script: Mutex<Vec<Result<ChatResponse, LlmError>>>,
    /// Every message list the agent sent, in call order.
    pub calls: Mutex<Vec<Vec<Message>>>,
    /// Every system prompt the agent sent, in call order.
    pub systems: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn new(script: Vec<Result<ChatResponse, LlmError>>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script), calls: Mutex::new(Vec::new()), systems: Mutex::new(Vec::new()) })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LlmChat for MockLlm {
    async fn chat(
        &self,
        _max_tokens: u32,
        system: &str,
        messages: &[Message],
        _tools: Option<&[Tool]>,
    ) -> Result<ChatResponse, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.systems.lock().unwrap().push(system.to_string());
        let mut script = self.script.lock().unwrap();
        if script.is_empty() { Ok(text_response("done")) } else { script.remove(0) }
    }
}

pub fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        content: vec![ContentBlock::Text { text: text.into() }],
        model: "mock".into(),
        stop_reason: "end_turn".into(),
        input_tokens: 1,
        output_tokens: 1,
    }
}

pub fn empty_response() -> ChatResponse {
    ChatResponse { content: Vec::new(), model: "mock".into(), stop_reason: "end_turn".into(), input_tokens: 1, output_tokens: 0 }
}

pub fn tool_response(id: &str, name: &str, input: serde_json::Value) -> ChatResponse {
    ChatResponse {
        content: vec![ContentBlock::ToolUse { id: id.into(), name: name.into(), input }],
        model: "mock".into(),
        stop_reason: "tool_use".into(),
        input_tokens: 1,
        output_tokens: 1,
    }
}

// =============================================================================
// DATABASE
// =============================================================================

/// In-memory stand-in: a fixed table list and canned query results.
pub struct MockDatabase {
    pub tables: Vec<String>,
    pub results: HashMap<String, Result<String, String>>,
    pub executed: Mutex<Vec<String>>,
}

impl MockDatabase {
    pub fn shop() -> Arc<Self> {
        let mut results = HashMap::new();
        results.insert("SELECT COUNT(*) FROM customers".to_string(), Ok("COUNT(*)\n12\n".to_string()));
        results.insert(
            "SELECT nme FROM customers".to_string(),
            Err("Unknown column 'nme' in 'field list'".to_string()),
        );
        Arc::new(Self {
            tables: vec!["customers".into(), "orders".into()],
            results,
            executed: Mutex::new(Vec::new()),
        })
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Database for MockDatabase {
    fn dialect(&self) -> &'static str {
        "mysql"
    }

    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        Ok(self.tables.clone())
    }

    async fn table_info(&self, tables: &[String]) -> Result<String, DbError> {
        let missing: Vec<&str> = tables
            .iter()
            .filter(|t| !self.tables.contains(t))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(DbError::UnknownTables(crate::db::mysql::format_name_set(&missing)));
        }
        Ok(tables
            .iter()
            .map(|t| format!("CREATE TABLE `{t}` (`id` int)"))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }

    async fn run(&self, sql: &str) -> Result<String, DbError> {
        self.executed.lock().unwrap().push(sql.to_string());
        match self.results.get(sql) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(e)) => Err(DbError::Query(e.clone())),
            None => Ok("Query returned no rows.".to_string()),
        }
    }
}

// =============================================================================
// CONNECTOR
// =============================================================================

/// Counts connection attempts; fails when `fail_with` is set.
#[derive(Default)]
pub struct CountingConnector {
    pub connects: AtomicUsize,
    pub fail_with: Option<String>,
    /// When set, only this password is refused.
    pub refused_password: Option<String>,
}

impl CountingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self { fail_with: Some(message.to_string()), ..Self::default() })
    }

    pub fn refusing(password: &str, message: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_with: Some(message.to_string()),
            refused_password: Some(password.to_string()),
            ..Self::default()
        })
    }

    pub fn count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for CountingConnector {
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Database>, DbError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.fail_with {
            if self.refused_password.as_ref().is_none_or(|p| *p == config.password) {
                return Err(DbError::Connect(message.clone()));
            }
        }
        Ok(MockDatabase::shop())
    }
}

pub fn shop_config(password: &str) -> ConnectionConfig {
    ConnectionConfig {
        host: "localhost".into(),
        port: "3306".into(),
        user: "root".into(),
        password: password.into(),
        database: "shop".into(),
    }
}

// =============================================================================
// HTTP
// =============================================================================

/// Read a handler response body as JSON.
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
