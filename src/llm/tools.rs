//! SQL toolkit definitions exposed to the agent's LLM.

use super::types::Tool;

pub const LIST_TABLES: &str = "sql_db_list_tables";
pub const SCHEMA: &str = "sql_db_schema";
pub const QUERY: &str = "sql_db_query";
pub const QUERY_CHECKER: &str = "sql_db_query_checker";

/// Build the four SQL tools. Descriptions steer the model towards
/// list → schema → check → query.
#[must_use]
pub fn sql_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: LIST_TABLES.into(),
            description: "List the tables in the database as a comma-separated string. \
                          Call this first to learn which tables exist."
                .into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: SCHEMA.into(),
            description: format!(
                "Get the schema and sample rows for the specified tables. Be sure the tables exist \
                 by calling {LIST_TABLES} first."
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "table_names": {
                        "type": "string",
                        "description": "Comma-separated list of tables, e.g. \"customers, orders\""
                    }
                },
                "required": ["table_names"]
            }),
        },
        Tool {
            name: QUERY.into(),
            description: format!(
                "Execute a detailed and correct SQL query and get the result. If the query is not \
                 correct, an error message is returned; rewrite the query, check it, and try again. \
                 If you get an unknown column error, use {SCHEMA} to look up the correct columns."
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "A single MySQL statement" }
                },
                "required": ["query"]
            }),
        },
        Tool {
            name: QUERY_CHECKER.into(),
            description: format!(
                "Double-check whether a query is correct before executing it. Always use this \
                 before running a query with {QUERY}."
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The query to check" }
                },
                "required": ["query"]
            }),
        },
    ]
}

#[cfg(test)]
#[path = "tools_test.rs"]
mod tests;
