use super::*;

#[test]
fn exposes_four_sql_tools() {
    let names: Vec<String> = sql_tools().into_iter().map(|t| t.name).collect();
    assert_eq!(names, vec![LIST_TABLES, SCHEMA, QUERY, QUERY_CHECKER]);
}

#[test]
fn every_schema_is_an_object() {
    for tool in sql_tools() {
        assert_eq!(tool.input_schema["type"], "object", "{}", tool.name);
        assert!(tool.input_schema["properties"].is_object(), "{}", tool.name);
    }
}

#[test]
fn query_tools_require_query_argument() {
    for tool in sql_tools().into_iter().filter(|t| t.name == QUERY || t.name == QUERY_CHECKER) {
        assert_eq!(tool.input_schema["required"], serde_json::json!(["query"]));
    }
}

#[test]
fn schema_tool_requires_table_names() {
    let tool = sql_tools().into_iter().find(|t| t.name == SCHEMA).unwrap();
    assert_eq!(tool.input_schema["required"], serde_json::json!(["table_names"]));
    assert!(tool.description.contains(LIST_TABLES));
}
