use super::*;

fn cells(values: &[Option<&str>]) -> Vec<Option<String>> {
    values.iter().map(|v| v.map(str::to_string)).collect()
}

#[test]
fn render_rows_includes_header_and_nulls() {
    let columns = vec!["id".to_string(), "name".to_string(), "email".to_string()];
    let rows = vec![cells(&[Some("1"), Some("Alice"), None]), cells(&[Some("2"), Some("Bob"), Some("b@x.io")])];
    assert_eq!(render_rows(&columns, &rows), "id | name | email\n1 | Alice | NULL\n2 | Bob | b@x.io\n");
}

#[test]
fn long_values_are_truncated() {
    let long = "x".repeat(MAX_VALUE_CHARS + 50);
    let rendered = render_rows(&["note".to_string()], &[cells(&[Some(&long)])]);
    let line = rendered.lines().nth(1).unwrap();
    assert_eq!(line.chars().count(), MAX_VALUE_CHARS + 3);
    assert!(line.ends_with("..."));
}

#[test]
fn truncation_respects_char_boundaries() {
    let long = "é".repeat(MAX_VALUE_CHARS + 1);
    let out = truncate_value(&long);
    assert!(out.starts_with('é'));
    assert!(out.ends_with("..."));
}

#[test]
fn format_name_set_quotes_each_name() {
    assert_eq!(format_name_set(&["ghosts"]), "{'ghosts'}");
    assert_eq!(format_name_set(&["a", "b"]), "{'a', 'b'}");
}

#[test]
fn quote_ident_escapes_backticks() {
    assert_eq!(quote_ident("orders"), "`orders`");
    assert_eq!(quote_ident("we`ird"), "`we``ird`");
}
