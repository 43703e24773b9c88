/// Utility functions for building plan text.
/// Names generated here end up inside boolean expression text evaluated by the executor.

/// Replaces dots so a qualified name can stand as a single expression token.
pub fn expr_safe_name(name: &str) -> String {
    name.replace('.', "_")
}

/// Maps SQL comparison operators to the executor's expression syntax.
pub fn normalize_operator(op: &str) -> &str {
    match op {
        "=" => "==",
        "<>" | "!=" => "!=",
        other => other,
    }
}

/// `LEFT OUTER JOIN` -> `left`, bare `JOIN` -> `inner`.
pub fn join_kind(keyword: &str) -> String {
    match keyword.split_whitespace().next() {
        Some(word) if !word.eq_ignore_ascii_case("JOIN") => word.to_lowercase(),
        _ => "inner".to_string(),
    }
}
