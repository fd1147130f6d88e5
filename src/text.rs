//! Flattening of upstream text fields.
//!
//! Text arrives either as `{"simpleText": "..."}` or as
//! `{"runs": [{"text": "..."}, ...]}`; every text-bearing field goes through
//! [`extract_simple_or_runs`].

use serde_json::Value;

use crate::path::{get, Selector};

/// Concatenates the `text` of every run, in order.
pub fn extract_runs(runs: &Value) -> String {
    runs.as_array()
        .map(|runs| {
            runs.iter()
                .filter_map(|run| run.get("text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

/// Prefers `simpleText`, falls back to `runs`, else empty.
pub fn extract_simple_or_runs(node: &Value) -> String {
    if let Some(text) = node.get("simpleText").and_then(Value::as_str) {
        return text.to_string();
    }
    node.get("runs").map(extract_runs).unwrap_or_default()
}

/// Like [`extract_simple_or_runs`] but also accepts a bare string or number,
/// and reports `None` when the node carries no text at all.
pub fn text_value(node: &Value) -> Option<String> {
    match node {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) if map.contains_key("simpleText") || map.contains_key("runs") => {
            Some(extract_simple_or_runs(node))
        }
        _ => None,
    }
}

pub fn text_at(doc: &Value, path: &[Selector<'_>]) -> Option<String> {
    get(doc, path).and_then(text_value)
}
