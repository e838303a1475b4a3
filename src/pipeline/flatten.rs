//! Flattening: nested payload → ordered `path:value` pairs.
//!
//! Nested objects and arrays are walked depth-first. When a child is itself
//! a container, recursion restarts the prefix at the child's own key, so
//! `{"a":{"b":{"c":1}}}` yields `b_c` (not `a_b_c`). Arrays use their
//! integer indices as keys. A path seen twice keeps its first position and
//! takes the later value.
//!
//! `serde_json::Value` is a tree, so the only way to loop forever is a
//! pathological nesting depth. The walk is bounded by `max_depth` and fails
//! with [`FlattenError::CyclicPayload`] past it.

use crate::error::FlattenError;
use serde_json::{Map, Value};

/// Path used when the payload itself is a bare scalar.
const SCALAR_ROOT: &str = "value";

/// Ordered `(path, value)` pairs produced by [`flatten`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedRecord {
    entries: Map<String, Value>,
}

impl FlattenedRecord {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&Value> {
        self.entries.get(path)
    }

    /// Pairs in first-occurrence order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Newline-separated `path:value` lines.
    pub fn to_text(&self) -> String {
        self.iter()
            .map(|(path, value)| format!("{}:{}", normalize_path(path), render_scalar(value)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Flatten `value` under `prefix`.
pub fn flatten(prefix: &str, value: &Value, max_depth: usize) -> Result<FlattenedRecord, FlattenError> {
    let mut out = FlattenedRecord::default();
    if is_container(value) {
        flatten_into(prefix, value, 0, max_depth, &mut out.entries)?;
    } else {
        let path = if prefix.is_empty() { SCALAR_ROOT } else { prefix };
        out.entries.insert(normalize_path(path), value.clone());
    }
    Ok(out)
}

fn flatten_into(
    prefix: &str,
    value: &Value,
    depth: usize,
    max_depth: usize,
    out: &mut Map<String, Value>,
) -> Result<(), FlattenError> {
    for (key, child) in children(value) {
        if is_container(child) {
            if depth + 1 > max_depth {
                return Err(FlattenError::CyclicPayload {
                    max_depth,
                    path: join(prefix, &key),
                });
            }
            flatten_into(&key, child, depth + 1, max_depth, out)?;
        } else {
            out.insert(join(prefix, &key), child.clone());
        }
    }
    Ok(())
}

/// Flatten the payload and render it as newline-separated `path:value` lines.
pub fn format_as_text(payload: &Value, max_depth: usize) -> Result<String, FlattenError> {
    Ok(flatten("", payload, max_depth)?.to_text())
}

/// Render a leaf the way it reads in a text cell: strings unquoted, whole
/// floats without a trailing `.0`, `null` spelled out.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f == 0.0 => "0".to_string(),
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
                format!("{f:.0}")
            }
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn children(value: &Value) -> Vec<(String, &Value)> {
    match value {
        Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        normalize_path(key)
    } else {
        normalize_path(&format!("{prefix}_{key}"))
    }
}

fn normalize_path(path: &str) -> String {
    path.replace('.', "_")
}
