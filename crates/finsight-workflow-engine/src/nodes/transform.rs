//! Built-in `transform` node executor.
//!
//! Pure data shaping, no I/O. The operation is selected by `op` in the
//! node config:
//!
//! ```json
//! { "op": "pick",       "path": "quotes.0.close_price", "default": 0 }
//! { "op": "project",    "fields": { "price": "close_price", "ts": "quoted_at" } }
//! { "op": "parse_json", "extract": "summary" }
//! { "op": "merge" }
//! ```
//!
//! Paths are dot-separated, descending through object keys and numeric
//! array indices. `project` substitutes `null` for missing paths;
//! `pick` without a `default` fails. `parse_json` copes with generation
//! replies that wrap JSON in prose or code fences by falling back to the
//! outermost brace span. `merge` flattens a fan-in bundle, splicing object
//! members and keeping scalars under their bundle key.
//!
//! Failures carry the offending input for diagnostics as
//! [`NodeError::Transform`].

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::node_ctx::NodeCtx;
use crate::types::NodeError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
enum TransformOp {
    Pick {
        path: String,
        #[serde(default)]
        default: Option<Value>,
    },
    Project {
        fields: BTreeMap<String, String>,
    },
    ParseJson {
        #[serde(default)]
        extract: Option<String>,
    },
    Merge,
}

pub async fn run(input: Value, config: &Value, _ctx: &NodeCtx) -> Result<Value, NodeError> {
    let op: TransformOp =
        serde_json::from_value(config.clone()).map_err(|e| NodeError::Validation {
            message: format!("transform config invalid: {e}"),
        })?;

    match op {
        TransformOp::Pick { path, default } => pick(&input, &path, default),
        TransformOp::Project { fields } => project(&input, &fields),
        TransformOp::ParseJson { extract } => parse_json(&input, extract.as_deref()),
        TransformOp::Merge => merge(&input),
    }
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn transform_error(message: impl Into<String>, input: &Value) -> NodeError {
    NodeError::Transform {
        message: message.into(),
        input: input.clone(),
    }
}

/// Descend a dot-separated path. An empty path addresses the whole value.
pub(crate) fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn pick(input: &Value, path: &str, default: Option<Value>) -> Result<Value, NodeError> {
    match lookup_path(input, path) {
        Some(value) => Ok(value.clone()),
        None => default
            .ok_or_else(|| transform_error(format!("path `{path}` not found in input"), input)),
    }
}

fn project(input: &Value, fields: &BTreeMap<String, String>) -> Result<Value, NodeError> {
    let mut out = Map::new();
    for (name, path) in fields {
        let value = lookup_path(input, path).cloned().unwrap_or(Value::Null);
        out.insert(name.clone(), value);
    }
    Ok(Value::Object(out))
}

fn parse_json(input: &Value, extract: Option<&str>) -> Result<Value, NodeError> {
    let text = input
        .as_str()
        .ok_or_else(|| transform_error("parse_json expects a string input", input))?;
    let parsed =
        parse_lenient(text).ok_or_else(|| transform_error("input is not valid JSON", input))?;
    match extract {
        None => Ok(parsed),
        Some(path) => lookup_path(&parsed, path).cloned().ok_or_else(|| {
            transform_error(format!("path `{path}` not found in parsed JSON"), input)
        }),
    }
}

/// Direct parse first, then the outermost `{...}` or `[...]` span.
fn parse_lenient(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text.trim()) {
        return Some(value);
    }
    let start = text.find(|c: char| c == '{' || c == '[')?;
    let close = if text.as_bytes()[start] == b'{' { '}' } else { ']' };
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn merge(input: &Value) -> Result<Value, NodeError> {
    let entries = input
        .as_object()
        .ok_or_else(|| transform_error("merge expects an object input", input))?;
    let mut out = Map::new();
    for (key, value) in entries {
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    out.insert(k.clone(), v.clone());
                }
            }
            other => {
                out.insert(key.clone(), other.clone());
            }
        }
    }
    Ok(Value::Object(out))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
