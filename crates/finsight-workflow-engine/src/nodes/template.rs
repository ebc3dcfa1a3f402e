//! Built-in `template` node executor.
//!
//! Substitutes `{{placeholder}}` occurrences in the configured template
//! text. Config:
//!
//! ```json
//! { "template": "Daily brief for {{ticker}} on {{current_date}}: {{summary}}" }
//! ```
//!
//! Resolution order for a placeholder: keys of the input bundle when the
//! input is an object, then session context entries, then the derived
//! variables `current_date`, `current_time` and `current_datetime` (UTC).
//! A scalar input is addressable as `{{input}}`. An unresolved placeholder
//! renders as the empty string and is recorded as a warning on the node
//! result, not a failure.

use chrono::Utc;
use serde_json::Value;

use crate::node_ctx::NodeCtx;
use crate::types::NodeError;

pub async fn run(input: Value, config: &Value, ctx: &NodeCtx) -> Result<Value, NodeError> {
    let template = config
        .get("template")
        .and_then(|v| v.as_str())
        .ok_or_else(|| NodeError::Validation {
            message: "template node requires 'template' in config".into(),
        })?;
    Ok(Value::String(render(template, &input, ctx)))
}

// ---------------------------------------------------------------------------
// rendering
// ---------------------------------------------------------------------------

/// Scan for `{{ key }}` markers and substitute. An unclosed marker is kept
/// literally.
pub(crate) fn render(template: &str, input: &Value, ctx: &NodeCtx) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let key = after[..end].trim();
                match resolve(key, input, ctx) {
                    Some(value) => out.push_str(&render_value(&value)),
                    None => ctx.warn(format!(
                        "placeholder `{key}` not resolved, substituting empty string"
                    )),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve(key: &str, input: &Value, ctx: &NodeCtx) -> Option<Value> {
    if let Value::Object(map) = input {
        if let Some(value) = map.get(key) {
            return Some(value.clone());
        }
    } else if key == "input" && !input.is_null() {
        return Some(input.clone());
    }
    if let Some(value) = ctx.context_get(key) {
        return Some(value);
    }
    derived(key)
}

/// Well-known derived variables, all in UTC.
fn derived(key: &str) -> Option<Value> {
    let now = Utc::now();
    match key {
        "current_date" => Some(Value::String(now.format("%Y-%m-%d").to_string())),
        "current_time" => Some(Value::String(now.format("%H:%M:%S").to_string())),
        "current_datetime" => Some(Value::String(now.format("%Y-%m-%d %H:%M:%S").to_string())),
        _ => None,
    }
}

/// Render a value for text substitution. Strings are unquoted, composites
/// serialize compactly, null renders empty.
pub(crate) fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        composite => serde_json::to_string(composite).unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
