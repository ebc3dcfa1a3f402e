//! Built-in `output` node executor.
//!
//! Terminal formatting step. Forwards its input as the declared result,
//! optionally re-rendered:
//!
//! ```json
//! { "format": "raw" | "pretty" | "text" }
//! ```
//!
//! `raw` (the default) passes the value through unmodified, `pretty`
//! serializes it as indented JSON text, `text` coerces it to a plain
//! string.

use serde::Deserialize;
use serde_json::Value;

use crate::node_ctx::NodeCtx;
use crate::nodes::template;
use crate::types::NodeError;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum OutputFormat {
    #[default]
    Raw,
    Pretty,
    Text,
}

pub async fn run(input: Value, config: &Value, _ctx: &NodeCtx) -> Result<Value, NodeError> {
    let format = match config.get("format") {
        None => OutputFormat::Raw,
        Some(value) => {
            serde_json::from_value(value.clone()).map_err(|e| NodeError::Validation {
                message: format!("output config invalid: {e}"),
            })?
        }
    };

    match format {
        OutputFormat::Raw => Ok(input),
        OutputFormat::Pretty => {
            let rendered =
                serde_json::to_string_pretty(&input).map_err(|e| NodeError::Transform {
                    message: format!("failed to format output: {e}"),
                    input: input.clone(),
                })?;
            Ok(Value::String(rendered))
        }
        OutputFormat::Text => Ok(Value::String(template::render_value(&input))),
    }
}
