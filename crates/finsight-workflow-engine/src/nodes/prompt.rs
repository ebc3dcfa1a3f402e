//! Built-in `prompt` node executor.
//!
//! Assembles a natural-language prompt and sends it through the configured
//! [`GenerationBackend`]. Config:
//!
//! ```json
//! {
//!   "prompt": "Summarize the moves of {{ticker}}: {{input}}",
//!   "model": "fin-analyst-large",
//!   "max_tokens": 1024,
//!   "temperature": 0.2
//! }
//! ```
//!
//! When `prompt` is present it is rendered with the same placeholder rules
//! as a `template` node. Otherwise the node's input is the prompt text,
//! serialized when it is not already a string. The reply is returned as an
//! opaque string. Parsing it is a downstream `transform` node's job.
//!
//! [`GenerationBackend`]: crate::traits::GenerationBackend

use serde_json::Value;

use crate::node_ctx::NodeCtx;
use crate::nodes::template;
use crate::traits::GenerationParams;
use crate::types::NodeError;

pub async fn run(input: Value, config: &Value, ctx: &NodeCtx) -> Result<Value, NodeError> {
    let params: GenerationParams =
        serde_json::from_value(config.clone()).map_err(|e| NodeError::Validation {
            message: format!("prompt config invalid: {e}"),
        })?;

    let prompt_text = match config.get("prompt").and_then(|v| v.as_str()) {
        Some(template_text) => template::render(template_text, &input, ctx),
        None if input.is_null() => {
            return Err(NodeError::MissingRequiredInput {
                key: "prompt".into(),
            });
        }
        None => template::render_value(&input),
    };

    let reply = ctx.generate(&prompt_text, &params).await?;
    Ok(Value::String(reply))
}
