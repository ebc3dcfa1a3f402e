//! Built-in `data_source` node executor.
//!
//! Issues a query through the configured [`QueryBackend`] and produces the
//! result rows as a JSON array. Config:
//!
//! ```json
//! {
//!   "connection": "warehouse",
//!   "query": "select close_price from quotes where ticker = ?",
//!   "params": [ { "from_context": "ticker" }, 30 ]
//! }
//! ```
//!
//! A param is either `{"from_context": "key"}`, resolved against the
//! session context at dispatch time, or any other JSON value passed through
//! literally. A missing context key fails the node with
//! [`NodeError::MissingRequiredInput`]. Backend errors surface as
//! [`NodeError::DataSource`] with the raw backend message; retry lives in
//! the run loop, not here.
//!
//! [`QueryBackend`]: crate::traits::QueryBackend

use serde::Deserialize;
use serde_json::Value;

use crate::node_ctx::NodeCtx;
use crate::types::NodeError;

#[derive(Debug, Deserialize)]
struct DataSourceConfig {
    connection: String,
    query: String,
    #[serde(default)]
    params: Vec<ParamSource>,
}

/// Order matters: the `from_context` form must be tried before the
/// catch-all literal.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ParamSource {
    FromContext { from_context: String },
    Literal(Value),
}

pub async fn run(_input: Value, config: &Value, ctx: &NodeCtx) -> Result<Value, NodeError> {
    let cfg: DataSourceConfig =
        serde_json::from_value(config.clone()).map_err(|e| NodeError::Validation {
            message: format!("data_source config invalid: {e}"),
        })?;

    let mut params = Vec::with_capacity(cfg.params.len());
    for param in &cfg.params {
        let value = match param {
            ParamSource::FromContext { from_context } => {
                ctx.context_get(from_context)
                    .ok_or_else(|| NodeError::MissingRequiredInput {
                        key: from_context.clone(),
                    })?
            }
            ParamSource::Literal(value) => value.clone(),
        };
        params.push(value);
    }

    let rows = ctx.run_query(&cfg.connection, &cfg.query, &params).await?;
    Ok(Value::Array(rows))
}
