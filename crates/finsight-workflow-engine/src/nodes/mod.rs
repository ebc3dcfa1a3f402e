//! Node executors, one per [`NodeKind`].
//!
//! Dispatch is a closed match over the kind enum. Unknown kinds cannot
//! reach this point: they are rejected when the definition is
//! deserialized. Every executor implements the same contract: take the
//! resolved input bundle and the node config, return an output value or a
//! [`NodeError`].

pub mod data_source;
pub mod markers;
pub mod output;
pub mod prompt;
pub mod template;
pub mod transform;

use serde_json::Value;

use crate::node_ctx::NodeCtx;
use crate::types::{NodeError, NodeKind};

/// Execute one node invocation.
///
/// Called by the run loop with a fresh [`NodeCtx`] per invocation. The
/// returned value is what the run loop writes to the context store under
/// the node's output key (`end` nodes excepted, they never write).
pub async fn run_node(
    kind: NodeKind,
    input: Value,
    config: &Value,
    ctx: &NodeCtx,
) -> Result<Value, NodeError> {
    match kind {
        NodeKind::DataSource => data_source::run(input, config, ctx).await,
        NodeKind::Transform => transform::run(input, config, ctx).await,
        NodeKind::Template => template::run(input, config, ctx).await,
        NodeKind::Prompt => prompt::run(input, config, ctx).await,
        NodeKind::Output => output::run(input, config, ctx).await,
        NodeKind::Start => markers::run_start(input),
        NodeKind::End => markers::run_end(input),
    }
}
