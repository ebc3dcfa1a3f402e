//! Workflow graph schema, the contract between authoring and the engine.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{NodeKind, WORKFLOW_SCHEMA_VERSION};

/// The complete definition of a workflow graph.
///
/// **Invariant**: `metadata` uses `BTreeMap`, never `HashMap`. HashMap
/// produces nondeterministic JSON key ordering, which breaks snapshot
/// comparison across runs. Enforced by the type system.
///
/// A definition is loaded once per run and is immutable during execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkflowDefinition {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    pub id: String,
    pub name: String,
    /// Insertion order is meaningful: simultaneously ready nodes dispatch
    /// in this order.
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// Arbitrary metadata. BTreeMap for deterministic serialization.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_schema_version() -> u16 {
    WORKFLOW_SCHEMA_VERSION
}

impl WorkflowDefinition {
    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// A single step within a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Node {
    /// Unique within the definition.
    pub id: String,
    pub kind: NodeKind,
    /// Kind-specific configuration, deserialized by the kind's executor.
    /// The reserved fields `output_key`, `timeout_ms` and `retry` are read
    /// by the engine itself.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Canvas coordinates from the authoring UI. Ignored by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<(f64, f64)>,
}

impl Node {
    /// The context key this node's output is stored under: the reserved
    /// config field `output_key`, falling back to the node id.
    pub fn output_key(&self) -> &str {
        self.config
            .get("output_key")
            .and_then(|v| v.as_str())
            .unwrap_or(&self.id)
    }
}

/// A directed dependency between two nodes. The target cannot run until
/// the source has succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Edge {
    pub id: String,
    pub source_node: String,
    pub target_node: String,
}
