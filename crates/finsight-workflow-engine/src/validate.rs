//! Structural validation of workflow definitions.
//!
//! Validation runs before a session is created. Any [`ValidationError`]
//! means the run never starts; [`ValidationWarning`]s are advisory and
//! logged, the run proceeds.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::types::{Edge, WorkflowDefinition};

/// Fatal structural problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("duplicate node id: {node_id}")]
    DuplicateNodeId { node_id: String },
    #[error("duplicate edge id: {edge_id}")]
    DuplicateEdgeId { edge_id: String },
    #[error("edge {edge_id} references unknown node: {node_id}")]
    DanglingEdge { edge_id: String, node_id: String },
    #[error("cycle detected through node: {node_id}")]
    CycleDetected { node_id: String },
    #[error("workflow has no nodes")]
    EmptyWorkflow,
}

/// Advisory findings. The definition is suspect but runnable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationWarning {
    #[error("node {node_id} has no path from any entry node")]
    UnreachableNode { node_id: String },
    #[error("output key `{key}` is declared by both {first} and {second}, last writer wins")]
    DuplicateOutputKey {
        key: String,
        first: String,
        second: String,
    },
}

/// Outcome of validating a definition.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    /// True when the definition may run. Warnings do not block.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a definition for structural correctness.
///
/// Findings are reported in definition order, so the output is stable for
/// a given input.
pub fn validate_workflow(def: &WorkflowDefinition) -> ValidationReport {
    let mut report = ValidationReport::default();

    if def.nodes.is_empty() {
        report.errors.push(ValidationError::EmptyWorkflow);
    }

    // Duplicate node ids.
    let mut seen_nodes = HashSet::new();
    for node in &def.nodes {
        if !seen_nodes.insert(node.id.as_str()) {
            report.errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }

    // Edge endpoints must exist; edge ids must be unique.
    let node_ids: HashSet<&str> = def.nodes.iter().map(|n| n.id.as_str()).collect();
    let mut seen_edges = HashSet::new();
    for edge in &def.edges {
        if !seen_edges.insert(edge.id.as_str()) {
            report.errors.push(ValidationError::DuplicateEdgeId {
                edge_id: edge.id.clone(),
            });
        }
        for endpoint in [&edge.source_node, &edge.target_node] {
            if !node_ids.contains(endpoint.as_str()) {
                report.errors.push(ValidationError::DanglingEdge {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }

    // The edge-induced graph must be acyclic.
    for node_id in find_cycle_nodes(def) {
        report
            .errors
            .push(ValidationError::CycleDetected { node_id });
    }

    // Reachability from entry nodes (zero incoming edges).
    for node_id in find_unreachable(def) {
        report
            .warnings
            .push(ValidationWarning::UnreachableNode { node_id });
    }

    // Output-key collisions: last writer wins at runtime, flagged here.
    let mut keys: HashMap<&str, &str> = HashMap::new();
    for node in def.nodes.iter().filter(|n| n.kind.writes_output()) {
        let key = node.output_key();
        match keys.get(key) {
            Some(first) => report.warnings.push(ValidationWarning::DuplicateOutputKey {
                key: key.to_string(),
                first: (*first).to_string(),
                second: node.id.clone(),
            }),
            None => {
                keys.insert(key, node.id.as_str());
            }
        }
    }

    report
}

/// Nodes at the head of a back edge, in definition order. Empty for a DAG.
fn find_cycle_nodes(def: &WorkflowDefinition) -> Vec<String> {
    let outgoing = outgoing_by_source(def);

    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();
    let mut cycle_nodes = Vec::new();
    for node in &def.nodes {
        if !visited.contains(node.id.as_str()) {
            dfs(
                &node.id,
                &outgoing,
                &mut visited,
                &mut in_stack,
                &mut cycle_nodes,
            );
        }
    }
    cycle_nodes
}

fn dfs(
    node: &str,
    outgoing: &HashMap<&str, Vec<&Edge>>,
    visited: &mut HashSet<String>,
    in_stack: &mut HashSet<String>,
    cycle_nodes: &mut Vec<String>,
) {
    if visited.contains(node) {
        return;
    }
    visited.insert(node.to_string());
    in_stack.insert(node.to_string());

    if let Some(edges) = outgoing.get(node) {
        for edge in edges {
            if in_stack.contains(edge.target_node.as_str()) {
                if !cycle_nodes.contains(&edge.target_node) {
                    cycle_nodes.push(edge.target_node.clone());
                }
            } else if !visited.contains(edge.target_node.as_str()) {
                dfs(&edge.target_node, outgoing, visited, in_stack, cycle_nodes);
            }
        }
    }

    in_stack.remove(node);
}

/// Nodes with no path from any zero-in-degree entry, in definition order.
fn find_unreachable(def: &WorkflowDefinition) -> Vec<String> {
    let outgoing = outgoing_by_source(def);
    let has_incoming: HashSet<&str> = def.edges.iter().map(|e| e.target_node.as_str()).collect();

    let mut reached: HashSet<&str> = HashSet::new();
    let mut frontier: Vec<&str> = def
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| !has_incoming.contains(id))
        .collect();
    reached.extend(frontier.iter().copied());

    while let Some(id) = frontier.pop() {
        if let Some(edges) = outgoing.get(id) {
            for edge in edges {
                if reached.insert(edge.target_node.as_str()) {
                    frontier.push(edge.target_node.as_str());
                }
            }
        }
    }

    def.nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| !reached.contains(id))
        .map(str::to_string)
        .collect()
}

fn outgoing_by_source(def: &WorkflowDefinition) -> HashMap<&str, Vec<&Edge>> {
    let mut outgoing: HashMap<&str, Vec<&Edge>> = HashMap::new();
    for edge in &def.edges {
        outgoing
            .entry(edge.source_node.as_str())
            .or_default()
            .push(edge);
    }
    outgoing
}
