//! Dispatch planning over a validated workflow graph.
//!
//! The plan is built once per run from the immutable definition and answers
//! three questions for the run loop: which nodes are ready, which nodes sit
//! downstream of a given node, and what input value a node receives.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use serde_json::Value;

use crate::types::{Edge, WorkflowDefinition};

/// Precomputed adjacency for one run.
///
/// Edge order inside each entry follows definition order, which keeps
/// fan-in bundles and dispatch order reproducible across runs.
pub(super) struct ExecutionPlan {
    def: Arc<WorkflowDefinition>,
    /// target node id -> incoming edges.
    incoming: BTreeMap<String, Vec<Edge>>,
    /// source node id -> target node ids.
    outgoing: BTreeMap<String, Vec<String>>,
}

impl ExecutionPlan {
    pub(super) fn new(def: Arc<WorkflowDefinition>) -> Self {
        let mut incoming: BTreeMap<String, Vec<Edge>> = BTreeMap::new();
        let mut outgoing: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for edge in &def.edges {
            incoming
                .entry(edge.target_node.clone())
                .or_default()
                .push(edge.clone());
            outgoing
                .entry(edge.source_node.clone())
                .or_default()
                .push(edge.target_node.clone());
        }
        Self {
            def,
            incoming,
            outgoing,
        }
    }

    pub(super) fn definition(&self) -> &WorkflowDefinition {
        &self.def
    }

    /// Nodes whose every upstream source has succeeded and which have not
    /// been dispatched yet, in definition order.
    ///
    /// `dispatched` must hold every node that has left `pending`, whatever
    /// it went on to become; otherwise a node could be returned twice.
    pub(super) fn ready_nodes(
        &self,
        completed: &BTreeSet<String>,
        dispatched: &BTreeSet<String>,
    ) -> Vec<String> {
        self.def
            .nodes
            .iter()
            .filter(|node| !dispatched.contains(&node.id))
            .filter(|node| match self.incoming.get(&node.id) {
                None => true,
                Some(edges) => edges.iter().all(|e| completed.contains(&e.source_node)),
            })
            .map(|node| node.id.clone())
            .collect()
    }

    /// Every node reachable from `node_id` by following edges forward,
    /// excluding `node_id` itself. Breadth-first order.
    pub(super) fn descendants_of(&self, node_id: &str) -> Vec<String> {
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(node_id.to_string());
        while let Some(current) = queue.pop_front() {
            if let Some(targets) = self.outgoing.get(&current) {
                for target in targets {
                    if seen.insert(target.clone()) {
                        order.push(target.clone());
                        queue.push_back(target.clone());
                    }
                }
            }
        }
        order
    }

    /// The input value a node receives: the session input for roots, the
    /// upstream output for a single incoming edge, and for fan-in an object
    /// keyed by the producing edge ids.
    ///
    /// `outputs` is keyed by node id. A ready node's sources always have an
    /// entry; the `Null` fallback covers sources like `end` whose output is
    /// itself null.
    pub(super) fn resolve_input(
        &self,
        node_id: &str,
        initial_input: &Value,
        outputs: &BTreeMap<String, Value>,
    ) -> Value {
        let edges = match self.incoming.get(node_id) {
            None => return initial_input.clone(),
            Some(edges) => edges,
        };
        if edges.len() == 1 {
            return outputs
                .get(&edges[0].source_node)
                .cloned()
                .unwrap_or(Value::Null);
        }
        let mut bundle = serde_json::Map::new();
        for edge in edges {
            let value = outputs
                .get(&edge.source_node)
                .cloned()
                .unwrap_or(Value::Null);
            bundle.insert(edge.id.clone(), value);
        }
        Value::Object(bundle)
    }
}
