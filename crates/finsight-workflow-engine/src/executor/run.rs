//! The run loop.
//!
//! Owns every scheduling decision for one session: barrier dispatch in
//! definition order, result persistence, context writes, skip propagation
//! past failed branches, cancellation draining, and the final session
//! status. Node tasks execute concurrently; all bookkeeping happens here,
//! on one task, so scheduling state needs no locks.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::context::ContextStore;
use crate::progress::ProgressEmitter;
use crate::runtime::SessionTracker;
use crate::traits::{GenerationBackend, QueryBackend};
use crate::types::{
    NodeError, NodeResult, NodeStatus, SessionFailure, SessionStatus, WorkflowDefinition,
};

use super::node::{spawn_node, NodeTaskArgs};
use super::schedule::ExecutionPlan;
use super::ExecutorConfig;

/// Everything one run needs, assembled by the engine facade.
pub(crate) struct RunParams {
    pub definition: Arc<WorkflowDefinition>,
    pub tracker: SessionTracker,
    pub input: Value,
    pub query: Arc<dyn QueryBackend>,
    pub generation: Arc<dyn GenerationBackend>,
    pub emitter: ProgressEmitter,
    pub config: Arc<ExecutorConfig>,
    pub cancel: CancellationToken,
}

/// Terminal state of a finished run, returned by `ExecutionHandle::wait`.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub session_id: String,
    pub status: SessionStatus,
    /// The earliest-dispatched real failure, if any.
    pub error: Option<SessionFailure>,
    /// Snapshot of the session context after the last write.
    pub context: BTreeMap<String, Value>,
}

/// Drive one session from `pending` to a terminal status.
///
/// Never returns an error: every fault is absorbed into the outcome and
/// the persisted records. The caller decides what a failed status means.
pub(crate) async fn drive_run(params: RunParams) -> RunOutcome {
    let RunParams {
        definition,
        tracker,
        input,
        query,
        generation,
        emitter,
        config,
        cancel,
    } = params;

    let session_id = tracker.session_id().to_string();
    let plan = ExecutionPlan::new(definition);
    let context = Arc::new(ContextStore::seeded(&input));

    tracker.started().await;
    emitter.session_started(&session_id, &plan.definition().id);
    tracing::info!(
        session_id = session_id.as_str(),
        workflow_id = plan.definition().id.as_str(),
        nodes = plan.definition().nodes.len(),
        "session started"
    );

    // `dispatched` holds every node that left pending, whatever it became;
    // `completed` only the successes that open downstream barriers.
    let mut dispatched: BTreeSet<String> = BTreeSet::new();
    let mut completed: BTreeSet<String> = BTreeSet::new();
    let mut outputs: BTreeMap<String, Value> = BTreeMap::new();
    let mut dispatch_seq: BTreeMap<String, usize> = BTreeMap::new();
    let mut next_seq = 0usize;
    let mut first_failure: Option<(usize, SessionFailure)> = None;
    let mut any_failed = false;
    let mut cancelled = false;

    let mut in_flight = FuturesUnordered::new();

    loop {
        if !cancelled {
            for node_id in plan.ready_nodes(&completed, &dispatched) {
                // Ready ids come from the definition, the lookup cannot miss.
                let Some(node) = plan.definition().node(&node_id).cloned() else {
                    continue;
                };
                dispatched.insert(node_id.clone());
                dispatch_seq.insert(node_id.clone(), next_seq);
                next_seq += 1;

                let bundle = plan.resolve_input(&node_id, &input, &outputs);
                let record = NodeResult::running(&node_id, bundle.clone());
                tracker.record_node_result(&record).await;
                emitter.node_state(&session_id, &node_id, NodeStatus::Running, None);
                tracing::debug!(
                    session_id = session_id.as_str(),
                    node_id = node_id.as_str(),
                    kind = node.kind.as_str(),
                    "node dispatched"
                );

                let handle = spawn_node(NodeTaskArgs {
                    session_id: session_id.clone(),
                    node,
                    input: bundle,
                    context: Arc::clone(&context),
                    query: Arc::clone(&query),
                    generation: Arc::clone(&generation),
                    cancel: cancel.clone(),
                    config: Arc::clone(&config),
                });
                // Keep the id next to the join so a panicked task can still
                // be attributed.
                in_flight.push(async move { (node_id, handle.await) });
            }
        }

        if in_flight.is_empty() {
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled(), if !cancelled => {
                cancelled = true;
                tracing::info!(
                    session_id = session_id.as_str(),
                    "cancellation requested, draining in-flight nodes"
                );
            }
            Some((node_id, joined)) = in_flight.next() => {
                let result = match joined {
                    Ok(result) => result,
                    Err(err) => {
                        tracing::error!(
                            session_id = session_id.as_str(),
                            node_id = node_id.as_str(),
                            error = %err,
                            "node task aborted"
                        );
                        NodeResult {
                            node_id: node_id.clone(),
                            status: NodeStatus::Failed,
                            input: None,
                            output: None,
                            error: Some(NodeError::Internal {
                                message: format!("node task aborted: {err}"),
                            }),
                            started_at: None,
                            completed_at: Some(Utc::now()),
                            execution_time_ms: None,
                            attempts: 1,
                            warnings: Vec::new(),
                        }
                    }
                };

                tracker.record_node_result(&result).await;
                emitter.node_state(&session_id, &node_id, result.status, result.error.clone());
                tracing::debug!(
                    session_id = session_id.as_str(),
                    node_id = node_id.as_str(),
                    status = %result.status,
                    "node finished"
                );

                if result.status == NodeStatus::Succeeded {
                    completed.insert(node_id.clone());
                    let output = result.output.clone().unwrap_or(Value::Null);
                    if let Some(node) = plan.definition().node(&node_id) {
                        if node.kind.writes_output() {
                            context.set(node.output_key(), output.clone());
                        }
                    }
                    outputs.insert(node_id, output);
                } else {
                    let cancelled_error = matches!(result.error, Some(NodeError::Cancelled));
                    if !cancelled_error {
                        any_failed = true;
                        if let Some(error) = &result.error {
                            let seq = dispatch_seq.get(&node_id).copied().unwrap_or(usize::MAX);
                            if first_failure.as_ref().map_or(true, |(s, _)| seq < *s) {
                                first_failure = Some((
                                    seq,
                                    SessionFailure {
                                        node_id: node_id.clone(),
                                        error: error.clone(),
                                    },
                                ));
                            }
                        }
                    }
                    if !cancelled {
                        // A failed barrier never opens; skip everything below
                        // it now so a fan-in does not wait on this branch.
                        for descendant in plan.descendants_of(&node_id) {
                            if dispatched.contains(&descendant) {
                                continue;
                            }
                            dispatched.insert(descendant.clone());
                            mark_skipped(&tracker, &emitter, &session_id, &descendant).await;
                        }
                    }
                }
            }
        }
    }

    // Whatever never left pending is unreachable now; close its records.
    let stragglers: Vec<String> = plan
        .definition()
        .nodes
        .iter()
        .filter(|node| !dispatched.contains(&node.id))
        .map(|node| node.id.clone())
        .collect();
    if !cancelled && !any_failed && !stragglers.is_empty() {
        // Validation rejects cycles, so reaching this is a scheduling bug.
        tracing::error!(
            session_id = session_id.as_str(),
            nodes = ?stragglers,
            "nodes never became ready, failing the session"
        );
    }
    for node_id in &stragglers {
        mark_skipped(&tracker, &emitter, &session_id, node_id).await;
    }

    let status = if cancelled {
        SessionStatus::Cancelled
    } else if any_failed || !stragglers.is_empty() {
        SessionStatus::Failed
    } else {
        SessionStatus::Completed
    };
    let error = first_failure.map(|(_, failure)| failure);

    tracker.finish(status, error.clone()).await;
    emitter.session_finished(&session_id, status, error.clone());
    tracing::info!(
        session_id = session_id.as_str(),
        status = ?status,
        "session finished"
    );

    RunOutcome {
        session_id,
        status,
        error,
        context: context.snapshot(),
    }
}

async fn mark_skipped(
    tracker: &SessionTracker,
    emitter: &ProgressEmitter,
    session_id: &str,
    node_id: &str,
) {
    let record = NodeResult::skipped(node_id);
    tracker.record_node_result(&record).await;
    emitter.node_state(session_id, node_id, NodeStatus::Skipped, None);
    tracing::debug!(session_id, node_id, "node skipped");
}
