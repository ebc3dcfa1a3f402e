//! Progress event fan-out.
//!
//! The run loop emits [`ProgressEvent`]s through a bounded channel. A
//! spawned [`ProgressPump`] forwards each event to the configured
//! [`ProgressSink`] and to a broadcast channel for live subscribers.
//!
//! Delivery is advisory. A full channel drops the event, a failing sink is
//! logged and skipped, and the run loop never blocks on either. Node and
//! session outcomes are persisted through the session store, not here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::traits::ProgressSink;
use crate::types::{NodeError, NodeStatus, SessionFailure, SessionStatus};

/// A progress notification emitted during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
#[non_exhaustive]
pub enum ProgressEvent {
    SessionStarted {
        session_id: String,
        workflow_id: String,
        timestamp: DateTime<Utc>,
    },
    NodeStateChanged {
        session_id: String,
        node_id: String,
        status: NodeStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<NodeError>,
        timestamp: DateTime<Utc>,
    },
    SessionFinished {
        session_id: String,
        status: SessionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<SessionFailure>,
        timestamp: DateTime<Utc>,
    },
}

impl ProgressEvent {
    pub fn session_id(&self) -> &str {
        match self {
            ProgressEvent::SessionStarted { session_id, .. }
            | ProgressEvent::NodeStateChanged { session_id, .. }
            | ProgressEvent::SessionFinished { session_id, .. } => session_id,
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match self {
            ProgressEvent::NodeStateChanged { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressEmitter
// ---------------------------------------------------------------------------

/// Sending side of the progress channel. Cheap to clone.
///
/// [`ProgressEmitter::emit`] never blocks and never fails the caller: when
/// the channel is full the event is dropped with a debug log.
#[derive(Clone)]
pub struct ProgressEmitter {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ProgressEmitter {
    /// Create a bounded channel, returning the emitter and the receiving
    /// half for a [`ProgressPump`].
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn emit(&self, event: ProgressEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(ev)) => {
                tracing::debug!(
                    session_id = ev.session_id(),
                    "progress channel full, dropping event"
                );
            }
            // Pump already gone; the run is shutting down.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    pub fn session_started(&self, session_id: &str, workflow_id: &str) {
        self.emit(ProgressEvent::SessionStarted {
            session_id: session_id.to_string(),
            workflow_id: workflow_id.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn node_state(
        &self,
        session_id: &str,
        node_id: &str,
        status: NodeStatus,
        error: Option<NodeError>,
    ) {
        self.emit(ProgressEvent::NodeStateChanged {
            session_id: session_id.to_string(),
            node_id: node_id.to_string(),
            status,
            error,
            timestamp: Utc::now(),
        });
    }

    pub fn session_finished(
        &self,
        session_id: &str,
        status: SessionStatus,
        error: Option<SessionFailure>,
    ) {
        self.emit(ProgressEvent::SessionFinished {
            session_id: session_id.to_string(),
            status,
            error,
            timestamp: Utc::now(),
        });
    }
}

// ---------------------------------------------------------------------------
// ProgressPump
// ---------------------------------------------------------------------------

/// Forwards progress events from the run loop to the sink and to live
/// broadcast subscribers.
///
/// Construct via [`ProgressPump::new`], then call [`ProgressPump::spawn`].
/// The pump exits once every emitter clone has been dropped and the channel
/// is drained.
pub struct ProgressPump {
    rx: mpsc::Receiver<ProgressEvent>,
    sink: Arc<dyn ProgressSink>,
    broadcast_tx: broadcast::Sender<ProgressEvent>,
}

impl ProgressPump {
    pub fn new(
        rx: mpsc::Receiver<ProgressEvent>,
        sink: Arc<dyn ProgressSink>,
        broadcast_tx: broadcast::Sender<ProgressEvent>,
    ) -> Self {
        Self {
            rx,
            sink,
            broadcast_tx,
        }
    }

    /// Spawn the forwarding loop as a tokio task.
    pub fn spawn(self) -> ProgressPumpHandle {
        let join = tokio::spawn(pump_loop(self.rx, self.sink, self.broadcast_tx));
        ProgressPumpHandle { join }
    }
}

/// Handle to a running [`ProgressPump`].
pub struct ProgressPumpHandle {
    join: JoinHandle<()>,
}

impl ProgressPumpHandle {
    /// Wait until every buffered event has been forwarded.
    ///
    /// Drop all [`ProgressEmitter`] clones first, otherwise this waits
    /// indefinitely.
    pub async fn drained(self) {
        let _ = self.join.await;
    }
}

async fn pump_loop(
    mut rx: mpsc::Receiver<ProgressEvent>,
    sink: Arc<dyn ProgressSink>,
    broadcast_tx: broadcast::Sender<ProgressEvent>,
) {
    while let Some(event) = rx.recv().await {
        // No live subscribers is the common case, not an error.
        let _ = broadcast_tx.send(event.clone());
        if let Err(e) = sink.publish(event).await {
            tracing::warn!("progress sink publish failed: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
