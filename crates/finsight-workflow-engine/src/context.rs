//! Per-session run context: the key/value space bridging producer and
//! consumer nodes.
//!
//! One `ContextStore` exists per session and is shared into node
//! invocations behind an `Arc`. It is never process-wide state, so two
//! concurrent runs cannot interfere. Keys are write-once per run in
//! intent: the validator flags definitions where two nodes declare the
//! same output key, and a runtime overwrite falls back to last-writer-wins
//! with a warning.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde_json::Value;

/// Context key a non-object initial input is seeded under.
pub const INPUT_KEY: &str = "input";

/// Per-session key/value space.
///
/// Reads are always safe concurrently: a written key is immutable for the
/// run (overwrites are a flagged configuration hazard, not a supported
/// pattern). The coordinator is the only writer.
pub struct ContextStore {
    entries: RwLock<BTreeMap<String, Value>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Build a context seeded from the session's initial input: a JSON
    /// object seeds one entry per top-level key, anything else seeds the
    /// single key [`INPUT_KEY`].
    pub fn seeded(input: &Value) -> Self {
        let store = Self::new();
        match input {
            Value::Object(map) => {
                let mut entries = store.entries.write();
                for (k, v) in map {
                    entries.insert(k.clone(), v.clone());
                }
            }
            Value::Null => {}
            other => {
                store.entries.write().insert(INPUT_KEY.into(), other.clone());
            }
        }
        store
    }

    /// Fetch a value by key. `None` is a recoverable condition: consumers
    /// treat missing optional inputs as empty, and only fail when the
    /// input is required.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Write a key, returning the previous value when one existed. The
    /// value becomes visible to every node dispatched after this call.
    pub fn set(&self, key: &str, value: Value) -> Option<Value> {
        let prev = self.entries.write().insert(key.to_string(), value);
        if prev.is_some() {
            tracing::warn!(key, "context key overwritten, last writer wins");
        }
        prev
    }

    /// Deterministic copy of the whole space, for audit snapshots.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new()
    }
}
