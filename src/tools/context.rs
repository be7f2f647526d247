//! Turn context
//!
//! Per-round scoped store for tool-call side effects. One context exists per
//! tool-calling round; handlers record metadata into it and the
//! round-complete hook reads it back. Writes from concurrent handlers are
//! serialized by the internal lock.

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Scoped key/value-list store for one tool-calling round.
///
/// Cloning produces another handle to the same round's data; the context is
/// superseded, not mutated, when the next round begins.
#[derive(Clone, Debug, Default)]
pub struct TurnContext {
    inner: Arc<Mutex<HashMap<String, Vec<Value>>>>,
}

impl TurnContext {
    /// Create an empty context for a new round
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the recorded values for `key`, or a copy of `default` if absent
    pub fn get(&self, key: &str, default: &[Value]) -> Vec<Value> {
        self.inner
            .lock()
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_vec())
    }

    /// Replace the list for `key` atomically; last writer wins
    pub fn set(&self, key: impl Into<String>, values: Vec<Value>) {
        self.inner.lock().insert(key.into(), values);
    }

    /// Append one value to the list for `key`, creating it if absent
    pub fn push(&self, key: impl Into<String>, value: Value) {
        self.inner.lock().entry(key.into()).or_default().push(value);
    }

    /// Whether any handler recorded anything this round
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Snapshot of everything recorded this round
    pub fn snapshot(&self) -> HashMap<String, Vec<Value>> {
        self.inner.lock().clone()
    }
}
