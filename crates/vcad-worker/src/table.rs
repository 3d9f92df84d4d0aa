//! Pending-call bookkeeping.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;
use vcad_worker_protocol::CorrelationId;

use crate::error::{KernelError, Result};

/// One in-flight call waiting for its reply.
///
/// Settling consumes the entry, so a call can only be resolved or rejected
/// once.
#[derive(Debug)]
pub struct PendingCall {
    function_name: String,
    responder: oneshot::Sender<Result<Value>>,
}

impl PendingCall {
    /// Create a pending call answered through `responder`.
    pub fn new(function_name: impl Into<String>, responder: oneshot::Sender<Result<Value>>) -> Self {
        Self {
            function_name: function_name.into(),
            responder,
        }
    }

    /// Name of the called kernel function.
    pub fn function_name(&self) -> &str {
        &self.function_name
    }

    /// Deliver a successful result.
    pub fn resolve(self, value: Value) {
        // The caller may have stopped waiting; nothing to do then.
        let _ = self.responder.send(Ok(value));
    }

    /// Deliver a failure.
    pub fn reject(self, error: KernelError) {
        let _ = self.responder.send(Err(error));
    }
}

/// Map from correlation id to the call awaiting it.
///
/// Its length is always the number of dispatched but unsettled calls.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: HashMap<CorrelationId, PendingCall>,
}

impl CorrelationTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending call. Returns `false` (and keeps the existing entry)
    /// if `uid` is already pending.
    pub fn insert(&mut self, uid: CorrelationId, call: PendingCall) -> bool {
        use std::collections::hash_map::Entry;
        match self.pending.entry(uid) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(call);
                true
            }
        }
    }

    /// Remove and return the call for `uid`.
    pub fn remove(&mut self, uid: &CorrelationId) -> Option<PendingCall> {
        self.pending.remove(uid)
    }

    /// Whether `uid` is pending.
    pub fn contains(&self, uid: &CorrelationId) -> bool {
        self.pending.contains_key(uid)
    }

    /// Number of pending calls.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no call is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove every pending call, leaving the table empty.
    pub fn drain(&mut self) -> Vec<(CorrelationId, PendingCall)> {
        self.pending.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pending(name: &str) -> (PendingCall, oneshot::Receiver<Result<Value>>) {
        let (tx, rx) = oneshot::channel();
        (PendingCall::new(name, tx), rx)
    }

    #[test]
    fn test_insert_and_remove() {
        let mut table = CorrelationTable::new();
        let (call, mut rx) = pending("shapes.solid.createBox");
        assert!(table.insert("u1".into(), call));
        assert_eq!(table.len(), 1);

        let call = table.remove(&"u1".into()).unwrap();
        assert_eq!(call.function_name(), "shapes.solid.createBox");
        call.resolve(json!(1));
        assert!(table.is_empty());
        assert_eq!(rx.try_recv().unwrap().unwrap(), json!(1));

        assert!(table.remove(&"u1".into()).is_none());
    }

    #[test]
    fn test_duplicate_uid_is_refused() {
        let mut table = CorrelationTable::new();
        let (first, _rx1) = pending("a");
        let (second, _rx2) = pending("b");
        assert!(table.insert("u1".into(), first));
        assert!(!table.insert("u1".into(), second));
        assert_eq!(table.remove(&"u1".into()).unwrap().function_name(), "a");
    }

    #[test]
    fn test_reject_delivers_error() {
        let (call, mut rx) = pending("a");
        call.reject(KernelError::TransportClosed);
        assert!(matches!(rx.try_recv().unwrap(), Err(KernelError::TransportClosed)));
    }

    #[test]
    fn test_drain_empties_table() {
        let mut table = CorrelationTable::new();
        for uid in ["u1", "u2", "u3"] {
            let (call, _rx) = pending(uid);
            table.insert(uid.into(), call);
        }
        assert_eq!(table.drain().len(), 3);
        assert!(table.is_empty());
    }
}
