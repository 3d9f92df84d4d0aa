//! The single bidirectional channel between a manager and its worker.
//!
//! Messages are plain [`serde_json::Value`]s, the Rust stand-in for what a
//! browser worker would exchange through `postMessage`. Both directions are
//! unbounded: the manager never throttles calls and the worker never blocks
//! when posting replies.

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{ProtocolError, Result};

/// Main-thread end of a worker channel.
///
/// Built once per kernel and handed to the manager, which owns it for the
/// rest of the kernel's lifetime.
#[derive(Debug)]
pub struct Transport {
    outbound: mpsc::UnboundedSender<Value>,
    inbound: mpsc::UnboundedReceiver<Value>,
}

/// Worker end of a worker channel.
#[derive(Debug)]
pub struct WorkerEndpoint {
    inbound: mpsc::UnboundedReceiver<Value>,
    outbound: mpsc::UnboundedSender<Value>,
}

impl Transport {
    /// Create a connected manager/worker pair.
    pub fn pair() -> (Transport, WorkerEndpoint) {
        let (to_worker, from_manager) = mpsc::unbounded_channel();
        let (to_manager, from_worker) = mpsc::unbounded_channel();
        (
            Transport {
                outbound: to_worker,
                inbound: from_worker,
            },
            WorkerEndpoint {
                inbound: from_manager,
                outbound: to_manager,
            },
        )
    }

    /// Split into the outbound sender and the inbound receiver.
    pub fn into_parts(self) -> (mpsc::UnboundedSender<Value>, mpsc::UnboundedReceiver<Value>) {
        (self.outbound, self.inbound)
    }
}

impl WorkerEndpoint {
    /// Post a message to the manager.
    pub fn post(&self, message: Value) -> Result<()> {
        self.outbound
            .send(message)
            .map_err(|_| ProtocolError::ChannelClosed)
    }

    /// Wait for the next call envelope; `None` once the manager hung up.
    pub async fn recv(&mut self) -> Option<Value> {
        self.inbound.recv().await
    }

    /// Blocking variant of [`recv`](Self::recv) for worker OS threads.
    ///
    /// Must not be called from inside an async runtime.
    pub fn blocking_recv(&mut self) -> Option<Value> {
        self.inbound.blocking_recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_pair_carries_both_directions() {
        let (transport, mut worker) = Transport::pair();
        let (outbound, mut inbound) = transport.into_parts();

        outbound.send(json!({ "uid": "a" })).unwrap();
        assert_eq!(worker.recv().await, Some(json!({ "uid": "a" })));

        worker.post(json!("busy")).unwrap();
        assert_eq!(inbound.recv().await, Some(json!("busy")));
    }

    #[tokio::test]
    async fn test_post_after_manager_dropped_fails() {
        let (transport, mut worker) = Transport::pair();
        drop(transport);
        assert!(matches!(worker.post(json!("busy")), Err(ProtocolError::ChannelClosed)));
        assert_eq!(worker.recv().await, None);
    }
}
