//! Kernel state broadcast.
//!
//! State lives in a `watch` channel so late subscribers immediately see the
//! current value. Every actual change is also pushed on a `broadcast` channel
//! for consumers that need the full sequence of transitions.

use tokio::sync::{broadcast, watch};
use tracing::{debug, info};
use vcad_worker_protocol::{KernelKind, KernelState};

const TRANSITION_CAPACITY: usize = 64;

/// Multicast, replaying holder of one kernel's [`KernelState`].
///
/// Only the manager writes to it; any number of consumers read.
#[derive(Debug)]
pub struct StateBroadcaster {
    kind: KernelKind,
    current: watch::Sender<KernelState>,
    transitions: broadcast::Sender<KernelState>,
}

impl StateBroadcaster {
    /// Start in [`KernelState::Uninitialised`].
    pub fn new(kind: KernelKind) -> Self {
        let (current, _) = watch::channel(KernelState::Uninitialised);
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            kind,
            current,
            transitions,
        }
    }

    /// Receiver that starts with the current state.
    pub fn subscribe(&self) -> watch::Receiver<KernelState> {
        self.current.subscribe()
    }

    /// Receiver of every transition from now on.
    pub fn transitions(&self) -> broadcast::Receiver<KernelState> {
        self.transitions.subscribe()
    }

    /// The current state.
    pub fn current(&self) -> KernelState {
        *self.current.borrow()
    }

    /// Worker reported ready.
    ///
    /// The first time this always emits `Initialised`; then, like every later
    /// init signal, settles on whatever the pending count implies once at
    /// least one call has completed.
    pub fn on_init(&self, pending: usize, settled_any: bool) {
        if !self.current().is_initialised() {
            self.set(KernelState::Initialised);
        }
        if pending > 0 {
            self.set(KernelState::Computing);
        } else if settled_any {
            self.set(KernelState::Loaded);
        }
    }

    /// Worker reported it is executing something.
    pub fn on_busy(&self) {
        if self.current().is_initialised() {
            self.set(KernelState::Computing);
        } else {
            debug!(kernel = %self.kind, "busy signal before init, ignored");
        }
    }

    /// A call was registered; `pending` includes it.
    pub fn on_dispatch(&self, pending: usize) {
        if pending > 0 && self.current().is_initialised() {
            self.set(KernelState::Computing);
        }
    }

    /// A call left the table; `pending` is what remains.
    pub fn on_settled(&self, pending: usize) {
        if !self.current().is_initialised() {
            return;
        }
        if pending == 0 {
            self.set(KernelState::Loaded);
        } else {
            self.set(KernelState::Computing);
        }
    }

    /// A message arrived that settled nothing; undo a stale `Computing` left
    /// behind by a busy signal for a call no longer in the table.
    pub fn on_idle(&self, pending: usize) {
        if pending == 0 && self.current() == KernelState::Computing {
            self.set(KernelState::Loaded);
        }
    }

    fn set(&self, next: KernelState) {
        let previous = self.current.send_replace(next);
        if previous == next {
            return;
        }
        // No receivers is fine; the watch channel still holds the value.
        let _ = self.transitions.send(next);
        match next {
            KernelState::Initialised => info!(kernel = %self.kind, "kernel initialised"),
            _ => debug!(kernel = %self.kind, from = %previous, to = %next, "kernel state"),
        }
    }
}
