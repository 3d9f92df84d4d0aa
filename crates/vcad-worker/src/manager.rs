//! The kernel manager and its dispatcher.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error};
use vcad_worker_protocol::{CorrelationId, KernelKind, KernelState, OutboundEnvelope, Transport};

use crate::config::ManagerConfig;
use crate::error::{KernelError, Result};
use crate::router;
use crate::state::StateBroadcaster;
use crate::table::{CorrelationTable, PendingCall};

/// Out-of-band sink for call-level and protocol errors.
pub type ErrorCallback = Arc<dyn Fn(&KernelError) + Send + Sync>;

/// State guarded together so table size and kernel state never disagree.
#[derive(Debug, Default)]
pub(crate) struct Core {
    pub(crate) table: CorrelationTable,
    pub(crate) settled_any: bool,
    /// Calls abandoned by the call timeout whose reply may still arrive.
    pub(crate) expired: HashSet<CorrelationId>,
}

pub(crate) struct Shared {
    pub(crate) kind: KernelKind,
    pub(crate) config: ManagerConfig,
    pub(crate) state: StateBroadcaster,
    core: Mutex<Core>,
    sequence: AtomicU64,
    outbound: Mutex<Option<mpsc::UnboundedSender<Value>>>,
    bound: AtomicBool,
    closed: watch::Sender<bool>,
    error_callback: RwLock<Option<ErrorCallback>>,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forward an error to the manager-level callback, if one is set.
    pub(crate) fn report(&self, error: &KernelError) {
        let callback = self
            .error_callback
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(callback) = callback {
            callback(error);
        }
    }

    /// Remove a pending call without settling it through the router.
    pub(crate) fn retire(&self, uid: &CorrelationId) -> Option<PendingCall> {
        let mut core = self.lock();
        let call = core.table.remove(uid)?;
        self.state.on_settled(core.table.len());
        Some(call)
    }

    /// Retire a call whose timeout fired, remembering its uid so a late
    /// reply is recognised and never treated as unmatched.
    pub(crate) fn expire(&self, uid: &CorrelationId) -> Option<PendingCall> {
        let mut core = self.lock();
        let call = core.table.remove(uid)?;
        core.expired.insert(uid.clone());
        self.state.on_settled(core.table.len());
        Some(call)
    }

    /// Drop the outbound channel and fail every pending call with `error`.
    ///
    /// The kernel state is left as it was; [`KernelManager::is_closed`]
    /// tells a dead kernel apart from an idle one.
    pub(crate) fn shut_down(&self, error: impl Fn() -> KernelError) {
        self.outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.closed.send_replace(true);
        let drained = {
            let mut core = self.lock();
            core.expired.clear();
            core.table.drain()
        };
        for (uid, call) in drained {
            debug!(kernel = %self.kind, %uid, function = call.function_name(), "rejecting pending call");
            call.reject(error());
        }
    }

    fn sender(&self) -> Result<mpsc::UnboundedSender<Value>> {
        let outbound = self.outbound.lock().unwrap_or_else(PoisonError::into_inner);
        match outbound.as_ref() {
            Some(sender) => Ok(sender.clone()),
            None if self.bound.load(Ordering::Acquire) => Err(KernelError::TransportClosed),
            None => Err(KernelError::NotBound),
        }
    }
}

/// Main-thread handle to one kernel worker.
///
/// Cloning is cheap and every clone talks to the same worker, correlation
/// table and state stream.
///
/// # Example
///
/// ```no_run
/// # async fn demo(transport: vcad_worker_protocol::Transport) -> vcad_worker::Result<()> {
/// use serde_json::json;
/// use vcad_worker::{KernelManager, ManagerConfig};
/// use vcad_worker_protocol::KernelKind;
///
/// let occt = KernelManager::new(KernelKind::Occt, ManagerConfig::default());
/// occt.set_worker(transport)?;
/// occt.wait_until_initialised().await?;
///
/// occt.started_the_run().await?;
/// let shape = occt
///     .call("shapes.solid.createBox", json!({ "width": 10, "length": 10, "height": 10 }))
///     .await?;
/// occt.clean_all_cache().await?;
/// # let _ = shape;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct KernelManager {
    shared: Arc<Shared>,
}

impl KernelManager {
    /// Create an unbound manager for a kernel of `kind`.
    pub fn new(kind: KernelKind, config: ManagerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                kind,
                config,
                state: StateBroadcaster::new(kind),
                core: Mutex::new(Core::default()),
                sequence: AtomicU64::new(0),
                outbound: Mutex::new(None),
                bound: AtomicBool::new(false),
                closed: watch::channel(false).0,
                error_callback: RwLock::new(None),
            }),
        }
    }

    /// Kernel this manager talks to.
    pub fn kind(&self) -> KernelKind {
        self.shared.kind
    }

    /// Configuration in effect.
    pub fn config(&self) -> &ManagerConfig {
        &self.shared.config
    }

    /// Whether a worker has been bound.
    pub fn already_initialised(&self) -> bool {
        self.shared.bound.load(Ordering::Acquire)
    }

    /// Bind the worker channel and start routing its messages.
    ///
    /// Must be called from within a tokio runtime. A manager accepts exactly
    /// one transport for its whole life.
    pub fn set_worker(&self, transport: Transport) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| KernelError::NoRuntime)?;
        if self
            .shared
            .bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(KernelError::AlreadyBound);
        }

        let (outbound, inbound) = transport.into_parts();
        *self
            .shared
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(outbound);
        runtime.spawn(router::run(Arc::downgrade(&self.shared), inbound));
        debug!(kernel = %self.shared.kind, "worker bound");
        Ok(())
    }

    /// Install the manager-level error sink.
    pub fn set_error_callback(&self, callback: impl Fn(&KernelError) + Send + Sync + 'static) {
        *self
            .shared
            .error_callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Remove the manager-level error sink.
    pub fn clear_error_callback(&self) {
        *self
            .shared
            .error_callback
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Call a kernel function.
    ///
    /// The call is registered and posted before this returns; the returned
    /// future only waits for the reply. Calls are never retried.
    pub fn call<I: Serialize>(
        &self,
        function_name: &str,
        inputs: I,
    ) -> BoxFuture<'static, Result<Value>> {
        let dispatched = self.dispatch(function_name, inputs);
        await_reply(Arc::clone(&self.shared), function_name.to_string(), dispatched).boxed()
    }

    /// Call a kernel function and deserialize its result.
    pub fn call_as<T, I>(&self, function_name: &str, inputs: I) -> BoxFuture<'static, Result<T>>
    where
        T: DeserializeOwned + Send + 'static,
        I: Serialize,
    {
        let call = self.call(function_name, inputs);
        async move {
            let value = call.await?;
            serde_json::from_value(value).map_err(KernelError::from)
        }
        .boxed()
    }

    fn dispatch<I: Serialize>(
        &self,
        function_name: &str,
        inputs: I,
    ) -> Result<(CorrelationId, oneshot::Receiver<Result<Value>>)> {
        let inputs = serde_json::to_value(inputs)?;
        let sender = self.shared.sender()?;

        let sequence = self.shared.sequence.fetch_add(1, Ordering::Relaxed);
        let uid = CorrelationId::sequenced(sequence);
        let envelope = OutboundEnvelope::new(uid.clone(), function_name, inputs).to_value()?;

        let (responder, reply) = oneshot::channel();
        {
            let mut core = self.shared.lock();
            // The sequence number makes a live collision impossible.
            debug_assert!(!core.table.contains(&uid));
            core.table
                .insert(uid.clone(), PendingCall::new(function_name, responder));
            self.shared.state.on_dispatch(core.table.len());
        }

        // Registered first so a fast reply always finds its entry.
        if sender.send(envelope).is_err() {
            self.shared.retire(&uid);
            return Err(KernelError::TransportClosed);
        }
        debug!(kernel = %self.shared.kind, %uid, function = function_name, "call dispatched");
        Ok((uid, reply))
    }

    /// Feed one raw inbound message through the router.
    ///
    /// The router task bound by [`set_worker`](Self::set_worker) calls this
    /// for every message; it is public so hosts that own their own inbound
    /// loop can drive the manager directly. Only the fatal unmatched-reply
    /// policy makes this return an error.
    pub fn handle_message(&self, raw: Value) -> Result<()> {
        self.shared.route(raw)
    }

    /// Number of dispatched calls still awaiting a reply.
    pub fn pending_calls(&self) -> usize {
        self.shared.lock().table.len()
    }

    /// Current kernel state.
    pub fn current_state(&self) -> KernelState {
        self.shared.state.current()
    }

    /// State stream that starts with the current value.
    pub fn subscribe(&self) -> watch::Receiver<KernelState> {
        self.shared.state.subscribe()
    }

    /// Every state transition from now on.
    pub fn transitions(&self) -> broadcast::Receiver<KernelState> {
        self.shared.state.transitions()
    }

    /// Wait until the worker has reported ready at least once.
    ///
    /// Fails with [`KernelError::TransportClosed`] if the channel closes
    /// first, e.g. because the kernel failed to load.
    pub async fn wait_until_initialised(&self) -> Result<KernelState> {
        let mut state = self.subscribe();
        let mut closed = self.shared.closed.subscribe();
        tokio::select! {
            reached = state.wait_for(|state| state.is_initialised()) => {
                let reached = reached.map_err(|_| KernelError::TransportClosed)?;
                Ok(*reached)
            }
            _ = closed.wait_for(|closed| *closed) => {
                let current = self.current_state();
                if current.is_initialised() {
                    Ok(current)
                } else {
                    Err(KernelError::TransportClosed)
                }
            }
        }
    }

    /// Whether the worker channel has been closed.
    pub fn is_closed(&self) -> bool {
        *self.shared.closed.borrow()
    }

    /// Hang up on the worker and fail every pending call.
    ///
    /// The state stream keeps its last value (e.g. `Computing` if calls were
    /// in flight); check [`is_closed`](Self::is_closed) to detect disposal.
    pub fn dispose(&self) {
        self.shared.shut_down(|| KernelError::TransportClosed);
        debug!(kernel = %self.shared.kind, "manager disposed");
    }
}

async fn await_reply(
    shared: Arc<Shared>,
    function_name: String,
    dispatched: Result<(CorrelationId, oneshot::Receiver<Result<Value>>)>,
) -> Result<Value> {
    let (uid, mut reply) = dispatched?;
    let Some(after) = shared.config.call_timeout() else {
        return reply.await.map_err(|_| KernelError::TransportClosed)?;
    };

    match tokio::time::timeout(after, &mut reply).await {
        Ok(settled) => settled.map_err(|_| KernelError::TransportClosed)?,
        Err(_) => {
            if shared.expire(&uid).is_none() {
                // Settled in the same instant the timer fired.
                return reply.await.map_err(|_| KernelError::TransportClosed)?;
            }
            let error = KernelError::Timeout {
                function_name,
                uid,
                after,
            };
            error!(kernel = %shared.kind, %error, "call abandoned");
            Err(error)
        }
    }
}

impl std::fmt::Debug for KernelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelManager")
            .field("kind", &self.shared.kind)
            .field("state", &self.current_state())
            .field("pending", &self.pending_calls())
            .finish()
    }
}
