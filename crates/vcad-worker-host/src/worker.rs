//! Worker thread loop.

use std::thread::{self, JoinHandle};

use serde_json::Value;
use tracing::{debug, error, info, warn};
use vcad_worker_protocol::{
    CorrelatedReply, InboundMessage, KernelKind, OutboundEnvelope, Transport, WorkerEndpoint,
    CLEAN_ALL_CACHE, STARTED_THE_RUN,
};

use crate::cache::{cache_key, ArgCache};
use crate::error::{HostError, Result};
use crate::kernel::Kernel;

/// Hosts one kernel and answers the calls arriving on its endpoint.
pub struct WorkerHost<K: Kernel> {
    kernel: K,
    cache: ArgCache,
    endpoint: WorkerEndpoint,
}

impl<K: Kernel> WorkerHost<K> {
    /// Host `kernel` behind `endpoint`.
    pub fn new(kernel: K, endpoint: WorkerEndpoint) -> Self {
        Self {
            kernel,
            cache: ArgCache::new(),
            endpoint,
        }
    }

    /// Initialise the kernel, announce readiness, then serve calls until the
    /// manager hangs up.
    ///
    /// Blocks the current thread; never call it from an async context.
    pub fn run(mut self) -> Result<()> {
        let kind = self.kernel.kind();
        self.kernel.init().map_err(|reason| {
            error!(kernel = %kind, %reason, "kernel init failed");
            HostError::KernelInit(reason)
        })?;
        if !self.post(kind, InboundMessage::InitSentinel) {
            return Ok(());
        }
        info!(kernel = %kind, "worker ready");

        while let Some(raw) = self.endpoint.blocking_recv() {
            let envelope = match OutboundEnvelope::from_value(raw) {
                Ok(envelope) => envelope,
                Err(error) => {
                    warn!(kernel = %kind, %error, "ignoring malformed call");
                    continue;
                }
            };
            if !self.post(kind, InboundMessage::BusySentinel) {
                break;
            }
            let reply = self.handle(envelope);
            if !self.post(kind, InboundMessage::Correlated(reply)) {
                break;
            }
        }

        debug!(kernel = %kind, cached = self.cache.len(), "worker stopped");
        Ok(())
    }

    /// Execute one call and build its reply.
    pub fn handle(&mut self, envelope: OutboundEnvelope) -> CorrelatedReply {
        let OutboundEnvelope { action, uid } = envelope;
        let Self { kernel, cache, .. } = self;
        let name = action.function_name.as_str();

        let outcome = match name {
            STARTED_THE_RUN => {
                cache.start_run();
                Ok(Value::Null)
            }
            CLEAN_ALL_CACHE => {
                let evicted = cache.clean_unused();
                debug!(evicted = evicted.len(), retained = cache.len(), "cache cleaned");
                for value in &evicted {
                    kernel.release(value);
                }
                Ok(Value::Null)
            }
            _ if kernel.is_cacheable(name) => {
                let key = cache_key(name, &action.inputs);
                cache.get_or_try_insert(key, || kernel.execute(name, &action.inputs))
            }
            _ => kernel.execute(name, &action.inputs),
        };

        match outcome {
            Ok(result) => CorrelatedReply::success(uid, result),
            Err(error) => {
                debug!(%uid, function = name, %error, "call failed");
                CorrelatedReply::failure(uid, error)
            }
        }
    }

    /// Number of results currently memoised.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    fn post(&self, kind: KernelKind, message: InboundMessage) -> bool {
        self.endpoint.post(message.to_value(kind)).is_ok()
    }
}

/// Join handle of a spawned worker thread.
#[derive(Debug)]
pub struct WorkerHandle {
    kind: KernelKind,
    thread: JoinHandle<Result<()>>,
}

impl WorkerHandle {
    /// Kernel hosted by the thread.
    pub fn kind(&self) -> KernelKind {
        self.kind
    }

    /// Whether the worker thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the thread to exit. It exits once the manager side of the
    /// transport is dropped or disposed.
    pub fn join(self) -> Result<()> {
        self.thread.join().map_err(|_| HostError::Panicked)?
    }
}

/// Start `kernel` on a dedicated, named OS thread.
///
/// Returns the manager's end of the channel; bind it with
/// `KernelManager::set_worker`.
pub fn spawn_worker<K: Kernel>(kernel: K) -> Result<(Transport, WorkerHandle)> {
    let kind = kernel.kind();
    let (transport, endpoint) = Transport::pair();
    let host = WorkerHost::new(kernel, endpoint);
    let thread = thread::Builder::new()
        .name(format!("{kind}-worker"))
        .spawn(move || host.run())?;
    Ok((transport, WorkerHandle { kind, thread }))
}
