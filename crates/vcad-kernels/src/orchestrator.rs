//! Starting kernels and waiting for them to become ready.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{info, warn};
use vcad_worker::{KernelError, KernelManager};
use vcad_worker_protocol::{KernelKind, Transport};

use crate::config::OrchestratorConfig;
use crate::error::{OrchestratorError, Result};

/// Outcome of [`KernelOrchestrator::initialise`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// No kernel was selected, so there was nothing to wait for.
    NothingSelected,
    /// Every selected kernel reported ready.
    Ready(Vec<KernelKind>),
}

#[derive(Debug)]
enum Slot {
    Started(KernelManager),
    Unavailable(String),
}

/// Owns one [`KernelManager`] per selected kernel.
#[derive(Debug)]
pub struct KernelOrchestrator {
    config: OrchestratorConfig,
    slots: BTreeMap<KernelKind, Slot>,
}

impl KernelOrchestrator {
    /// Create an orchestrator; nothing is started yet.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self {
            config,
            slots: BTreeMap::new(),
        }
    }

    /// Kernels selected by the config, in order.
    pub fn selection(&self) -> Vec<KernelKind> {
        self.config.selection()
    }

    /// Build a transport and manager for every selected kernel.
    ///
    /// `factory` creates the worker for one kernel. A kernel whose factory
    /// fails (or whose manager rejects the transport) is remembered as
    /// unavailable and reported by [`initialise`](Self::initialise).
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, mut factory: F)
    where
        F: FnMut(KernelKind) -> std::result::Result<Transport, String>,
    {
        for kind in self.config.selection() {
            if self.slots.contains_key(&kind) {
                continue;
            }
            let slot = match factory(kind) {
                Ok(transport) => {
                    let manager = KernelManager::new(kind, self.config.manager.clone());
                    match manager.set_worker(transport) {
                        Ok(()) => Slot::Started(manager),
                        Err(error) => Slot::Unavailable(error.to_string()),
                    }
                }
                Err(reason) => Slot::Unavailable(reason),
            };
            if let Slot::Unavailable(reason) = &slot {
                warn!(kernel = %kind, %reason, "kernel unavailable");
            }
            self.slots.insert(kind, slot);
        }
    }

    /// The manager for `kind`, if it was started.
    pub fn manager(&self, kind: KernelKind) -> Option<&KernelManager> {
        match self.slots.get(&kind) {
            Some(Slot::Started(manager)) => Some(manager),
            _ => None,
        }
    }

    /// Route every manager's errors to `callback`, tagged with the kernel.
    pub fn on_error(&self, callback: impl Fn(KernelKind, &KernelError) + Send + Sync + 'static) {
        let callback = Arc::new(callback);
        for (kind, manager) in self.started() {
            let callback = Arc::clone(&callback);
            manager.set_error_callback(move |error| callback(kind, error));
        }
    }

    /// Wait until every selected kernel has reported ready.
    ///
    /// Returns [`Readiness::NothingSelected`] immediately for an empty
    /// selection, and fails fast with
    /// [`OrchestratorError::Unavailable`] for a kernel that could not be
    /// started instead of waiting on it.
    pub async fn initialise(&self) -> Result<Readiness> {
        let selection = self.config.selection();
        if selection.is_empty() {
            info!("no kernels selected");
            return Ok(Readiness::NothingSelected);
        }

        let mut waits = Vec::with_capacity(selection.len());
        for kind in &selection {
            match self.slots.get(kind) {
                Some(Slot::Started(manager)) => waits.push(self.await_ready(*kind, manager)),
                Some(Slot::Unavailable(reason)) => {
                    return Err(OrchestratorError::Unavailable {
                        kind: *kind,
                        reason: reason.clone(),
                    })
                }
                None => {
                    return Err(OrchestratorError::Unavailable {
                        kind: *kind,
                        reason: "not started".to_string(),
                    })
                }
            }
        }

        let ready = try_join_all(waits).await?;
        info!(kernels = ?ready, "kernels ready");
        Ok(Readiness::Ready(ready))
    }

    async fn await_ready(&self, kind: KernelKind, manager: &KernelManager) -> Result<KernelKind> {
        let ready = manager.wait_until_initialised();
        let outcome = match self.config.init_timeout() {
            Some(after) => tokio::time::timeout(after, ready)
                .await
                .map_err(|_| OrchestratorError::InitTimeout { kind, after })?,
            None => ready.await,
        };
        outcome.map_err(|_| OrchestratorError::InitAborted(kind))?;
        Ok(kind)
    }

    /// Mark the start of a run on every started kernel.
    pub async fn begin_run(&self) -> Result<()> {
        let calls = self.started().map(|(kind, manager)| async move {
            manager
                .started_the_run()
                .await
                .map_err(|source| OrchestratorError::Kernel { kind, source })
        });
        try_join_all(calls).await?;
        Ok(())
    }

    /// Evict what the finished run did not use, on every started kernel.
    pub async fn end_run(&self) -> Result<()> {
        let calls = self.started().map(|(kind, manager)| async move {
            manager
                .clean_all_cache()
                .await
                .map_err(|source| OrchestratorError::Kernel { kind, source })
        });
        try_join_all(calls).await?;
        Ok(())
    }

    /// Dispose every started manager.
    pub fn dispose(&self) {
        for (_, manager) in self.started() {
            manager.dispose();
        }
    }

    fn started(&self) -> impl Iterator<Item = (KernelKind, &KernelManager)> {
        self.slots.iter().filter_map(|(kind, slot)| match slot {
            Slot::Started(manager) => Some((*kind, manager)),
            Slot::Unavailable(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use vcad_worker_host::{spawn_worker, ShapeKernel};
    use vcad_worker_protocol::{KernelState, WorkerEndpoint};

    fn shape_worker(kind: KernelKind) -> std::result::Result<Transport, String> {
        spawn_worker(ShapeKernel::new(kind))
            .map(|(transport, _handle)| transport)
            .map_err(|err| err.to_string())
    }

    #[tokio::test]
    async fn test_nothing_selected_returns_promptly() {
        let mut orchestrator = KernelOrchestrator::new(OrchestratorConfig::default());
        orchestrator.start(|_| panic!("no kernel should be built"));
        assert_eq!(
            orchestrator.initialise().await.unwrap(),
            Readiness::NothingSelected
        );
    }

    #[tokio::test]
    async fn test_all_selected_kernels_become_ready() {
        let config = OrchestratorConfig::with_kernels([KernelKind::Manifold, KernelKind::Occt]);
        let mut orchestrator = KernelOrchestrator::new(config);
        orchestrator.start(shape_worker);

        assert_eq!(
            orchestrator.initialise().await.unwrap(),
            Readiness::Ready(vec![KernelKind::Manifold, KernelKind::Occt])
        );
        assert!(orchestrator.manager(KernelKind::Jscad).is_none());
        let occt = orchestrator.manager(KernelKind::Occt).unwrap();
        assert_eq!(occt.current_state(), KernelState::Initialised);
    }

    #[tokio::test]
    async fn test_failed_construction_is_reported_not_awaited() {
        let config = OrchestratorConfig::with_kernels([KernelKind::Occt, KernelKind::Jscad]);
        let mut orchestrator = KernelOrchestrator::new(config);
        orchestrator.start(|kind| match kind {
            KernelKind::Jscad => Err("jscad bundle not found".to_string()),
            other => shape_worker(other),
        });

        match orchestrator.initialise().await {
            Err(OrchestratorError::Unavailable { kind, reason }) => {
                assert_eq!(kind, KernelKind::Jscad);
                assert_eq!(reason, "jscad bundle not found");
            }
            other => panic!("expected unavailable kernel, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unstarted_kernel_is_unavailable() {
        let orchestrator =
            KernelOrchestrator::new(OrchestratorConfig::with_kernels([KernelKind::Occt]));
        assert!(matches!(
            orchestrator.initialise().await,
            Err(OrchestratorError::Unavailable { kind: KernelKind::Occt, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_worker_times_out() {
        let mut config = OrchestratorConfig::with_kernels([KernelKind::Occt]);
        config.init_timeout_ms = Some(250);
        let mut orchestrator = KernelOrchestrator::new(config);

        let silent: Mutex<Vec<WorkerEndpoint>> = Mutex::new(Vec::new());
        orchestrator.start(|_| {
            let (transport, endpoint) = Transport::pair();
            silent.lock().unwrap().push(endpoint);
            Ok(transport)
        });

        match orchestrator.initialise().await {
            Err(OrchestratorError::InitTimeout { kind, after }) => {
                assert_eq!(kind, KernelKind::Occt);
                assert_eq!(after, Duration::from_millis(250));
            }
            other => panic!("expected init timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_worker_exiting_before_init_aborts() {
        let mut orchestrator =
            KernelOrchestrator::new(OrchestratorConfig::with_kernels([KernelKind::Manifold]));
        orchestrator.start(|_| {
            let (transport, endpoint) = Transport::pair();
            drop(endpoint);
            Ok(transport)
        });

        assert!(matches!(
            orchestrator.initialise().await,
            Err(OrchestratorError::InitAborted(KernelKind::Manifold))
        ));
    }

    #[tokio::test]
    async fn test_run_boundaries_reach_every_kernel() {
        let config = OrchestratorConfig::with_kernels([KernelKind::Occt, KernelKind::Jscad]);
        let mut orchestrator = KernelOrchestrator::new(config);
        orchestrator.start(shape_worker);
        orchestrator.initialise().await.unwrap();

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        orchestrator.on_error(move |kind, error| {
            sink.lock().unwrap().push(format!("{kind}: {error}"));
        });

        orchestrator.begin_run().await.unwrap();
        let occt = orchestrator.manager(KernelKind::Occt).unwrap();
        let cube = occt
            .call(
                "shapes.solid.createBox",
                json!({ "width": 1, "length": 2, "height": 3 }),
            )
            .await
            .unwrap();
        let jscad = orchestrator.manager(KernelKind::Jscad).unwrap();
        assert!(jscad
            .call("shapes.solid.getVolume", json!({ "shape": cube }))
            .await
            .is_err());
        orchestrator.end_run().await.unwrap();

        let errors = errors.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("jscad: shapes.solid.getVolume failed"));

        orchestrator.dispose();
        assert!(occt.is_closed());
    }
}
