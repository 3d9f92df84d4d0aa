//! Inbound message routing.
//!
//! Exactly one router task runs per bound worker. It classifies each inbound
//! message and either updates the kernel state (sentinels) or settles the
//! matching pending call (correlated replies).

use std::sync::Weak;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use vcad_worker_protocol::{
    CorrelatedReply, CorrelationId, InboundMessage, Outcome, ProtocolError,
};

use crate::config::UnmatchedReplyPolicy;
use crate::error::{KernelError, Result};
use crate::manager::Shared;

/// Drive `shared` from `inbound` until the worker hangs up, the manager is
/// dropped, or a fatal protocol violation occurs.
pub(crate) async fn run(shared: Weak<Shared>, mut inbound: mpsc::UnboundedReceiver<Value>) {
    while let Some(raw) = inbound.recv().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if let Err(error) = shared.route(raw) {
            error!(kernel = %shared.kind, %error, "message router stopped");
            return;
        }
    }

    if let Some(shared) = shared.upgrade() {
        warn!(kernel = %shared.kind, "worker channel closed");
        shared.shut_down(|| KernelError::TransportClosed);
    }
}

impl Shared {
    pub(crate) fn route(&self, raw: Value) -> Result<()> {
        let message = match InboundMessage::classify(self.kind, raw) {
            Ok(message) => message,
            Err(ProtocolError::MalformedReply { uid, reason }) => {
                self.reject_malformed(uid, reason);
                return Ok(());
            }
            Err(error) => {
                warn!(kernel = %self.kind, %error, "dropping unrecognised message");
                return Ok(());
            }
        };

        match message {
            InboundMessage::InitSentinel => {
                let core = self.lock();
                self.state.on_init(core.table.len(), core.settled_any);
                Ok(())
            }
            InboundMessage::BusySentinel => {
                // Only a confirmation: dispatch already moved us to Computing.
                self.state.on_busy();
                Ok(())
            }
            InboundMessage::Correlated(reply) => self.settle(reply),
        }
    }

    fn settle(&self, reply: CorrelatedReply) -> Result<()> {
        let call = {
            let mut core = self.lock();
            let Some(call) = core.table.remove(&reply.uid) else {
                if core.expired.remove(&reply.uid) {
                    debug!(kernel = %self.kind, uid = %reply.uid, "late reply for timed-out call dropped");
                    // A busy signal for the abandoned call may have moved us
                    // back to Computing.
                    self.state.on_idle(core.table.len());
                    return Ok(());
                }
                drop(core);
                return self.unmatched(reply.uid);
            };
            core.settled_any = true;
            self.state.on_settled(core.table.len());
            call
        };

        match reply.outcome {
            Outcome::Success(result) => {
                debug!(kernel = %self.kind, uid = %reply.uid, function = call.function_name(), "call resolved");
                call.resolve(result);
            }
            Outcome::Failure(message) => {
                let error = KernelError::Worker {
                    function_name: call.function_name().to_string(),
                    message,
                };
                error!(kernel = %self.kind, uid = %reply.uid, %error, "call rejected");
                self.report(&error);
                call.reject(error);
            }
        }
        Ok(())
    }

    fn unmatched(&self, uid: CorrelationId) -> Result<()> {
        match self.config.unmatched_reply {
            UnmatchedReplyPolicy::Drop => {
                warn!(kernel = %self.kind, %uid, "reply for unknown call dropped");
                self.state.on_idle(self.lock().table.len());
                Ok(())
            }
            UnmatchedReplyPolicy::Fatal => {
                let error = KernelError::UnmatchedReply(uid.clone());
                self.report(&error);
                self.shut_down(|| KernelError::UnmatchedReply(uid.clone()));
                Err(error)
            }
        }
    }

    /// Fail the call a malformed reply was addressed to, so it cannot hang.
    fn reject_malformed(&self, uid: CorrelationId, reason: String) {
        let call = {
            let mut core = self.lock();
            let Some(call) = core.table.remove(&uid) else {
                core.expired.remove(&uid);
                warn!(kernel = %self.kind, %uid, %reason, "malformed reply for unknown call dropped");
                self.state.on_idle(core.table.len());
                return;
            };
            core.settled_any = true;
            self.state.on_settled(core.table.len());
            call
        };

        let error = KernelError::Protocol(ProtocolError::MalformedReply { uid, reason });
        error!(kernel = %self.kind, %error, "call rejected");
        self.report(&error);
        call.reject(error);
    }
}
