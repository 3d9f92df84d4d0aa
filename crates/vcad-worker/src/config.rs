//! Manager configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the router does with a reply whose uid matches no pending call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedReplyPolicy {
    /// Log a warning and drop the message.
    #[default]
    Drop,
    /// Reject every pending call and stop routing.
    ///
    /// Late replies to calls abandoned by the call timeout are not
    /// unmatched: they are dropped under either policy.
    Fatal,
}

/// Tunables for one [`KernelManager`](crate::KernelManager).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Per-call timeout in milliseconds. `None` waits forever.
    pub call_timeout_ms: Option<u64>,
    /// Handling of replies for unknown uids.
    pub unmatched_reply: UnmatchedReplyPolicy,
}

impl ManagerConfig {
    /// Set the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Set the unmatched reply policy.
    pub fn with_unmatched_reply(mut self, policy: UnmatchedReplyPolicy) -> Self {
        self.unmatched_reply = policy;
        self
    }

    /// The per-call timeout, if any.
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}
