//! Kernel lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one kernel, as broadcast by its manager.
///
/// `Uninitialised` is only ever the starting value; once the worker has
/// reported ready the state moves between `Initialised`, `Computing` and
/// `Loaded` and never returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelState {
    /// Worker has not reported ready yet.
    #[default]
    Uninitialised,
    /// Worker reported ready and no call has completed since.
    Initialised,
    /// At least one call is executing.
    Computing,
    /// Ready and idle: zero pending calls.
    Loaded,
}

impl KernelState {
    /// Whether the kernel has reported ready at some point.
    pub fn is_initialised(self) -> bool {
        !matches!(self, KernelState::Uninitialised)
    }
}

impl fmt::Display for KernelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KernelState::Uninitialised => "uninitialised",
            KernelState::Initialised => "initialised",
            KernelState::Computing => "computing",
            KernelState::Loaded => "loaded",
        };
        f.write_str(name)
    }
}
