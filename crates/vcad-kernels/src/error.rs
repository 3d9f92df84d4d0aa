//! Error types for kernel orchestration.

use std::time::Duration;

use thiserror::Error;
use vcad_worker::KernelError;
use vcad_worker_protocol::KernelKind;

/// Errors from starting or coordinating kernels.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// A selected kernel has no usable worker.
    #[error("kernel {kind} is unavailable: {reason}")]
    Unavailable {
        /// The kernel.
        kind: KernelKind,
        /// Why its worker could not be set up.
        reason: String,
    },

    /// A kernel did not report ready in time.
    #[error("kernel {kind} did not initialise within {after:?}")]
    InitTimeout {
        /// The kernel.
        kind: KernelKind,
        /// Configured bound.
        after: Duration,
    },

    /// A kernel's worker went away before reporting ready.
    #[error("kernel {0} stopped before initialising")]
    InitAborted(KernelKind),

    /// A run boundary call failed.
    #[error("kernel {kind}: {source}")]
    Kernel {
        /// The kernel.
        kind: KernelKind,
        /// Underlying manager error.
        source: KernelError,
    },

    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// The config file is not valid TOML for [`OrchestratorConfig`](crate::OrchestratorConfig).
    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result type for orchestration.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
