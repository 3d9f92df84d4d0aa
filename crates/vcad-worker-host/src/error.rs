//! Error types for the worker host.

use thiserror::Error;

/// Errors from starting or running a hosted kernel.
#[derive(Error, Debug)]
pub enum HostError {
    /// The worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The kernel failed to load.
    #[error("kernel init failed: {0}")]
    KernelInit(String),

    /// The worker thread panicked.
    #[error("worker thread panicked")]
    Panicked,
}

/// Result type for host operations.
pub type Result<T> = std::result::Result<T, HostError>;
