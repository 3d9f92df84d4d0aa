#![warn(missing_docs)]

//! Kernel orchestration for vcad.
//!
//! [`KernelOrchestrator`] starts a worker and a
//! [`KernelManager`](vcad_worker::KernelManager) for each selected kernel,
//! waits for all of them to report ready, and brackets each run of a user
//! script with the cache boundary calls.
//!
//! # Example
//!
//! ```ignore
//! use vcad_kernels::{KernelOrchestrator, OrchestratorConfig, Readiness};
//!
//! let mut orchestrator = KernelOrchestrator::new(OrchestratorConfig::load("kernels.toml")?);
//! orchestrator.start(|kind| spawn_kernel(kind));
//! match orchestrator.initialise().await? {
//!     Readiness::NothingSelected => println!("no kernels selected"),
//!     Readiness::Ready(kinds) => println!("ready: {kinds:?}"),
//! }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, Result};
pub use orchestrator::{KernelOrchestrator, Readiness};
