#![warn(missing_docs)]

//! Main-thread side of the vcad kernel workers.
//!
//! Each geometry kernel runs on its own worker. A [`KernelManager`] owns the
//! single channel to that worker and provides:
//!
//! - correlated calls: [`KernelManager::call`] registers a pending entry
//!   keyed by a fresh correlation id, posts `{action, uid}` and hands back a
//!   future that settles when the worker replies with that uid, in whatever
//!   order replies arrive;
//! - a replayable [`KernelState`](vcad_worker_protocol::KernelState) stream
//!   (`uninitialised → initialised → computing ⇄ loaded`);
//! - the run boundary calls [`KernelManager::started_the_run`] and
//!   [`KernelManager::clean_all_cache`] that bound the worker-side cache.
//!
//! No call is ever retried. Timeouts are opt-in through [`ManagerConfig`].

pub mod config;
pub mod error;
mod lifecycle;
pub mod manager;
mod router;
pub mod state;
pub mod table;

pub use config::{ManagerConfig, UnmatchedReplyPolicy};
pub use error::{KernelError, Result};
pub use manager::{ErrorCallback, KernelManager};
pub use state::StateBroadcaster;
pub use table::{CorrelationTable, PendingCall};
