#![warn(missing_docs)]

//! Worker-side runtime for vcad kernels.
//!
//! [`spawn_worker`] moves a [`Kernel`] onto its own OS thread and returns the
//! manager's end of the channel. The thread loads the kernel, posts the init
//! sentinel and then serves calls one at a time: it posts `"busy"`, runs the
//! call through the content-addressed [`ArgCache`], and posts the correlated
//! result or error.
//!
//! The reserved calls `startedTheRun` and `cleanAllCache` are answered by the
//! host itself and bound the cache across repeated runs of the same script.

pub mod cache;
pub mod error;
pub mod kernel;
pub mod shapes;
pub mod worker;

pub use cache::{cache_key, ArgCache, CacheKey};
pub use error::{HostError, Result};
pub use kernel::Kernel;
pub use shapes::{HandleType, ShapeHandle, ShapeKernel};
pub use worker::{spawn_worker, WorkerHandle, WorkerHost};
