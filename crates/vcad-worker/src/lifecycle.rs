//! Run boundaries for the worker-side cache.
//!
//! Kernels memoise expensive intermediate objects by input hash. Marking the
//! start of each run lets the worker tell what the current run still uses, and
//! cleaning afterwards evicts the rest, so repeated runs of the same script do
//! not grow the cache without bound.

use tracing::debug;
use vcad_worker_protocol::{CLEAN_ALL_CACHE, STARTED_THE_RUN};

use crate::error::Result;
use crate::manager::KernelManager;

impl KernelManager {
    /// Tell the worker a new top-level run begins.
    ///
    /// Await this before issuing the run's geometry calls; calls sent earlier
    /// may be served against the previous run's cache bookkeeping.
    pub async fn started_the_run(&self) -> Result<()> {
        self.call(STARTED_THE_RUN, serde_json::json!({})).await?;
        debug!(kernel = %self.kind(), "run started");
        Ok(())
    }

    /// Evict every cached object the latest run did not use.
    pub async fn clean_all_cache(&self) -> Result<()> {
        self.call(CLEAN_ALL_CACHE, serde_json::json!({})).await?;
        debug!(kernel = %self.kind(), "cache cleaned");
        Ok(())
    }
}
