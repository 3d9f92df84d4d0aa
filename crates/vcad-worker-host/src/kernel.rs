//! The contract between the worker loop and a hosted kernel.

use serde_json::Value;
use vcad_worker_protocol::KernelKind;

/// A computational kernel that can be hosted on a worker thread.
///
/// The host owns the kernel exclusively and calls it from one thread, one
/// call at a time, in arrival order.
pub trait Kernel: Send + 'static {
    /// Which kernel this is; selects the sentinels the host posts.
    fn kind(&self) -> KernelKind;

    /// Load the kernel. The init sentinel is posted only if this succeeds.
    fn init(&mut self) -> Result<(), String> {
        Ok(())
    }

    /// Run `function_name` with `inputs`. The error text is sent to the caller.
    fn execute(&mut self, function_name: &str, inputs: &Value) -> Result<Value, String>;

    /// Whether results of `function_name` may be memoised by input hash.
    fn is_cacheable(&self, _function_name: &str) -> bool {
        true
    }

    /// Called for every result evicted from the cache.
    fn release(&mut self, _evicted: &Value) {}
}
