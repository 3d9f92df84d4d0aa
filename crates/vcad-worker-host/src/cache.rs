//! Content-addressed argument cache.
//!
//! Results are keyed by a SHA-256 digest of the function name and its inputs.
//! Each lookup records the key as used by the current run; cleaning evicts
//! whatever the current run never asked for.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Digest identifying one `(function, inputs)` pair.
pub type CacheKey = String;

/// Compute the cache key for a call.
///
/// `serde_json` keeps object keys sorted, so equal inputs hash equally
/// regardless of how the caller ordered them.
pub fn cache_key(function_name: &str, inputs: &Value) -> CacheKey {
    let mut hasher = Sha256::new();
    hasher.update(function_name.as_bytes());
    hasher.update(b"|");
    hasher.update(inputs.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Memoised kernel results plus per-run usage tracking.
#[derive(Debug, Default)]
pub struct ArgCache {
    entries: HashMap<CacheKey, Value>,
    used: HashSet<CacheKey>,
}

impl ArgCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, marking it used in this run.
    pub fn get(&mut self, key: &str) -> Option<&Value> {
        self.used.insert(key.to_string());
        self.entries.get(key)
    }

    /// Store a result, marking it used in this run.
    pub fn insert(&mut self, key: CacheKey, value: Value) {
        self.used.insert(key.clone());
        self.entries.insert(key, value);
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// Failed computations are not cached.
    pub fn get_or_try_insert<E>(
        &mut self,
        key: CacheKey,
        compute: impl FnOnce() -> Result<Value, E>,
    ) -> Result<Value, E> {
        if let Some(hit) = self.get(&key) {
            return Ok(hit.clone());
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Begin a new run: forget which keys were used, keep the entries.
    pub fn start_run(&mut self) {
        self.used.clear();
    }

    /// Evict every entry not used since the last [`start_run`](Self::start_run).
    ///
    /// Returns the evicted values so the owner can release what they refer to.
    pub fn clean_unused(&mut self) -> Vec<Value> {
        let stale: Vec<CacheKey> = self
            .entries
            .keys()
            .filter(|key| !self.used.contains(*key))
            .cloned()
            .collect();
        stale
            .into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .collect()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
