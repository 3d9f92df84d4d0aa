//! Orchestrator configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vcad_worker::ManagerConfig;
use vcad_worker_protocol::KernelKind;

use crate::error::Result;

/// Which kernels to start and how to treat them.
///
/// ```toml
/// kernels = ["occt", "manifold"]
/// init_timeout_ms = 30000
///
/// [manager]
/// call_timeout_ms = 60000
/// unmatched_reply = "drop"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Selected kernels.
    pub kernels: Vec<KernelKind>,
    /// Bound on waiting for each kernel's first ready signal.
    pub init_timeout_ms: Option<u64>,
    /// Settings applied to every kernel manager.
    pub manager: ManagerConfig,
}

impl OrchestratorConfig {
    /// Select `kernels` with default settings.
    pub fn with_kernels(kernels: impl IntoIterator<Item = KernelKind>) -> Self {
        Self {
            kernels: kernels.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read and parse a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// The init timeout, if any.
    pub fn init_timeout(&self) -> Option<Duration> {
        self.init_timeout_ms.map(Duration::from_millis)
    }

    /// Selected kernels in order, without duplicates.
    pub fn selection(&self) -> Vec<KernelKind> {
        let mut selected = Vec::with_capacity(self.kernels.len());
        for kind in &self.kernels {
            if !selected.contains(kind) {
                selected.push(*kind);
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrchestratorError;
    use vcad_worker::UnmatchedReplyPolicy;

    #[test]
    fn test_parse_full_config() {
        let config = OrchestratorConfig::from_toml_str(
            r#"
            kernels = ["occt", "manifold", "occt"]
            init_timeout_ms = 1500

            [manager]
            call_timeout_ms = 60000
            unmatched_reply = "fatal"
            "#,
        )
        .unwrap();
        assert_eq!(config.selection(), vec![KernelKind::Occt, KernelKind::Manifold]);
        assert_eq!(config.init_timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(config.manager.call_timeout_ms, Some(60000));
        assert_eq!(config.manager.unmatched_reply, UnmatchedReplyPolicy::Fatal);
    }

    #[test]
    fn test_empty_document_is_default() {
        let config = OrchestratorConfig::from_toml_str("").unwrap();
        assert_eq!(config, OrchestratorConfig::default());
        assert!(config.selection().is_empty());
    }

    #[test]
    fn test_unknown_kernel_is_rejected() {
        let err = OrchestratorConfig::from_toml_str(r#"kernels = ["cgal"]"#).unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigParse(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = OrchestratorConfig::load("/nonexistent/vcad-kernels.toml").unwrap_err();
        assert!(matches!(err, OrchestratorError::ConfigIo(_)));
    }
}
