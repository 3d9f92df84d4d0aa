//! Correlation identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token pairing an outbound call with its inbound reply.
///
/// The worker echoes it back verbatim. Only uniqueness among the calls that
/// are currently pending on one manager matters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Wrap an existing identifier (e.g. one received from the worker).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build the id for the `sequence`-th call of a manager.
    ///
    /// The format is `call{sequence}.{nnnn}`; the numeric suffix is random and
    /// only makes ids harder to confuse across managers, the sequence number
    /// alone keeps them unique.
    pub fn sequenced(sequence: u64) -> Self {
        let salt = uuid::Uuid::new_v4().as_u128() % 10_000;
        Self(format!("call{sequence}.{salt}"))
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequenced_format() {
        let id = CorrelationId::sequenced(0);
        let (prefix, salt) = id.as_str().split_once('.').unwrap();
        assert_eq!(prefix, "call0");
        assert!(salt.parse::<u32>().unwrap() < 10_000);
    }

    #[test]
    fn test_sequenced_ids_are_distinct() {
        let ids: HashSet<_> = (0..1000).map(CorrelationId::sequenced).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = CorrelationId::new("call3.42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"call3.42\"");
    }
}
