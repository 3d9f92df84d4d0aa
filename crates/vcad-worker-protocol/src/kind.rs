//! Kernel kinds and their lifecycle sentinels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// Sentinel posted by every worker when it starts executing a call.
pub const BUSY_SENTINEL: &str = "busy";

/// The computational kernels a worker can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelKind {
    /// OpenCascade B-rep/NURBS kernel.
    Occt,
    /// JSCAD CSG kernel.
    Jscad,
    /// Manifold mesh-boolean kernel.
    Manifold,
}

impl KernelKind {
    /// All kernel kinds, in a stable order.
    pub const ALL: [KernelKind; 3] = [KernelKind::Occt, KernelKind::Jscad, KernelKind::Manifold];

    /// The literal a worker of this kind posts once it is ready.
    pub fn init_sentinel(self) -> &'static str {
        match self {
            KernelKind::Occt => "occ-initialised",
            KernelKind::Jscad => "jscad-initialised",
            KernelKind::Manifold => "manifold-initialised",
        }
    }

    /// The literal a worker of this kind posts while a call executes.
    pub fn busy_sentinel(self) -> &'static str {
        BUSY_SENTINEL
    }

    /// Short lowercase name, also used in config files.
    pub fn name(self) -> &'static str {
        match self {
            KernelKind::Occt => "occt",
            KernelKind::Jscad => "jscad",
            KernelKind::Manifold => "manifold",
        }
    }
}

impl fmt::Display for KernelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KernelKind {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "occt" | "occ" => Ok(KernelKind::Occt),
            "jscad" => Ok(KernelKind::Jscad),
            "manifold" => Ok(KernelKind::Manifold),
            other => Err(ProtocolError::Malformed(format!("unknown kernel kind: {other}"))),
        }
    }
}
