#![warn(missing_docs)]

//! Wire types for the vcad kernel worker channel.
//!
//! Every geometry kernel (OCCT, JSCAD, Manifold) runs on its own worker and is
//! reached only through messages. This crate defines what travels over that
//! channel and is shared by the main-thread manager (`vcad-worker`) and the
//! worker-side runtime (`vcad-worker-host`).
//!
//! Outbound, the manager sends an [`OutboundEnvelope`]:
//!
//! ```json
//! { "action": { "functionName": "shapes.solid.createBox", "inputs": { "width": 10 } },
//!   "uid": "call0.1234" }
//! ```
//!
//! Inbound, the worker answers with either a bare sentinel string (kernel
//! ready / kernel busy) or a reply correlated by `uid`:
//!
//! ```json
//! { "uid": "call0.1234", "result": { "type": "occ-shape", "id": 7 } }
//! { "uid": "call0.1234", "error": "function not found: foo" }
//! ```
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use vcad_worker_protocol::{InboundMessage, KernelKind};
//!
//! let msg = InboundMessage::classify(KernelKind::Occt, json!("occ-initialised")).unwrap();
//! assert_eq!(msg, InboundMessage::InitSentinel);
//! ```

pub mod error;
pub mod id;
pub mod kind;
pub mod message;
pub mod state;
pub mod transport;

pub use error::{ProtocolError, Result};
pub use id::CorrelationId;
pub use kind::{KernelKind, BUSY_SENTINEL};
pub use message::{
    CallAction, CorrelatedReply, InboundMessage, OutboundEnvelope, Outcome, CLEAN_ALL_CACHE,
    STARTED_THE_RUN,
};
pub use state::KernelState;
pub use transport::{Transport, WorkerEndpoint};
