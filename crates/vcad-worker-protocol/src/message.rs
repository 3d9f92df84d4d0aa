//! Outbound call envelopes and inbound worker messages.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ProtocolError, Result};
use crate::id::CorrelationId;
use crate::kind::KernelKind;

/// Function name that marks the start of a new top-level run.
pub const STARTED_THE_RUN: &str = "startedTheRun";

/// Function name that evicts cache entries the latest run did not touch.
pub const CLEAN_ALL_CACHE: &str = "cleanAllCache";

/// The operation a call asks the kernel to perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAction {
    /// Dotted kernel function path, e.g. `shapes.solid.createBox`.
    pub function_name: String,
    /// Function arguments, usually a JSON object.
    pub inputs: Value,
}

/// One outbound call: `{ action: { functionName, inputs }, uid }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEnvelope {
    /// What to run.
    pub action: CallAction,
    /// Correlation id the worker must echo back.
    pub uid: CorrelationId,
}

impl OutboundEnvelope {
    /// Create an envelope for `function_name` with `inputs`.
    pub fn new(uid: CorrelationId, function_name: impl Into<String>, inputs: Value) -> Self {
        Self {
            action: CallAction {
                function_name: function_name.into(),
                inputs,
            },
            uid,
        }
    }

    /// Encode as the JSON value posted on the channel.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a JSON value received on the worker side.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// How a correlated call ended on the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The kernel returned a value.
    Success(Value),
    /// The kernel raised an error.
    Failure(String),
}

/// A reply addressed to one pending call.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedReply {
    /// Id of the call this answers.
    pub uid: CorrelationId,
    /// Result or error.
    pub outcome: Outcome,
}

impl CorrelatedReply {
    /// Successful reply carrying `result`.
    pub fn success(uid: CorrelationId, result: Value) -> Self {
        Self {
            uid,
            outcome: Outcome::Success(result),
        }
    }

    /// Failed reply carrying `error`.
    pub fn failure(uid: CorrelationId, error: impl Into<String>) -> Self {
        Self {
            uid,
            outcome: Outcome::Failure(error.into()),
        }
    }

    /// Encode as `{uid, result}` or `{uid, error}`.
    pub fn to_value(&self) -> Value {
        match &self.outcome {
            Outcome::Success(result) => json!({ "uid": self.uid, "result": result }),
            Outcome::Failure(error) => json!({ "uid": self.uid, "error": error }),
        }
    }

    fn from_object(mut object: Map<String, Value>) -> Result<Self> {
        let uid = match object.remove("uid") {
            Some(Value::String(uid)) => CorrelationId::new(uid),
            Some(other) => {
                return Err(ProtocolError::Malformed(format!("uid is not a string: {other}")))
            }
            None => return Err(ProtocolError::Malformed("reply without uid".into())),
        };

        match (object.remove("result"), object.remove("error")) {
            (Some(result), None) => Ok(Self::success(uid, result)),
            (None, Some(Value::String(error))) => Ok(Self::failure(uid, error)),
            (None, Some(other)) => Ok(Self::failure(uid, other.to_string())),
            (Some(_), Some(_)) => Err(ProtocolError::MalformedReply {
                uid,
                reason: "both result and error present".into(),
            }),
            (None, None) => Err(ProtocolError::MalformedReply {
                uid,
                reason: "neither result nor error present".into(),
            }),
        }
    }
}

/// Any message a worker can post to its manager.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// The kernel finished loading and accepts calls.
    InitSentinel,
    /// The kernel started executing a call.
    BusySentinel,
    /// Result or error of a specific call.
    Correlated(CorrelatedReply),
}

impl InboundMessage {
    /// Sort a raw channel message into sentinel or correlated reply.
    ///
    /// Sentinels are matched against `kind`'s literals, so an init sentinel
    /// belonging to a different kernel is rejected as malformed.
    pub fn classify(kind: KernelKind, raw: Value) -> Result<Self> {
        match raw {
            Value::String(text) if text == kind.init_sentinel() => Ok(Self::InitSentinel),
            Value::String(text) if text == kind.busy_sentinel() => Ok(Self::BusySentinel),
            Value::String(text) => Err(ProtocolError::Malformed(format!(
                "unknown {kind} sentinel: {text:?}"
            ))),
            Value::Object(object) => Ok(Self::Correlated(CorrelatedReply::from_object(object)?)),
            other => Err(ProtocolError::Malformed(format!(
                "unexpected message shape: {other}"
            ))),
        }
    }

    /// Encode for posting from the worker side.
    pub fn to_value(&self, kind: KernelKind) -> Value {
        match self {
            Self::InitSentinel => Value::String(kind.init_sentinel().to_string()),
            Self::BusySentinel => Value::String(kind.busy_sentinel().to_string()),
            Self::Correlated(reply) => reply.to_value(),
        }
    }
}
