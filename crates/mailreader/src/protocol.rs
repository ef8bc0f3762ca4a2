//! Wire frames exchanged with the background worker.
//!
//! Every frame is a JSON object. Requests carry a correlation id so that
//! responses can be matched to their caller regardless of completion order:
//!
//! ```text
//! → {"id":7,"method":"parseText","raw":"Content-Type: text/plain\r\n\r\nhi"}
//! ← {"id":7,"status":"ok","result":{"kind":"bodyText","value":"hi"}}
//! ← {"id":7,"status":"parser_error","error":{"message":"..."}}
//! ← {"id":null,"status":"fault","fault":{"message":"...","line":1,"column":9}}
//! ```
//!
//! Binary content is carried as base64 strings.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::error::{ParserError, WorkerFault};
use crate::request::{ParseRequest, ParsedResult};

/// Correlation id attached to every delegated request.
pub type RequestId = u64;

/// Generates unique, increasing request ids.
#[derive(Debug, Default)]
pub struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    /// Creates a generator starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Returns the next id.
    #[must_use]
    pub fn next(&self) -> RequestId {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns how many ids have been handed out.
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

/// A request as sent to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFrame {
    /// Correlation id.
    pub id: RequestId,
    /// The parse to perform.
    #[serde(flatten)]
    pub request: ParseRequest,
}

/// A response as sent back by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFrame {
    /// Correlation id of the request, `None` if it could not be recovered.
    pub id: Option<RequestId>,
    /// What happened.
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Outcome of one delegated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The parser succeeded.
    Ok {
        /// Parser output.
        result: ParsedResult,
    },
    /// The parser rejected the input.
    ParserError {
        /// Parser failure, unchanged.
        error: ParserError,
    },
    /// The worker itself failed.
    Fault {
        /// Diagnostic context.
        fault: WorkerFault,
    },
}

/// Just enough of any frame to recover its id.
#[derive(Deserialize)]
struct FrameId {
    id: Option<RequestId>,
}

/// Serializes a request frame.
///
/// # Errors
///
/// Returns the serializer error if the frame cannot be encoded.
pub fn encode_request(frame: &RequestFrame) -> serde_json::Result<String> {
    serde_json::to_string(frame)
}

/// Serializes a response frame.
///
/// A response that cannot be encoded is replaced by a fault response for
/// the same id, so the waiting caller is always answered.
#[must_use]
pub fn encode_response(frame: &ResponseFrame) -> String {
    serde_json::to_string(frame).unwrap_or_else(|err| {
        let fallback = ResponseFrame {
            id: frame.id,
            outcome: Outcome::Fault {
                fault: WorkerFault::at_caller(format!("unencodable response: {err}")),
            },
        };
        serde_json::to_string(&fallback).unwrap_or_default()
    })
}

/// Deserializes a request frame.
///
/// # Errors
///
/// Returns the recovered id (if any) and a fault pointing into the frame.
pub fn decode_request(
    frame: &str,
) -> std::result::Result<RequestFrame, (Option<RequestId>, WorkerFault)> {
    serde_json::from_str(frame)
        .map_err(|err| (recover_id(frame), WorkerFault::undecodable("request", &err)))
}

/// Deserializes a response frame.
///
/// # Errors
///
/// Returns the recovered id (if any) and a fault pointing into the frame.
pub fn decode_response(
    frame: &str,
) -> std::result::Result<ResponseFrame, (Option<RequestId>, WorkerFault)> {
    serde_json::from_str(frame)
        .map_err(|err| (recover_id(frame), WorkerFault::undecodable("response", &err)))
}

fn recover_id(frame: &str) -> Option<RequestId> {
    serde_json::from_str::<FrameId>(frame)
        .ok()
        .and_then(|frame| frame.id)
}

/// Serde adapter carrying byte buffers as base64 strings.
pub(crate) mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
