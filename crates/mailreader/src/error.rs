//! Error types for dispatching and merging.

use std::any::Any;
use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while dispatching a parse.
#[derive(Debug, Error)]
pub enum Error {
    /// The host can run a worker but none was initialized.
    #[error("worker required but not initialized")]
    WorkerRequired,

    /// The parser panicked or the background worker reported a fault.
    #[error("delegated execution failed: {0}")]
    Delegated(WorkerFault),

    /// The parser rejected the input.
    #[error("parser error: {0}")]
    Parser(#[from] ParserError),

    /// The result did not match the requested operation.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A worker can only be started from within a tokio runtime.
    #[error("no tokio runtime available to start the worker")]
    NoRuntime,
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure reported by a [`MimeParser`](crate::MimeParser).
///
/// Parser errors cross the worker boundary as-is, so the value seen by the
/// caller is the same whether the parse ran inline or delegated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct ParserError {
    /// Human-readable description from the parser.
    pub message: String,
}

impl ParserError {
    /// Creates a parser error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<mailreader_mime::Error> for ParserError {
    fn from(err: mailreader_mime::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Diagnostic context for a fault inside the background worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerFault {
    /// What went wrong.
    pub message: String,
    /// Source file (or frame) the fault points at, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Line number, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Column number, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl WorkerFault {
    /// Creates a fault with no location information.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
            column: None,
        }
    }

    /// Creates a fault located at the calling source line.
    #[must_use]
    #[track_caller]
    pub fn at_caller(message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            message: message.into(),
            file: Some(location.file().to_string()),
            line: Some(location.line()),
            column: Some(location.column()),
        }
    }

    /// Describes a frame that could not be decoded, pointing at the
    /// offending position inside it.
    pub(crate) fn undecodable(frame: &str, err: &serde_json::Error) -> Self {
        Self {
            message: format!("undecodable {frame} frame: {err}"),
            file: Some(format!("<{frame} frame>")),
            line: u32::try_from(err.line()).ok(),
            column: u32::try_from(err.column()).ok(),
        }
    }

    /// Describes a panic caught while the parser was running.
    pub(crate) fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::new(format!("parser panicked: {detail}"))
    }
}

impl fmt::Display for WorkerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => {
                write!(f, "{file}:{line}")?;
                if let Some(column) = self.column {
                    write!(f, ":{column}")?;
                }
                write!(f, ": {}", self.message)
            }
            (Some(file), None) => write!(f, "{file}: {}", self.message),
            _ => f.write_str(&self.message),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display_with_location() {
        let fault = WorkerFault {
            message: "boom".to_string(),
            file: Some("worker.rs".to_string()),
            line: Some(12),
            column: Some(4),
        };
        assert_eq!(fault.to_string(), "worker.rs:12:4: boom");
    }

    #[test]
    fn test_fault_display_without_location() {
        assert_eq!(WorkerFault::new("boom").to_string(), "boom");
    }

    #[test]
    fn test_fault_at_caller_records_this_file() {
        let fault = WorkerFault::at_caller("here");
        assert_eq!(fault.file.as_deref(), Some(file!()));
        assert!(fault.line.is_some());
    }

    #[test]
    fn test_fault_from_panic_payloads() {
        let fault = WorkerFault::from_panic(&"static message");
        assert_eq!(fault.message, "parser panicked: static message");

        let owned: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        let fault = WorkerFault::from_panic(owned.as_ref());
        assert_eq!(fault.message, "parser panicked: owned message");
    }

    #[test]
    fn test_undecodable_points_into_frame() {
        let err = serde_json::from_str::<serde_json::Value>("{\n  \"id\": }").unwrap_err();
        let fault = WorkerFault::undecodable("request", &err);
        assert_eq!(fault.file.as_deref(), Some("<request frame>"));
        assert_eq!(fault.line, Some(2));
        assert!(fault.column.is_some());
    }

    #[test]
    fn test_parser_error_from_mime() {
        let err = ParserError::from(mailreader_mime::Error::MissingBoundary);
        assert_eq!(err.message, "Missing boundary in multipart message");
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::WorkerRequired.to_string(),
            "worker required but not initialized"
        );
        assert_eq!(
            Error::Parser(ParserError::new("bad input")).to_string(),
            "parser error: bad input"
        );
    }
}
