//! Parse requests and the results a parser hands back.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::base64_bytes;

/// The three kinds of parse the dispatcher offers.
///
/// Serialized with the method names used on the worker wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// A complete RFC 822 message: text plus attachments.
    #[serde(rename = "parseRfc")]
    FullMessage,
    /// A single text node.
    #[serde(rename = "parseText")]
    BodyText,
    /// A single attachment node.
    #[serde(rename = "parseAttachment")]
    Attachment,
}

impl OperationKind {
    /// Returns the wire method name.
    #[must_use]
    pub const fn method(self) -> &'static str {
        match self {
            Self::FullMessage => "parseRfc",
            Self::BodyText => "parseText",
            Self::Attachment => "parseAttachment",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method())
    }
}

/// A single parse to perform.
///
/// Immutable once built; the call that creates it owns it until the matching
/// response arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseRequest {
    #[serde(rename = "method")]
    kind: OperationKind,
    raw: String,
}

impl ParseRequest {
    /// Creates a request of the given kind.
    #[must_use]
    pub fn new(kind: OperationKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
        }
    }

    /// Creates a full-message request.
    #[must_use]
    pub fn full_message(raw: impl Into<String>) -> Self {
        Self::new(OperationKind::FullMessage, raw)
    }

    /// Creates a body-text request.
    #[must_use]
    pub fn body_text(raw: impl Into<String>) -> Self {
        Self::new(OperationKind::BodyText, raw)
    }

    /// Creates an attachment request.
    #[must_use]
    pub fn attachment(raw: impl Into<String>) -> Self {
        Self::new(OperationKind::Attachment, raw)
    }

    /// Returns the operation kind.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Returns the raw MIME text.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// An attachment found while parsing a full message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentFragment {
    /// File name from the message, or one generated by the parser.
    pub generated_file_name: String,
    /// Decoded size in bytes.
    pub length: usize,
    /// MIME type, e.g. `image/png`.
    pub content_type: String,
    /// Decoded content.
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
}

/// Output of a full-message parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullMessageResult {
    /// Readable body text, if the message has any.
    #[serde(default)]
    pub text: Option<String>,
    /// Attachments in encounter order, if the parser reported any list.
    #[serde(default)]
    pub attachments: Option<Vec<AttachmentFragment>>,
}

/// Parser output, one variant per operation kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum ParsedResult {
    /// Result of [`OperationKind::FullMessage`].
    FullMessage(FullMessageResult),
    /// Result of [`OperationKind::BodyText`].
    BodyText(String),
    /// Result of [`OperationKind::Attachment`].
    Attachment(#[serde(with = "base64_bytes")] Vec<u8>),
}

impl ParsedResult {
    /// Returns the operation kind this result answers.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::FullMessage(_) => OperationKind::FullMessage,
            Self::BodyText(_) => OperationKind::BodyText,
            Self::Attachment(_) => OperationKind::Attachment,
        }
    }
}
