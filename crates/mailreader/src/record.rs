//! Caller-owned records that parse results are merged into.

use crate::request::AttachmentFragment;

/// A mail message being assembled from parse results.
///
/// Both fields start empty and are only ever extended or overwritten by the
/// accumulator, never dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageRecord {
    /// Body text accumulated so far.
    pub body: String,
    /// Attachments in the order they were encountered.
    pub attachments: Vec<AttachmentDescriptor>,
}

impl MessageRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record with existing body text.
    #[must_use]
    pub fn with_body(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            attachments: Vec::new(),
        }
    }
}

/// An attachment of a [`MessageRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentDescriptor {
    /// File name.
    pub filename: String,
    /// Size in bytes.
    pub filesize: usize,
    /// MIME type.
    pub mime_type: String,
    /// Decoded content; empty until fetched.
    pub content: Vec<u8>,
}

impl AttachmentDescriptor {
    /// Creates a descriptor whose content has not been fetched yet.
    #[must_use]
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            filesize: 0,
            mime_type: mime_type.into(),
            content: Vec::new(),
        }
    }
}

impl From<AttachmentFragment> for AttachmentDescriptor {
    fn from(fragment: AttachmentFragment) -> Self {
        Self {
            filename: fragment.generated_file_name,
            filesize: fragment.length,
            mime_type: fragment.content_type,
            content: fragment.content,
        }
    }
}
