//! Merging parse results into caller-owned records.
//!
//! Merges never replace a record wholesale: full-message parses overwrite the
//! body and append attachments, body-text parses append to the body, and
//! attachment parses fill in the content of an existing descriptor.

use crate::record::{AttachmentDescriptor, MessageRecord};
use crate::request::FullMessageResult;

/// Strips every trailing line break (`\n` or `\r\n`) from the end of `text`.
///
/// Line breaks in the middle and a lone trailing `\r` are kept.
#[must_use]
pub fn trim_trailing_newlines(text: &str) -> &str {
    let mut trimmed = text;
    while let Some(rest) = trimmed.strip_suffix('\n') {
        trimmed = rest.strip_suffix('\r').unwrap_or(rest);
    }
    trimmed
}

/// Merges a full-message result.
///
/// The body is set to the trimmed text (empty if absent). Each attachment is
/// appended as a new descriptor, preserving order. An absent attachment list
/// leaves the existing attachments untouched.
pub fn merge_full_message(result: FullMessageResult, record: &mut MessageRecord) {
    let text = result.text.unwrap_or_default();
    record.body = trim_trailing_newlines(&text).to_string();

    if let Some(attachments) = result.attachments {
        record
            .attachments
            .extend(attachments.into_iter().map(AttachmentDescriptor::from));
    }
}

/// Appends trimmed body text to the record.
pub fn merge_body_text(text: &str, record: &mut MessageRecord) {
    record.body.push_str(trim_trailing_newlines(text));
}

/// Sets the attachment content verbatim.
pub fn merge_attachment(content: Vec<u8>, descriptor: &mut AttachmentDescriptor) {
    descriptor.content = content;
}
