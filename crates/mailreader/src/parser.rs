//! The parser capability the dispatcher delegates to.

use std::fmt;

use mailreader_mime::Part;

use crate::error::ParserError;
use crate::request::{
    AttachmentFragment, FullMessageResult, OperationKind, ParseRequest, ParsedResult,
};

/// Turns raw MIME text into a [`ParsedResult`].
///
/// Implementations must answer a request with the result variant matching
/// [`ParseRequest::kind`]. The same implementation is used inline and inside
/// the background worker.
pub trait MimeParser: Send + Sync + 'static {
    /// Parses one request.
    ///
    /// # Errors
    ///
    /// Returns a [`ParserError`] if the input cannot be parsed.
    fn parse(&self, request: &ParseRequest) -> Result<ParsedResult, ParserError>;
}

/// A [`MimeParser`] backed by a closure. Built with [`parser_fn`].
#[derive(Clone, Copy)]
pub struct ParserFn<F> {
    f: F,
}

impl<F> fmt::Debug for ParserFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserFn").finish_non_exhaustive()
    }
}

/// Wraps a closure as a [`MimeParser`].
pub const fn parser_fn<F>(f: F) -> ParserFn<F>
where
    F: Fn(&ParseRequest) -> Result<ParsedResult, ParserError> + Send + Sync + 'static,
{
    ParserFn { f }
}

impl<F> MimeParser for ParserFn<F>
where
    F: Fn(&ParseRequest) -> Result<ParsedResult, ParserError> + Send + Sync + 'static,
{
    fn parse(&self, request: &ParseRequest) -> Result<ParsedResult, ParserError> {
        (self.f)(request)
    }
}

/// The default parser, built on `mailreader-mime`.
///
/// - Full messages: inline text leaves become the text, every attachment
///   leaf becomes a fragment. Unnamed attachments are called
///   `attachment-N.<subtype>`, counting from 1.
/// - Body text: the decoded text of the node.
/// - Attachments: the decoded bytes of the node.
#[derive(Debug, Default, Clone, Copy)]
pub struct MimeCrateParser;

impl MimeParser for MimeCrateParser {
    fn parse(&self, request: &ParseRequest) -> Result<ParsedResult, ParserError> {
        let node = Part::parse(request.raw())?;

        match request.kind() {
            OperationKind::FullMessage => full_message(&node).map(ParsedResult::FullMessage),
            OperationKind::BodyText => {
                let text = if node.is_multipart() {
                    node.inline_text()?.unwrap_or_default()
                } else {
                    node.body_text()?
                };
                Ok(ParsedResult::BodyText(text))
            }
            OperationKind::Attachment => {
                if node.is_multipart() {
                    return Err(ParserError::new(format!(
                        "attachment node is {}, not a single part",
                        node.content_type
                    )));
                }
                Ok(ParsedResult::Attachment(node.decode_body()?))
            }
        }
    }
}

fn full_message(message: &Part) -> Result<FullMessageResult, ParserError> {
    let mut attachments = Vec::new();

    for leaf in message.leaves().into_iter().filter(|leaf| leaf.is_attachment()) {
        let content = leaf.decode_body()?;
        let generated_file_name = leaf
            .filename()
            .unwrap_or_else(|| generated_name(attachments.len() + 1, &leaf.content_type.sub_type));

        attachments.push(AttachmentFragment {
            generated_file_name,
            length: content.len(),
            content_type: leaf.content_type.essence(),
            content,
        });
    }

    Ok(FullMessageResult {
        text: message.inline_text()?,
        attachments: Some(attachments),
    })
}

fn generated_name(index: usize, sub_type: &str) -> String {
    let usable = !sub_type.is_empty()
        && sub_type != "octet-stream"
        && sub_type.bytes().all(|b| b.is_ascii_alphanumeric());
    let extension = if usable { sub_type } else { "bin" };
    format!("attachment-{index}.{extension}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MESSAGE: &str = concat!(
        "From: sender@example.com\r\n",
        "Content-Type: multipart/mixed; boundary=frontier\r\n",
        "\r\n",
        "--frontier\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "Hello there\r\n",
        "\r\n",
        "--frontier\r\n",
        "Content-Type: application/pdf\r\n",
        "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "JVBERg==\r\n",
        "--frontier\r\n",
        "Content-Type: image/png\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "iVBORw0K\r\n",
        "--frontier\r\n",
        "Content-Type: application/octet-stream\r\n",
        "\r\n",
        "raw\r\n",
        "--frontier--\r\n",
    );

    fn parse(request: &ParseRequest) -> ParsedResult {
        MimeCrateParser.parse(request).unwrap()
    }

    #[test]
    fn test_full_message() {
        let ParsedResult::FullMessage(result) = parse(&ParseRequest::full_message(MESSAGE)) else {
            panic!("wrong result kind");
        };

        assert_eq!(result.text.as_deref(), Some("Hello there\r\n"));
        let attachments = result.attachments.unwrap();
        assert_eq!(attachments.len(), 3);

        assert_eq!(attachments[0].generated_file_name, "report.pdf");
        assert_eq!(attachments[0].content_type, "application/pdf");
        assert_eq!(attachments[0].content, b"%PDF");
        assert_eq!(attachments[0].length, 4);

        assert_eq!(attachments[1].generated_file_name, "attachment-2.png");
        assert_eq!(attachments[1].content, b"\x89PNG\r\n");

        assert_eq!(attachments[2].generated_file_name, "attachment-3.bin");
        assert_eq!(attachments[2].content, b"raw");
    }

    #[test]
    fn test_full_message_without_attachments() {
        let raw = "Subject: hi\r\n\r\nJust text\r\n";
        let ParsedResult::FullMessage(result) = parse(&ParseRequest::full_message(raw)) else {
            panic!("wrong result kind");
        };
        assert_eq!(result.text.as_deref(), Some("Just text\r\n"));
        assert_eq!(result.attachments, Some(Vec::new()));
    }

    #[test]
    fn test_body_text_node() {
        let raw = "Content-Type: text/plain\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\nsoft=\r\nbreak\r\n";
        assert_eq!(
            parse(&ParseRequest::body_text(raw)),
            ParsedResult::BodyText("softbreak\r\n".to_string())
        );
    }

    #[test]
    fn test_body_text_multipart_node() {
        assert_eq!(
            parse(&ParseRequest::body_text(MESSAGE)),
            ParsedResult::BodyText("Hello there\r\n".to_string())
        );
    }

    #[test]
    fn test_attachment_node() {
        let raw = "Content-Type: image/png\r\nContent-Transfer-Encoding: base64\r\n\r\niVBO\r\nRw0K\r\n";
        assert_eq!(
            parse(&ParseRequest::attachment(raw)),
            ParsedResult::Attachment(b"\x89PNG\r\n".to_vec())
        );
    }

    #[test]
    fn test_attachment_multipart_node_rejected() {
        let err = MimeCrateParser
            .parse(&ParseRequest::attachment(MESSAGE))
            .unwrap_err();
        assert!(err.message.contains("multipart/mixed"));
    }

    #[test]
    fn test_empty_input_is_parser_error() {
        let err = MimeCrateParser
            .parse(&ParseRequest::full_message(""))
            .unwrap_err();
        assert_eq!(err.message, "Empty MIME input");
    }

    #[test]
    fn test_invalid_base64_attachment_is_parser_error() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\n",
            "\n",
            "--b\n",
            "Content-Type: image/png\n",
            "Content-Transfer-Encoding: base64\n",
            "\n",
            "*** not base64 ***\n",
            "--b--\n",
        );
        assert!(MimeCrateParser.parse(&ParseRequest::full_message(raw)).is_err());
    }

    #[test]
    fn test_full_message_soft_break_before_delimiter() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "hello wor=\r\n",
            "--b--\r\n",
        );
        let ParsedResult::FullMessage(result) = parse(&ParseRequest::full_message(raw)) else {
            panic!("wrong result kind");
        };
        assert_eq!(result.text.as_deref(), Some("hello wor"));
    }

    #[test]
    fn test_body_text_padded_soft_break() {
        let raw = "Content-Type: text/plain\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\nhello =  \r\nworld\r\n";
        assert_eq!(
            parse(&ParseRequest::body_text(raw)),
            ParsedResult::BodyText("hello world\r\n".to_string())
        );
    }

    #[test]
    fn test_deep_nesting_is_parser_error() {
        let mut raw = String::new();
        for level in 0..10_000 {
            raw.push_str(&format!("Content-Type: multipart/mixed; boundary=n{level}\n\n--n{level}\n"));
        }
        raw.push_str("leaf\n");
        let err = MimeCrateParser
            .parse(&ParseRequest::full_message(raw))
            .unwrap_err();
        assert!(err.message.contains("nested deeper than"));
    }

    #[test]
    fn test_generated_name() {
        assert_eq!(generated_name(1, "png"), "attachment-1.png");
        assert_eq!(generated_name(2, "octet-stream"), "attachment-2.bin");
        assert_eq!(generated_name(3, "vnd.ms-excel"), "attachment-3.bin");
    }

    #[test]
    fn test_parser_fn() {
        let parser = parser_fn(|request: &ParseRequest| {
            Ok(ParsedResult::BodyText(request.raw().to_uppercase()))
        });
        assert_eq!(
            parser.parse(&ParseRequest::body_text("abc")).unwrap(),
            ParsedResult::BodyText("ABC".to_string())
        );
    }
}
