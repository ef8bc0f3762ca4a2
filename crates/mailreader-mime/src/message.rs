//! MIME node tree and decoding.

use crate::content_type::{ContentDisposition, ContentType};
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit, // Default (includes "7bit")
        }
    }
}

/// Deepest multipart nesting [`Part::parse`] accepts.
pub const MAX_NESTING_DEPTH: usize = 64;

/// A MIME node: a full RFC 822 message or any part nested inside one.
///
/// Multipart nodes keep their sub-parts in `children` and have an empty
/// `body`; every other node keeps its still-encoded body bytes.
#[derive(Debug, Clone)]
pub struct Part {
    /// Node headers.
    pub headers: Headers,
    /// Content type (defaults to `text/plain` when the header is absent).
    pub content_type: ContentType,
    /// Raw body bytes, before transfer decoding.
    pub body: Vec<u8>,
    /// Sub-parts of a multipart node, in encounter order.
    pub children: Vec<Part>,
}

impl Part {
    /// Parses a raw MIME node or RFC 822 message.
    ///
    /// The header block ends at the first empty line (CRLF or LF). Input that
    /// does not start with a header field is treated as a bare body.
    ///
    /// # Errors
    ///
    /// Returns an error for empty input, an invalid `Content-Type`, a
    /// multipart node without a usable boundary, or multiparts nested deeper
    /// than [`MAX_NESTING_DEPTH`].
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(Error::Empty);
        }
        Self::parse_node(raw, 0)
    }

    fn parse_node(raw: &str, depth: usize) -> Result<Self> {
        if depth > MAX_NESTING_DEPTH {
            return Err(Error::InvalidMultipart(format!(
                "nested deeper than {MAX_NESTING_DEPTH} levels"
            )));
        }

        let (head, body) = split_header_body(raw);
        let headers = Headers::parse(head);
        let content_type = headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::text_plain()), ContentType::parse)?;

        let mut part = Self {
            headers,
            content_type,
            body: Vec::new(),
            children: Vec::new(),
        };

        if part.content_type.is_multipart() {
            let boundary = part.content_type.boundary().ok_or(Error::MissingBoundary)?;
            part.children = split_multipart(body, boundary)?
                .into_iter()
                .map(|child| Self::parse_node(child, depth + 1))
                .collect::<Result<_>>()?;
        } else {
            part.body = body.as_bytes().to_vec();
        }

        Ok(part)
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Gets the parsed `Content-Disposition` header, if any.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
    }

    /// Checks if this is a multipart node.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.content_type.is_multipart()
    }

    /// Returns the filename from `Content-Disposition` or the `name`
    /// parameter of `Content-Type`.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.disposition()
            .and_then(|cd| cd.filename().map(str::to_string))
            .or_else(|| self.content_type.name().map(str::to_string))
            .filter(|name| !name.is_empty())
    }

    /// Checks if this leaf should be presented as an attachment rather than
    /// as message text.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        if self.is_multipart() {
            return false;
        }
        if self.disposition().is_some_and(|cd| cd.is_attachment()) || self.filename().is_some() {
            return true;
        }
        !self.content_type.is_text()
    }

    /// Returns all non-multipart nodes, depth first, in encounter order.
    #[must_use]
    pub fn leaves(&self) -> Vec<&Self> {
        let mut leaves = Vec::new();
        self.collect_leaves(&mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Self>) {
        if self.is_multipart() {
            for child in &self.children {
                child.collect_leaves(out);
            }
        } else {
            out.push(self);
        }
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&self.body),
            TransferEncoding::QuotedPrintable => decode_quoted_printable(&self.body),
            _ => Ok(self.body.clone()),
        }
    }

    /// Gets the decoded body as a string; invalid UTF-8 is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if transfer decoding fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        Ok(String::from_utf8_lossy(&decoded).into_owned())
    }

    /// Collects the readable text of this node.
    ///
    /// Inline `text/plain` leaves are joined with a newline. Without any,
    /// inline `text/html` leaves are used instead. Returns `None` if the node
    /// has no inline text at all.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding a text leaf fails.
    pub fn inline_text(&self) -> Result<Option<String>> {
        let leaves = self.leaves();
        let inline = |sub_type: &'static str| {
            leaves
                .iter()
                .copied()
                .filter(|leaf| !leaf.is_attachment() && leaf.content_type.is("text", sub_type))
                .collect::<Vec<_>>()
        };

        let mut chosen = inline("plain");
        if chosen.is_empty() {
            chosen = inline("html");
        }
        if chosen.is_empty() {
            return Ok(None);
        }

        let texts = chosen
            .into_iter()
            .map(|leaf| leaf.body_text())
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(texts.join("\n")))
    }
}

/// Splits a node into its header block and body.
fn split_header_body(raw: &str) -> (&str, &str) {
    if let Some(body) = raw.strip_prefix("\r\n").or_else(|| raw.strip_prefix('\n')) {
        return ("", body);
    }

    let first_line = raw.lines().next().unwrap_or_default();
    if !Headers::is_field_line(first_line) {
        return ("", raw);
    }

    let crlf = raw.find("\r\n\r\n").map(|at| (at, at + 4));
    let lf = raw.find("\n\n").map(|at| (at, at + 2));
    let separator = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    match separator {
        Some((head_end, body_start)) => (&raw[..head_end], &raw[body_start..]),
        None => (raw, ""),
    }
}

/// Splits a multipart body into the raw text of each sub-part.
///
/// The preamble and epilogue are discarded. The line break before each
/// delimiter belongs to the delimiter. A body missing its closing delimiter
/// keeps everything after the last delimiter as the final part.
fn split_multipart<'a>(body: &'a str, boundary: &str) -> Result<Vec<&'a str>> {
    let delimiter = format!("--{boundary}");
    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut seen_delimiter = false;
    let mut offset = 0;

    for line in body.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        let Some(rest) = line
            .trim_end_matches(['\r', '\n'])
            .strip_prefix(delimiter.as_str())
        else {
            continue;
        };
        let rest = rest.trim_end();
        let closing = rest == "--";
        if !closing && !rest.is_empty() {
            continue;
        }

        seen_delimiter = true;
        if let Some(start) = part_start.take() {
            parts.push(strip_line_break(&body[start..line_start]));
        }
        if closing {
            return Ok(parts);
        }
        part_start = Some(offset);
    }

    if !seen_delimiter {
        return Err(Error::InvalidMultipart(format!(
            "no delimiter for boundary {boundary:?}"
        )));
    }
    if let Some(start) = part_start {
        parts.push(&body[start..]);
    }
    Ok(parts)
}

fn strip_line_break(text: &str) -> &str {
    text.strip_suffix("\r\n")
        .or_else(|| text.strip_suffix('\n'))
        .unwrap_or(text)
}
