//! `Content-Type` and `Content-Disposition` header values.

use crate::encoding::decode_rfc2047;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;

/// MIME content type with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx).
    pub parameters: HashMap<String, String>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: HashMap::new(),
        }
    }

    /// The RFC 2045 default for parts without a `Content-Type` header.
    #[must_use]
    pub fn text_plain() -> Self {
        let mut ct = Self::new("text", "plain");
        ct.parameters
            .insert("charset".to_string(), "us-ascii".to_string());
        ct
    }

    /// Returns the `type/subtype` essence without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.parameters.get("charset").map(String::as_str)
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameters.get("boundary").map(String::as_str)
    }

    /// Returns the legacy `name` parameter some mailers use for filenames.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.parameters.get("name").map(String::as_str)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }

    /// Checks if this is a text content type.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("text")
    }

    /// Checks for an exact `type/subtype` match, ignoring case.
    #[must_use]
    pub fn is(&self, main_type: &str, sub_type: &str) -> bool {
        self.main_type.eq_ignore_ascii_case(main_type)
            && self.sub_type.eq_ignore_ascii_case(sub_type)
    }

    /// Parses a content type string.
    ///
    /// Format: `type/subtype; param1=value1; param2="value 2"`
    ///
    /// # Errors
    ///
    /// Returns an error if the type or subtype is missing.
    pub fn parse(s: &str) -> Result<Self> {
        let (type_str, params) = split_value(s);

        let (main_type, sub_type) = type_str
            .split_once('/')
            .ok_or_else(|| Error::InvalidContentType(format!("Missing subtype in {s:?}")))?;

        let main_type = main_type.trim().to_lowercase();
        let sub_type = sub_type.trim().to_lowercase();
        if main_type.is_empty() || sub_type.is_empty() {
            return Err(Error::InvalidContentType(format!("Empty type in {s:?}")));
        }

        Ok(Self {
            main_type,
            sub_type,
            parameters: params,
        })
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.main_type, self.sub_type)
    }
}

/// Disposition type of a MIME part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispositionType {
    /// Displayed as part of the message body.
    Inline,
    /// Presented as a separate file.
    Attachment,
    /// Any other (unrecognized) disposition.
    Other,
}

/// Parsed `Content-Disposition` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type.
    pub disposition: DispositionType,
    /// Parameters (e.g., filename, size).
    pub parameters: HashMap<String, String>,
}

impl ContentDisposition {
    /// Parses a content disposition string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (kind, parameters) = split_value(s);
        let disposition = match kind.to_ascii_lowercase().as_str() {
            "inline" => DispositionType::Inline,
            "attachment" => DispositionType::Attachment,
            _ => DispositionType::Other,
        };
        Self {
            disposition,
            parameters,
        }
    }

    /// Returns the filename parameter if present.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.parameters.get("filename").map(String::as_str)
    }

    /// Checks if the part is meant to be saved rather than displayed.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition == DispositionType::Attachment
    }
}

/// Splits a structured header value into its leading token and parameters.
///
/// Semicolons inside quoted strings do not split. Parameter names are
/// lowercased and values are unquoted and RFC 2047 decoded.
fn split_value(s: &str) -> (String, HashMap<String, String>) {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;

    for ch in s.chars() {
        match ch {
            _ if escaped => {
                current.push(ch);
                escaped = false;
            }
            '\\' if quoted => escaped = true,
            '"' => {
                quoted = !quoted;
                current.push(ch);
            }
            ';' if !quoted => segments.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    segments.push(current);

    let mut segments = segments.into_iter();
    let head = segments.next().unwrap_or_default().trim().to_string();

    let mut parameters = HashMap::new();
    for param in segments {
        if let Some((key, value)) = param.trim().split_once('=') {
            let key = key.trim().to_lowercase();
            let value = value.trim().trim_matches('"');
            let value = decode_rfc2047(value).unwrap_or_else(|_| value.to_string());
            parameters.insert(key, value);
        }
    }

    (head, parameters)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_text_plain_default() {
        let ct = ContentType::text_plain();
        assert!(ct.is("text", "plain"));
        assert_eq!(ct.charset(), Some("us-ascii"));
    }

    #[test]
    fn test_content_type_parse() {
        let ct = ContentType::parse("Text/Plain; charset=utf-8").unwrap();
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert_eq!(ct.charset(), Some("utf-8"));
        assert!(ct.is_text());
    }

    #[test]
    fn test_content_type_parse_quoted_boundary() {
        let ct = ContentType::parse("multipart/mixed; boundary=\"----=_Part;123\"").unwrap();
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), Some("----=_Part;123"));
    }

    #[test]
    fn test_content_type_parse_missing_subtype() {
        assert!(matches!(
            ContentType::parse("text"),
            Err(Error::InvalidContentType(_))
        ));
        assert!(ContentType::parse("/plain").is_err());
    }

    #[test]
    fn test_content_type_name_parameter() {
        let ct = ContentType::parse("image/png; name=\"=?utf-8?Q?b=C3=A4r.png?=\"").unwrap();
        assert_eq!(ct.name(), Some("bär.png"));
        assert_eq!(ct.essence(), "image/png");
    }

    #[test]
    fn test_content_type_display() {
        let ct = ContentType::parse("image/png; name=a.png").unwrap();
        assert_eq!(ct.to_string(), "image/png");
    }

    #[test]
    fn test_disposition_attachment() {
        let cd = ContentDisposition::parse("attachment; filename=\"report 1.pdf\"");
        assert!(cd.is_attachment());
        assert_eq!(cd.filename(), Some("report 1.pdf"));
    }

    #[test]
    fn test_disposition_inline_and_unknown() {
        assert_eq!(
            ContentDisposition::parse("INLINE").disposition,
            DispositionType::Inline
        );
        assert_eq!(
            ContentDisposition::parse("form-data; name=x").disposition,
            DispositionType::Other
        );
    }
}
