//! Simplified entry point that calls the parser directly.
//!
//! No worker, no merge step: each body part is parsed in order and the raw
//! parser outputs are returned.

use tracing::debug;

use crate::error::Result;
use crate::parser::MimeParser;
use crate::request::{ParseRequest, ParsedResult};

/// Input of [`parse`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Parts to parse, in order.
    pub body_parts: Vec<ParseRequest>,
}

impl ParseOptions {
    /// Creates options for the given parts.
    #[must_use]
    pub const fn new(body_parts: Vec<ParseRequest>) -> Self {
        Self { body_parts }
    }
}

/// Parses every body part with `parser`.
///
/// # Errors
///
/// Stops at the first part the parser rejects and returns its error.
pub fn parse(parser: &dyn MimeParser, options: &ParseOptions) -> Result<Vec<ParsedResult>> {
    debug!(parts = options.body_parts.len(), "parsing body parts directly");
    options
        .body_parts
        .iter()
        .map(|part| parser.parse(part).map_err(Into::into))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::parser::MimeCrateParser;

    #[test]
    fn test_parse_in_order() {
        let options = ParseOptions::new(vec![
            ParseRequest::body_text("Content-Type: text/plain\r\n\r\nfirst\r\n"),
            ParseRequest::attachment("Content-Type: application/octet-stream\r\n\r\nbytes"),
        ]);

        let results = parse(&MimeCrateParser, &options).unwrap();
        assert_eq!(
            results,
            vec![
                ParsedResult::BodyText("first\r\n".to_string()),
                ParsedResult::Attachment(b"bytes".to_vec()),
            ]
        );
    }

    #[test]
    fn test_parse_stops_at_first_error() {
        let options = ParseOptions::new(vec![
            ParseRequest::body_text("Content-Type: text/plain\r\n\r\nok"),
            ParseRequest::full_message(""),
        ]);
        assert!(matches!(
            parse(&MimeCrateParser, &options),
            Err(Error::Parser(_))
        ));
    }

    #[test]
    fn test_parse_nothing() {
        assert!(parse(&MimeCrateParser, &ParseOptions::default()).unwrap().is_empty());
    }
}
