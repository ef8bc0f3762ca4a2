//! Content-transfer-encoding and header word decoding.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 encoded words. Character
//! sets other than UTF-8 are not interpreted; decoded bytes are converted
//! lossily.

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks (`=` at end of line, optionally followed by transport
/// padding) are removed. A trailing `=` at the end of the data is a soft
/// break whose line ending was consumed by a multipart delimiter.
///
/// # Errors
///
/// Returns an error if the input contains invalid escape sequences.
pub fn decode_quoted_printable(data: &[u8]) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        if let Some(next) = soft_break_end(data, i + 1) {
            i = next;
            continue;
        }

        match data.get(i + 1..) {
            Some([hi, lo, ..]) => {
                let decoded = hex_value(*hi)
                    .zip(hex_value(*lo))
                    .map(|(hi, lo)| (hi << 4) | lo)
                    .ok_or_else(|| {
                        Error::InvalidEncoding(format!(
                            "Invalid hex escape: ={}{}",
                            char::from(*hi),
                            char::from(*lo)
                        ))
                    })?;
                result.push(decoded);
                i += 3;
            }
            _ => {
                return Err(Error::InvalidEncoding(
                    "Incomplete escape sequence".to_string(),
                ));
            }
        }
    }

    Ok(result)
}

/// If `data[start..]` is padding followed by a line ending or the end of the
/// data, returns the index just past it.
fn soft_break_end(data: &[u8], start: usize) -> Option<usize> {
    let padding = data[start..]
        .iter()
        .take_while(|&&b| b == b' ' || b == b'\t')
        .count();
    let at = start + padding;
    match &data[at..] {
        [] => Some(at),
        [b'\r', b'\n', ..] => Some(at + 2),
        [b'\n', ..] => Some(at + 1),
        _ => None,
    }
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Format: `=?charset?encoding?encoded-text?=`. Whitespace between two
/// adjacent encoded words is dropped, as RFC 2047 requires. Text outside
/// encoded words is kept as-is.
///
/// # Errors
///
/// Returns an error if an encoded word has an unknown encoding or an
/// undecodable payload.
pub fn decode_rfc2047(text: &str) -> Result<String> {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    let mut pending_space = String::new();
    let mut last_was_word = false;

    while let Some(start) = rest.find("=?") {
        let Some((word_len, decoded)) = decode_encoded_word(&rest[start..])? else {
            output.push_str(&pending_space);
            pending_space.clear();
            output.push_str(&rest[..start + 2]);
            rest = &rest[start + 2..];
            last_was_word = false;
            continue;
        };

        let between = &rest[..start];
        if !(last_was_word && between.chars().all(char::is_whitespace)) {
            output.push_str(&pending_space);
            output.push_str(between);
        }
        pending_space.clear();
        output.push_str(&decoded);
        rest = &rest[start + word_len..];
        last_was_word = true;

        let trimmed = rest.trim_start();
        pending_space.push_str(&rest[..rest.len() - trimmed.len()]);
        rest = trimmed;
    }

    output.push_str(&pending_space);
    output.push_str(rest);
    Ok(output)
}

/// Decodes a single encoded word at the start of `text`.
///
/// Returns `None` if `text` does not start with a well-formed encoded word.
fn decode_encoded_word(text: &str) -> Result<Option<(usize, String)>> {
    let inner = &text[2..];
    let mut fields = inner.splitn(3, '?');
    let (Some(_charset), Some(encoding), Some(tail)) = (fields.next(), fields.next(), fields.next())
    else {
        return Ok(None);
    };
    let Some(end) = tail.find("?=") else {
        return Ok(None);
    };
    let payload = &tail[..end];
    let word_len = text.len() - tail.len() + end + 2;

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => decode_base64(payload.as_bytes())?,
        "Q" => decode_quoted_printable(payload.replace('_', " ").as_bytes())?,
        other => {
            return Err(Error::InvalidEncoding(format!("Unknown encoding: {other}")));
        }
    };

    Ok(Some((word_len, String::from_utf8_lossy(&bytes).into_owned())))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_decode_with_line_breaks() {
        let decoded = decode_base64(b"SGVsbG8s\r\nIFdvcmxkIQ==\r\n").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_invalid() {
        assert!(matches!(
            decode_base64(b"not*base64"),
            Err(Error::Base64Decode(_))
        ));
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"Hello").unwrap(), b"Hello");
        assert_eq!(
            decode_quoted_printable(b"H=C3=A9llo").unwrap(),
            "Héllo".as_bytes()
        );
    }

    #[test]
    fn test_quoted_printable_keeps_raw_utf8() {
        assert_eq!(
            decode_quoted_printable("Grüße".as_bytes()).unwrap(),
            "Grüße".as_bytes()
        );
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        assert_eq!(
            decode_quoted_printable(b"Hello=\r\nWorld").unwrap(),
            b"HelloWorld"
        );
        assert_eq!(
            decode_quoted_printable(b"Hello=\nWorld").unwrap(),
            b"HelloWorld"
        );
    }

    #[test]
    fn test_quoted_printable_soft_break_with_padding() {
        assert_eq!(
            decode_quoted_printable(b"hello =  \r\nworld").unwrap(),
            b"hello world"
        );
        assert_eq!(
            decode_quoted_printable(b"tab=\t\nbed").unwrap(),
            b"tabbed"
        );
    }

    #[test]
    fn test_quoted_printable_trailing_soft_break() {
        assert_eq!(decode_quoted_printable(b"hello wor=").unwrap(), b"hello wor");
        assert_eq!(decode_quoted_printable(b"abc= \t").unwrap(), b"abc");
    }

    #[test]
    fn test_quoted_printable_invalid_escape() {
        assert!(decode_quoted_printable(b"=ZZ").is_err());
        assert!(decode_quoted_printable(b"abc=4").is_err());
        assert!(decode_quoted_printable(b"= x").is_err());
    }

    #[test]
    fn test_rfc2047_plain_passthrough() {
        assert_eq!(decode_rfc2047("report.pdf").unwrap(), "report.pdf");
    }

    #[test]
    fn test_rfc2047_base64_word() {
        assert_eq!(decode_rfc2047("=?utf-8?B?SMOpbGxv?=").unwrap(), "Héllo");
    }

    #[test]
    fn test_rfc2047_q_word_with_underscores() {
        assert_eq!(
            decode_rfc2047("=?utf-8?Q?H=C3=A9llo_World?=").unwrap(),
            "Héllo World"
        );
    }

    #[test]
    fn test_rfc2047_adjacent_words_join() {
        assert_eq!(
            decode_rfc2047("=?utf-8?Q?ab?= =?utf-8?Q?cd?=").unwrap(),
            "abcd"
        );
    }

    #[test]
    fn test_rfc2047_mixed_text() {
        assert_eq!(
            decode_rfc2047("Re: =?utf-8?B?SMOpbGxv?= there").unwrap(),
            "Re: Héllo there"
        );
    }

    #[test]
    fn test_rfc2047_unterminated_word_is_literal() {
        assert_eq!(decode_rfc2047("=?utf-8?B?abc").unwrap(), "=?utf-8?B?abc");
    }

    #[test]
    fn test_rfc2047_unknown_encoding() {
        assert!(decode_rfc2047("=?utf-8?X?abc?=").is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_quoted_printable_without_escapes_is_identity(text in "[^=]*") {
            proptest::prop_assert_eq!(
                decode_quoted_printable(text.as_bytes()).unwrap(),
                text.as_bytes()
            );
        }

        #[test]
        fn prop_rfc2047_plain_text_is_untouched(text in "[a-zA-Z0-9 .,:;-]*") {
            proptest::prop_assert_eq!(decode_rfc2047(&text).unwrap(), text);
        }
    }
}
