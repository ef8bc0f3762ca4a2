//! # mailreader-mime
//!
//! Decoding of raw MIME nodes and RFC 822 messages into a part tree.
//!
//! ## Features
//!
//! - **Node parsing**: Full messages or single MIME nodes, CRLF or LF line endings
//! - **Multipart**: Recursive splitting of mixed, alternative, and related bodies
//! - **Decoding**: Base64, Quoted-Printable, RFC 2047 header words
//! - **Attachments**: Disposition and filename detection
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailreader_mime::Part;
//!
//! let raw = "Content-Type: text/plain\r\n\r\nHello, World!";
//!
//! let message = Part::parse(raw)?;
//! println!("Body: {:?}", message.inline_text()?);
//! for leaf in message.leaves() {
//!     if leaf.is_attachment() {
//!         println!("{:?}: {}", leaf.filename(), leaf.content_type);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;

pub mod encoding;

pub use content_type::{ContentDisposition, ContentType, DispositionType};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{MAX_NESTING_DEPTH, Part, TransferEncoding};
