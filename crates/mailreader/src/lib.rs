//! # mailreader
//!
//! Parses mail messages through an inline parser or a background worker and
//! merges the results into caller-owned records.
//!
//! ## Features
//!
//! - **Two execution modes**: Inline parsing, or delegation to a worker
//!   thread over serialized frames
//! - **Multiplexed worker**: Correlation ids let any number of calls share
//!   one worker
//! - **Accumulation**: Full-message, body-text, and attachment results are
//!   merged into [`MessageRecord`] and [`AttachmentDescriptor`]
//! - **Pluggable parser**: Any [`MimeParser`]; the default is built on
//!   `mailreader-mime`
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailreader::{Dispatcher, MessageRecord, WorkerConfig};
//!
//! #[tokio::main]
//! async fn main() -> mailreader::Result<()> {
//!     let mut dispatcher = Dispatcher::new();
//!     dispatcher.initialize_worker(WorkerConfig::new())?;
//!
//!     let mut record = MessageRecord::new();
//!     dispatcher
//!         .parse_full_message("Subject: hi\r\n\r\nHello!\r\n", &mut record)
//!         .await?;
//!     assert_eq!(record.body, "Hello!");
//!     Ok(())
//! }
//! ```
//!
//! ## Execution Modes
//!
//! ```text
//! ┌──────────────┐  context installed   ┌──────────────────┐
//! │  Dispatcher  │ ───────────────────→ │ ExecutionContext │ ──→ worker thread
//! └──────────────┘                      └──────────────────┘
//!        │ no context, worker-capable host ──→ Error::WorkerRequired
//!        │ no context, otherwise
//!        ▼
//!   MimeParser::parse (inline)
//! ```
//!
//! A host is worker-capable when the call runs on a multi-threaded tokio
//! runtime, unless [`DispatcherConfig::host_capability`] says otherwise.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod dispatcher;
mod error;
mod parser;
mod pending;
mod record;
mod request;
mod worker;

pub mod accumulator;
pub mod legacy;
pub mod protocol;

pub use config::{
    DEFAULT_QUEUE_DEPTH, DEFAULT_WORKER_NAME, DispatcherConfig, HostCapability, WorkerConfig,
    detect_worker_capability,
};
pub use dispatcher::Dispatcher;
pub use error::{Error, ParserError, Result, WorkerFault};
pub use parser::{MimeCrateParser, MimeParser, ParserFn, parser_fn};
pub use record::{AttachmentDescriptor, MessageRecord};
pub use request::{
    AttachmentFragment, FullMessageResult, OperationKind, ParseRequest, ParsedResult,
};
pub use worker::ExecutionContext;
