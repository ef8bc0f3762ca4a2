//! The parse dispatcher.
//!
//! A [`Dispatcher`] decides per call where a parse runs:
//!
//! 1. An [`ExecutionContext`] is installed: the request goes to its worker.
//! 2. No context, but the host can run a worker: the call fails with
//!    [`Error::WorkerRequired`] and nothing is parsed.
//! 3. Otherwise the parser runs inline.
//!
//! Results are merged into the caller's record only on success. A parser
//! panic is reported as [`Error::Delegated`] in both modes.
//!
//! # Example
//!
//! ```ignore
//! use mailreader::{Dispatcher, MessageRecord, WorkerConfig};
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.initialize_worker(WorkerConfig::named("mime-worker"))?;
//!
//! let mut record = MessageRecord::new();
//! dispatcher.parse_full_message(raw_message, &mut record).await?;
//! println!("{} attachments", record.attachments.len());
//! ```

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::accumulator::{merge_attachment, merge_body_text, merge_full_message};
use crate::config::{DispatcherConfig, WorkerConfig};
use crate::error::{Error, Result, WorkerFault};
use crate::parser::{MimeCrateParser, MimeParser};
use crate::record::{AttachmentDescriptor, MessageRecord};
use crate::request::{OperationKind, ParseRequest, ParsedResult};
use crate::worker::ExecutionContext;

/// Routes parse requests to an inline parser or a background worker and
/// merges the results.
#[derive(Clone)]
pub struct Dispatcher {
    parser: Arc<dyn MimeParser>,
    context: Option<ExecutionContext>,
    config: DispatcherConfig,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("context", &self.context)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates a dispatcher using the default MIME parser.
    #[must_use]
    pub fn new() -> Self {
        Self::with_parser(MimeCrateParser)
    }

    /// Creates a dispatcher using a custom parser.
    #[must_use]
    pub fn with_parser(parser: impl MimeParser) -> Self {
        Self {
            parser: Arc::new(parser),
            context: None,
            config: DispatcherConfig::default(),
        }
    }

    /// Sets the dispatcher configuration.
    #[must_use]
    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses an existing execution context, which may be shared with other
    /// dispatchers.
    #[must_use]
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Starts a background worker running this dispatcher's parser and
    /// routes all further calls to it.
    ///
    /// Replaces any previously installed context. Calls already dispatched
    /// on the previous context still complete there.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker cannot be started; the previous
    /// context, if any, stays installed.
    pub fn initialize_worker(&mut self, config: WorkerConfig) -> Result<&ExecutionContext> {
        let context = ExecutionContext::start(config, Arc::clone(&self.parser))?;

        if let Some(previous) = self.context.take() {
            let in_flight = previous.in_flight();
            if in_flight > 0 {
                warn!(
                    previous = previous.name(),
                    in_flight, "replacing worker with requests in flight"
                );
            } else {
                debug!(previous = previous.name(), "replacing worker");
            }
        }

        Ok(self.context.insert(context))
    }

    /// Returns the installed execution context, if any.
    #[must_use]
    pub const fn context(&self) -> Option<&ExecutionContext> {
        self.context.as_ref()
    }

    /// Returns the dispatcher configuration.
    #[must_use]
    pub const fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Parses a complete message and merges it into `record`.
    ///
    /// The body is replaced by the message text and the message's
    /// attachments are appended to the existing ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the parse cannot run or fails. `record` is left
    /// untouched in that case.
    pub async fn parse_full_message(
        &self,
        raw: impl Into<String>,
        record: &mut MessageRecord,
    ) -> Result<()> {
        match self.execute(ParseRequest::full_message(raw)).await? {
            ParsedResult::FullMessage(result) => {
                merge_full_message(result, record);
                Ok(())
            }
            other => Err(mismatch(OperationKind::FullMessage, &other)),
        }
    }

    /// Parses a text node and appends its text to `record.body`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parse cannot run or fails. `record` is left
    /// untouched in that case.
    pub async fn parse_body_text(
        &self,
        raw: impl Into<String>,
        record: &mut MessageRecord,
    ) -> Result<()> {
        match self.execute(ParseRequest::body_text(raw)).await? {
            ParsedResult::BodyText(text) => {
                merge_body_text(&text, record);
                Ok(())
            }
            other => Err(mismatch(OperationKind::BodyText, &other)),
        }
    }

    /// Parses an attachment node and stores its content in `descriptor`.
    ///
    /// # Errors
    ///
    /// Returns an error if the parse cannot run or fails. `descriptor` is
    /// left untouched in that case.
    pub async fn parse_attachment(
        &self,
        raw: impl Into<String>,
        descriptor: &mut AttachmentDescriptor,
    ) -> Result<()> {
        match self.execute(ParseRequest::attachment(raw)).await? {
            ParsedResult::Attachment(content) => {
                merge_attachment(content, descriptor);
                Ok(())
            }
            other => Err(mismatch(OperationKind::Attachment, &other)),
        }
    }

    async fn execute(&self, request: ParseRequest) -> Result<ParsedResult> {
        let kind = request.kind();

        if let Some(context) = &self.context {
            trace!(worker = context.name(), %kind, "parsing on worker");
            // Keep the context alive for this call even if it is replaced.
            let context = context.clone();
            return context.execute(request).await;
        }

        if self.config.host_capability.is_available() {
            warn!(%kind, "host can run a worker but none is initialized");
            return Err(Error::WorkerRequired);
        }

        trace!(%kind, "parsing inline");
        match panic::catch_unwind(AssertUnwindSafe(|| self.parser.parse(&request))) {
            Ok(result) => result.map_err(Error::from),
            Err(payload) => {
                let fault = WorkerFault::from_panic(payload.as_ref());
                warn!(%kind, %fault, "inline parser panicked");
                Err(Error::Delegated(fault))
            }
        }
    }
}

fn mismatch(expected: OperationKind, got: &ParsedResult) -> Error {
    Error::Protocol(format!(
        "expected a {expected} result, got {}",
        got.kind()
    ))
}
