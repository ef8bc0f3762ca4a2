//! Background execution context.
//!
//! An [`ExecutionContext`] owns one worker thread running a [`MimeParser`].
//! The caller side and the worker only exchange serialized frames:
//!
//! ```text
//!  caller ──RequestFrame──▶ [bounded queue] ──▶ worker thread
//!                                                    │ parse
//!  pending table ◀── router task ◀──ResponseFrame────┘
//! ```
//!
//! The router task completes pending calls by request id, so any number of
//! calls may be in flight on one context. When the worker stops, every call
//! still pending fails with a [`WorkerFault`].

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::thread;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::WorkerConfig;
use crate::error::{Error, Result, WorkerFault};
use crate::parser::MimeParser;
use crate::pending::{PendingGuard, PendingTable, lock};
use crate::protocol::{
    self, Outcome, RequestFrame, RequestIdGenerator, ResponseFrame, decode_request,
    decode_response, encode_response,
};
use crate::request::{ParseRequest, ParsedResult};

/// Handle to a running background worker.
///
/// Cheap to clone; all clones share one worker. The worker thread exits once
/// the last clone is dropped and its queue has drained.
#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    requests: mpsc::Sender<String>,
    pending: Arc<Mutex<PendingTable>>,
    ids: RequestIdGenerator,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("name", &self.inner.name)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    /// Starts a worker thread running `parser`.
    ///
    /// Must be called from within a tokio runtime, which hosts the task that
    /// routes responses back to callers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRuntime`] outside a runtime, or
    /// [`Error::Delegated`] if the worker thread cannot be spawned.
    pub fn start(config: WorkerConfig, parser: Arc<dyn MimeParser>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let (request_tx, request_rx) = mpsc::channel(config.queue_depth);
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(PendingTable::default()));

        let worker_name = config.name.clone();
        thread::Builder::new()
            .name(config.name.clone())
            .spawn(move || run_worker(&worker_name, parser.as_ref(), request_rx, &response_tx))
            .map_err(|e| {
                Error::Delegated(WorkerFault::at_caller(format!(
                    "failed to spawn worker {}: {e}",
                    config.name
                )))
            })?;

        runtime.spawn(route_responses(
            config.name.clone(),
            response_rx,
            Arc::clone(&pending),
        ));

        info!(worker = %config.name, queue_depth = config.queue_depth, "worker started");

        Ok(Self {
            inner: Arc::new(Inner {
                name: config.name,
                requests: request_tx,
                pending,
                ids: RequestIdGenerator::new(),
            }),
        })
    }

    /// Returns the worker identifier.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the number of calls waiting for a response.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        lock(&self.inner.pending).in_flight_count()
    }

    /// Sends a request to the worker and waits for its correlated response.
    ///
    /// There is no timeout. Dropping the returned future abandons the call;
    /// a late response for it is discarded.
    pub(crate) async fn execute(&self, request: ParseRequest) -> Result<ParsedResult> {
        let id = self.inner.ids.next();
        let kind = request.kind();
        let frame = protocol::encode_request(&RequestFrame { id, request })
            .map_err(|e| Error::Protocol(format!("failed to encode {kind} request: {e}")))?;

        let receiver = lock(&self.inner.pending).register(id, kind);
        let guard = PendingGuard::new(&self.inner.pending, id);
        debug!(worker = %self.inner.name, id, %kind, "dispatching request");

        if self.inner.requests.send(frame).await.is_err() {
            return Err(Error::Delegated(WorkerFault::at_caller(format!(
                "worker {} is not running",
                self.inner.name
            ))));
        }

        let outcome = receiver.await.map_err(|_| {
            Error::Delegated(WorkerFault::at_caller(format!(
                "worker {} dropped request {id}",
                self.inner.name
            )))
        })?;
        guard.disarm();

        match outcome {
            Outcome::Ok { result } => Ok(result),
            Outcome::ParserError { error } => Err(Error::Parser(error)),
            Outcome::Fault { fault } => Err(Error::Delegated(fault)),
        }
    }
}

/// Worker thread body: decode, parse, encode, repeat until the queue closes.
fn run_worker(
    name: &str,
    parser: &dyn MimeParser,
    mut requests: mpsc::Receiver<String>,
    responses: &mpsc::UnboundedSender<String>,
) {
    debug!(worker = name, "worker thread running");

    while let Some(frame) = requests.blocking_recv() {
        let response = handle_frame(parser, &frame);
        if responses.send(encode_response(&response)).is_err() {
            warn!(worker = name, "response router gone, stopping worker");
            break;
        }
    }

    debug!(worker = name, "worker thread stopped");
}

/// Answers one request frame. Parser panics become faults.
fn handle_frame(parser: &dyn MimeParser, frame: &str) -> ResponseFrame {
    let request = match decode_request(frame) {
        Ok(request) => request,
        Err((id, fault)) => {
            warn!(?id, %fault, "rejecting undecodable request");
            return ResponseFrame {
                id,
                outcome: Outcome::Fault { fault },
            };
        }
    };

    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| parser.parse(&request.request))) {
        Ok(Ok(result)) => Outcome::Ok { result },
        Ok(Err(error)) => Outcome::ParserError { error },
        Err(payload) => {
            let fault = WorkerFault::from_panic(payload.as_ref());
            warn!(id = request.id, %fault, "parser panicked");
            Outcome::Fault { fault }
        }
    };

    ResponseFrame {
        id: Some(request.id),
        outcome,
    }
}

/// Routes response frames to their pending callers.
async fn route_responses(
    name: String,
    mut responses: mpsc::UnboundedReceiver<String>,
    pending: Arc<Mutex<PendingTable>>,
) {
    while let Some(frame) = responses.recv().await {
        let (id, outcome) = match decode_response(&frame) {
            Ok(ResponseFrame { id, outcome }) => (id, outcome),
            Err((id, fault)) => (id, Outcome::Fault { fault }),
        };

        match id {
            Some(id) => {
                if !lock(&pending).complete(id, outcome) {
                    debug!(worker = %name, id, "discarding response for abandoned request");
                }
            }
            None => warn!(worker = %name, ?outcome, "discarding uncorrelated response"),
        }
    }

    let fault = WorkerFault::at_caller(format!("worker {name} terminated"));
    let failed = lock(&pending).fail_all(&fault);
    if failed > 0 {
        warn!(worker = %name, failed, "worker terminated with requests in flight");
    }
    info!(worker = %name, "worker stopped");
}
