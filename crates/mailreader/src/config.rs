//! Dispatcher and worker configuration.

use tokio::runtime::{Handle, RuntimeFlavor};

/// Default identifier of the background worker.
pub const DEFAULT_WORKER_NAME: &str = "mailreader-worker";

/// Default number of requests that may queue up for the worker.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Whether the host can run a background worker.
///
/// A host that can, must: dispatching inline on such a host without an
/// initialized worker is reported as [`Error::WorkerRequired`](crate::Error).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostCapability {
    /// Detect at call time: a multi-threaded tokio runtime counts as capable.
    #[default]
    Detect,
    /// Always treat the host as worker-capable.
    Present,
    /// Never treat the host as worker-capable.
    Absent,
}

impl HostCapability {
    /// Resolves the capability for the current call.
    #[must_use]
    pub fn is_available(self) -> bool {
        match self {
            Self::Detect => detect_worker_capability(),
            Self::Present => true,
            Self::Absent => false,
        }
    }
}

/// Returns `true` when called on a multi-threaded tokio runtime.
#[must_use]
pub fn detect_worker_capability() -> bool {
    Handle::try_current().is_ok_and(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
}

/// Configuration of a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    /// How to decide whether the host requires a worker.
    pub host_capability: HostCapability,
}

impl DispatcherConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how host worker capability is decided.
    #[must_use]
    pub const fn host_capability(mut self, capability: HostCapability) -> Self {
        self.host_capability = capability;
        self
    }
}

/// Configuration of a background worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identifier of the worker; used as its thread name.
    pub name: String,
    /// Requests that may wait for the worker before senders are throttled.
    pub queue_depth: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_WORKER_NAME.to_string(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl WorkerConfig {
    /// Creates a worker configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for a worker with the given identifier.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the queue depth (at least 1).
    #[must_use]
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth.max(1);
        self
    }
}
