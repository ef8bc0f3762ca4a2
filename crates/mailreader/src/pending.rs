//! Correlation table for delegated requests.
//!
//! Each delegated call registers its request id here before the request is
//! sent, then waits on the returned receiver. The response router completes
//! entries by id, so responses may arrive in any order.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::error::WorkerFault;
use crate::protocol::{Outcome, RequestId};
use crate::request::OperationKind;

struct Waiter {
    kind: OperationKind,
    reply: oneshot::Sender<Outcome>,
}

/// Requests sent to the worker that have not been answered yet.
#[derive(Default)]
pub(crate) struct PendingTable {
    waiting: HashMap<RequestId, Waiter>,
}

impl PendingTable {
    /// Registers a request and returns where its outcome will be delivered.
    pub fn register(&mut self, id: RequestId, kind: OperationKind) -> oneshot::Receiver<Outcome> {
        let (reply, receiver) = oneshot::channel();
        if self.waiting.insert(id, Waiter { kind, reply }).is_some() {
            tracing::warn!(id, "request id registered twice, dropping the older waiter");
        }
        receiver
    }

    /// Delivers an outcome to the waiter for `id`.
    ///
    /// Returns `true` if the id was pending, `false` otherwise.
    pub fn complete(&mut self, id: RequestId, outcome: Outcome) -> bool {
        let Some(waiter) = self.waiting.remove(&id) else {
            return false;
        };
        tracing::trace!(id, kind = %waiter.kind, "request completed");
        // The caller may have stopped waiting in the meantime.
        let _ = waiter.reply.send(outcome);
        true
    }

    /// Forgets a request without answering it.
    pub fn cancel(&mut self, id: RequestId) -> bool {
        self.waiting.remove(&id).is_some()
    }

    /// Fails every pending request with the same fault.
    ///
    /// Returns how many requests were failed.
    pub fn fail_all(&mut self, fault: &WorkerFault) -> usize {
        let count = self.waiting.len();
        for (id, waiter) in self.waiting.drain() {
            tracing::debug!(id, kind = %waiter.kind, "failing pending request");
            let _ = waiter.reply.send(Outcome::Fault {
                fault: fault.clone(),
            });
        }
        count
    }

    /// Returns the number of requests currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.waiting.len()
    }

    /// Checks if a request is currently in flight.
    #[cfg(test)]
    pub fn is_in_flight(&self, id: RequestId) -> bool {
        self.waiting.contains_key(&id)
    }
}

/// Locks the table, recovering it if a previous holder panicked.
///
/// No operation leaves the table half-updated, so a poisoned lock is safe to
/// keep using.
pub(crate) fn lock(table: &Mutex<PendingTable>) -> MutexGuard<'_, PendingTable> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a request from the table if its caller stops waiting early.
pub(crate) struct PendingGuard<'a> {
    table: &'a Mutex<PendingTable>,
    id: RequestId,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    pub fn new(table: &'a Mutex<PendingTable>, id: RequestId) -> Self {
        Self {
            table,
            id,
            armed: true,
        }
    }

    /// Keeps the entry; it has already been completed.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed && lock(self.table).cancel(self.id) {
            tracing::debug!(id = self.id, "caller stopped waiting, request abandoned");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::request::ParsedResult;

    fn ok_text(text: &str) -> Outcome {
        Outcome::Ok {
            result: ParsedResult::BodyText(text.to_string()),
        }
    }

    #[tokio::test]
    async fn test_complete_out_of_order() {
        let mut table = PendingTable::default();
        let first = table.register(1, OperationKind::BodyText);
        let second = table.register(2, OperationKind::BodyText);
        assert_eq!(table.in_flight_count(), 2);

        assert!(table.complete(2, ok_text("two")));
        assert!(table.complete(1, ok_text("one")));
        assert_eq!(table.in_flight_count(), 0);

        assert_eq!(first.await.unwrap(), ok_text("one"));
        assert_eq!(second.await.unwrap(), ok_text("two"));
    }

    #[test]
    fn test_complete_unknown_id() {
        let mut table = PendingTable::default();
        assert!(!table.complete(42, ok_text("late")));
    }

    #[test]
    fn test_complete_twice() {
        let mut table = PendingTable::default();
        let _receiver = table.register(1, OperationKind::Attachment);
        assert!(table.complete(1, ok_text("once")));
        assert!(!table.complete(1, ok_text("twice")));
    }

    #[test]
    fn test_complete_after_receiver_dropped() {
        let mut table = PendingTable::default();
        drop(table.register(1, OperationKind::FullMessage));
        assert!(table.complete(1, ok_text("nobody listening")));
    }

    #[tokio::test]
    async fn test_fail_all() {
        let mut table = PendingTable::default();
        let first = table.register(1, OperationKind::BodyText);
        let second = table.register(2, OperationKind::FullMessage);

        assert_eq!(table.fail_all(&WorkerFault::new("gone")), 2);
        assert_eq!(table.in_flight_count(), 0);

        for receiver in [first, second] {
            let Outcome::Fault { fault } = receiver.await.unwrap() else {
                panic!("expected fault");
            };
            assert_eq!(fault.message, "gone");
        }
    }

    #[test]
    fn test_guard_cancels_on_drop() {
        let table = Mutex::new(PendingTable::default());
        let _receiver = lock(&table).register(5, OperationKind::BodyText);
        {
            let _guard = PendingGuard::new(&table, 5);
        }
        assert!(!lock(&table).is_in_flight(5));
    }

    #[test]
    fn test_disarmed_guard_keeps_table() {
        let table = Mutex::new(PendingTable::default());
        let _receiver = lock(&table).register(6, OperationKind::BodyText);
        PendingGuard::new(&table, 6).disarm();
        assert!(lock(&table).is_in_flight(6));
    }
}
