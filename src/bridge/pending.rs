//! The pending table shared by HTTP workers and the affine thread.

use std::sync::Arc;

use dashmap::DashMap;

use crate::bridge::ticket::{Operation, Outcome, Ticket, TicketId, TicketState};
use crate::context::ContextMap;
use crate::observability::metrics;

/// Concurrent map from ticket id to ticket.
///
/// Workers insert and take; the affine thread checks out and completes.
/// A ticket lives here from submission until its owning worker takes it.
#[derive(Debug, Clone, Default)]
pub struct PendingTable {
    inner: Arc<DashMap<TicketId, Ticket>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, ticket: Ticket) {
        self.inner.insert(ticket.id(), ticket);
        metrics::record_pending(self.inner.len());
    }

    /// Copy out what the affine thread needs to run a ticket.
    ///
    /// The shard lock is released before returning so the handler runs
    /// without blocking inserts from other workers.
    pub fn checkout(&self, id: &TicketId) -> Option<(String, Operation, Arc<ContextMap>)> {
        self.inner.get(id).map(|t| {
            (
                t.path().to_string(),
                t.operation().clone(),
                Arc::clone(t.context()),
            )
        })
    }

    /// Fill a ticket's result slot and wake its worker.
    ///
    /// An already completed ticket is left for its worker to take. A ticket
    /// whose waiter is already gone is dropped from the table here, since no
    /// worker will come back for it.
    pub fn complete(&self, id: &TicketId, outcome: Outcome) -> bool {
        let delivered = match self.inner.get_mut(id) {
            Some(ticket) if ticket.state() == TicketState::Completed => return false,
            Some(mut ticket) => ticket.complete(outcome),
            None => return false,
        };
        if !delivered {
            self.take(id);
        }
        delivered
    }

    /// Remove a ticket. Succeeds at most once per id.
    pub fn take(&self, id: &TicketId) -> Option<Ticket> {
        let ticket = self.inner.remove(id).map(|(_, t)| t);
        metrics::record_pending(self.inner.len());
        ticket
    }

    /// Complete every ticket still waiting with `outcome`.
    ///
    /// Used when the affine thread goes away for good, so no worker waits on
    /// a ticket nobody will run. Returns how many waiters were woken.
    pub fn fail_all(&self, outcome: impl Fn() -> Outcome) -> usize {
        let ids: Vec<TicketId> = self.inner.iter().map(|entry| *entry.key()).collect();
        ids.iter().filter(|id| self.complete(id, outcome())).count()
    }

    pub fn contains(&self, id: &TicketId) -> bool {
        self.inner.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Removes a worker's ticket from the table when dropped.
///
/// Covers the paths where the request future is abandoned before it
/// consumes its ticket.
pub(crate) struct PendingGuard<'a> {
    table: &'a PendingTable,
    id: TicketId,
    armed: bool,
}

impl<'a> PendingGuard<'a> {
    pub(crate) fn new(table: &'a PendingTable, id: TicketId) -> Self {
        Self {
            table,
            id,
            armed: true,
        }
    }

    pub(crate) fn take(mut self) -> Option<Ticket> {
        self.armed = false;
        self.table.take(&self.id)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.table.take(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeError;
    use crate::http::Reply;
    use serde_json::json;

    #[test]
    fn take_happens_at_most_once() {
        let table = PendingTable::new();
        let (ticket, _rx) = Ticket::new("/status", Operation::Route, ContextMap::default());
        let id = ticket.id();
        table.insert(ticket);

        assert!(table.contains(&id));
        assert!(table.take(&id).is_some());
        assert!(table.take(&id).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn complete_fills_slot_for_waiting_worker() {
        let table = PendingTable::new();
        let (ticket, mut rx) = Ticket::new("/status", Operation::Route, ContextMap::default());
        let id = ticket.id();
        table.insert(ticket);

        let (path, op, _) = table.checkout(&id).unwrap();
        assert_eq!(path, "/status");
        assert_eq!(op, Operation::Route);

        assert!(table.complete(&id, Ok(Reply::Json(json!("done")))));
        assert!(rx.try_recv().is_ok());
        let outcome = table.take(&id).unwrap().into_outcome().unwrap();
        assert_eq!(outcome.unwrap(), Reply::Json(json!("done")));
    }

    #[test]
    fn complete_drops_abandoned_ticket() {
        let table = PendingTable::new();
        let (ticket, rx) = Ticket::new("/status", Operation::Route, ContextMap::default());
        let id = ticket.id();
        table.insert(ticket);
        drop(rx);

        assert!(!table.complete(&id, Err(BridgeError::HostUnavailable)));
        assert!(table.is_empty());
    }

    #[test]
    fn fail_all_wakes_every_waiter() {
        let table = PendingTable::new();
        let (first, mut first_rx) = Ticket::new("/a", Operation::Route, ContextMap::default());
        let (second, second_rx) = Ticket::new("/b", Operation::Route, ContextMap::default());
        let first_id = first.id();
        table.insert(first);
        table.insert(second);
        drop(second_rx);

        assert_eq!(table.fail_all(|| Err(BridgeError::HostUnavailable)), 1);
        assert!(first_rx.try_recv().is_ok());
        let outcome = table.take(&first_id).and_then(Ticket::into_outcome).unwrap();
        assert!(matches!(outcome, Err(BridgeError::HostUnavailable)));
        assert!(table.is_empty());
    }

    #[test]
    fn second_completion_keeps_first_outcome() {
        let table = PendingTable::new();
        let (ticket, mut rx) = Ticket::new("/a", Operation::Route, ContextMap::default());
        let id = ticket.id();
        table.insert(ticket);

        assert!(table.complete(&id, Ok(Reply::Json(json!("first")))));
        assert!(!table.complete(&id, Err(BridgeError::HostUnavailable)));
        assert_eq!(table.fail_all(|| Err(BridgeError::HostUnavailable)), 0);

        assert!(rx.try_recv().is_ok());
        let outcome = table.take(&id).and_then(Ticket::into_outcome).unwrap();
        assert_eq!(outcome.unwrap(), Reply::Json(json!("first")));
    }

    #[test]
    fn complete_unknown_ticket_is_noop() {
        let table = PendingTable::new();
        assert!(!table.complete(&TicketId::new(), Err(BridgeError::HostUnavailable)));
    }

    #[test]
    fn guard_removes_on_drop_unless_taken() {
        let table = PendingTable::new();
        let (ticket, _rx) = Ticket::new("/a", Operation::Route, ContextMap::default());
        let id = ticket.id();
        table.insert(ticket);
        drop(PendingGuard::new(&table, id));
        assert!(!table.contains(&id));

        let (ticket, _rx) = Ticket::new("/b", Operation::Route, ContextMap::default());
        let id = ticket.id();
        table.insert(ticket);
        let guard = PendingGuard::new(&table, id);
        assert!(guard.take().is_some());
        assert!(table.is_empty());
    }
}
