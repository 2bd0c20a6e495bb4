//! Thread-affinity bridge.
//!
//! # Data Flow
//! ```text
//! HTTP worker
//!     → Bridge::submit (ticket into PendingTable, Notification::Ticket)
//!     → worker awaits the ticket's completion signal
//!
//! Affine thread (AffineExecutor::run / drain)
//!     → checkout ticket → run route / script / reload inside a failure boundary
//!     → complete ticket (fills result slot, fires signal)
//!
//! HTTP worker wakes
//!     → takes ticket out of the table → serializes outcome
//! ```
//!
//! # Design Decisions
//! - One executor per bridge; no process-wide singletons
//! - The executor is the only code that touches the host model, so it is
//!   the sole mutual-exclusion mechanism for it
//! - No ordering across workers: whichever notification the host loop
//!   delivers first runs first
//! - Waiting has no deadline unless `affinity.timeout_secs` is set

pub mod error;
pub mod executor;
pub mod notifier;
pub mod pending;
pub mod ticket;

use std::sync::Arc;
use std::time::{Duration, Instant};

pub use error::{BridgeError, HandlerError};
pub use executor::{AffineExecutor, ExecutorBuilder};
pub use notifier::{ChannelNotifier, HostQueue, Notification, Notifier, NotifyError};
pub use pending::PendingTable;
pub use ticket::{Operation, Outcome, Ticket, TicketId, TicketState};

use crate::config::AffinityConfig;
use crate::context::ContextMap;
use crate::observability::metrics;
use pending::PendingGuard;

/// Worker-side handle to the affine thread. Cheap to clone.
#[derive(Clone)]
pub struct Bridge {
    pending: PendingTable,
    notifier: Arc<dyn Notifier>,
    timeout: Option<Duration>,
}

impl Bridge {
    /// Create a bridge over a channel notifier.
    ///
    /// Returns the bridge and the builder the affine thread turns into its
    /// executor.
    pub fn new(config: &AffinityConfig) -> (Self, ExecutorBuilder) {
        let (notifier, queue) = ChannelNotifier::channel();
        Self::with_notifier(notifier, queue, config.timeout())
    }

    /// Create a bridge over a caller-supplied notifier, e.g. one with a waker.
    pub fn with_notifier<N>(
        notifier: N,
        queue: HostQueue,
        timeout: Option<Duration>,
    ) -> (Self, ExecutorBuilder)
    where
        N: Notifier + 'static,
    {
        let notifier: Arc<dyn Notifier> = Arc::new(notifier);
        let pending = PendingTable::new();
        let bridge = Self {
            pending: pending.clone(),
            notifier: Arc::clone(&notifier),
            timeout,
        };
        (bridge, ExecutorBuilder::new(queue, pending, notifier))
    }

    pub fn pending(&self) -> &PendingTable {
        &self.pending
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run one operation on the affine thread and wait for its outcome.
    pub async fn submit(&self, operation: Operation, context: ContextMap) -> Outcome {
        let start = Instant::now();
        let label = operation.label();
        let path = context.path().to_string();

        let (ticket, signal) = Ticket::new(path.clone(), operation, context);
        let id = ticket.id();
        self.pending.insert(ticket);
        let guard = PendingGuard::new(&self.pending, id);

        tracing::debug!(ticket = %id, path = %path, operation = label, "Ticket submitted");

        if let Err(e) = self.notifier.notify(Notification::Ticket(id)) {
            tracing::error!(ticket = %id, error = %e, "Failed to notify host");
            metrics::record_ticket(label, false, start);
            return Err(BridgeError::HostUnavailable);
        }

        let signalled = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, signal).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(ticket = %id, path = %path, waited = ?limit, "Host unresponsive, abandoning ticket");
                    metrics::record_ticket(label, false, start);
                    return Err(BridgeError::HostUnresponsive(limit));
                }
            },
            None => signal.await,
        };

        let outcome = match (signalled, guard.take().and_then(Ticket::into_outcome)) {
            (Ok(()), Some(outcome)) => outcome,
            _ => {
                tracing::error!(ticket = %id, path = %path, "Ticket dropped without completion");
                Err(BridgeError::HostUnavailable)
            }
        };

        tracing::debug!(
            ticket = %id,
            ok = outcome.is_ok(),
            elapsed = ?start.elapsed(),
            "Ticket completed"
        );
        metrics::record_ticket(label, outcome.is_ok(), start);
        outcome
    }

    /// Ask the affine thread to leave its loop.
    pub fn stop_host(&self) {
        if self.notifier.notify(Notification::Stop).is_err() {
            tracing::debug!("Host queue already closed");
        }
    }
}
