//! Cross-thread notification into the affine thread.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::bridge::ticket::TicketId;

/// Messages delivered to the affine thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// A ticket is waiting in the pending table.
    Ticket(TicketId),
    /// Replace the HTTP listener.
    RestartListener,
    /// Leave the host loop.
    Stop,
}

#[derive(Debug, Error)]
#[error("host queue is closed")]
pub struct NotifyError;

/// Posts notifications to the affine thread. Callable from any thread.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

type Waker = Box<dyn Fn() + Send + Sync>;

/// Notifier backed by an unbounded channel.
///
/// Hosts whose event loop must be poked through a native marshalling call
/// (posting a window message, firing a custom event) attach it as a waker;
/// it runs after every successful send.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
    waker: Option<Waker>,
}

impl ChannelNotifier {
    /// Create a notifier and the queue the affine thread drains.
    pub fn channel() -> (Self, HostQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, waker: None }, HostQueue { rx })
    }

    pub fn with_waker<F>(mut self, waker: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.waker = Some(Box::new(waker));
        self
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.tx.send(notification).map_err(|_| NotifyError)?;
        if let Some(waker) = &self.waker {
            waker();
        }
        Ok(())
    }
}

/// Receiving end, owned by the affine thread.
#[derive(Debug)]
pub struct HostQueue {
    rx: mpsc::UnboundedReceiver<Notification>,
}

impl HostQueue {
    /// Next queued notification without blocking.
    pub fn try_next(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }

    /// Block the calling thread until a notification arrives.
    ///
    /// Returns `None` once every notifier is dropped. Must not be called
    /// from inside an async runtime.
    pub fn next_blocking(&mut self) -> Option<Notification> {
        self.rx.blocking_recv()
    }

    /// Refuse further notifications; already queued ones can still be read.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn waker_runs_per_notification() {
        let woken = Arc::new(AtomicUsize::new(0));
        let counter = woken.clone();
        let (notifier, mut queue) = ChannelNotifier::channel();
        let notifier = notifier.with_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        notifier.notify(Notification::RestartListener).unwrap();
        notifier.notify(Notification::Stop).unwrap();

        assert_eq!(woken.load(Ordering::SeqCst), 2);
        assert_eq!(queue.try_next(), Some(Notification::RestartListener));
        assert_eq!(queue.try_next(), Some(Notification::Stop));
        assert_eq!(queue.try_next(), None);
    }

    #[test]
    fn notify_fails_once_queue_is_dropped() {
        let (notifier, queue) = ChannelNotifier::channel();
        drop(queue);
        assert!(notifier.notify(Notification::Stop).is_err());
    }
}
