//! Status-change subscribers and where their handlers run.

use crate::models::GameStatusChange;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::warn;

/// Callback invoked for every status change.
pub type StatusHandler = Arc<dyn Fn(GameStatusChange) + Send + Sync>;

/// Handle returned by [`StatusSubscribers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Registered-callback list.
///
/// Handlers are invoked outside the internal lock, so a handler may
/// subscribe or unsubscribe (itself included) while being notified.
#[derive(Default)]
pub struct StatusSubscribers {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(SubscriptionId, StatusHandler)>>,
}

impl StatusSubscribers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, StatusHandler)>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(GameStatusChange) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(handler)));
        id
    }

    /// Returns `false` if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Deliver changes in order to every handler registered right now.
    ///
    /// A panicking handler is logged and skipped; the others still run.
    pub fn notify(&self, changes: &[GameStatusChange]) {
        let handlers: Vec<StatusHandler> = self.lock().iter().map(|(_, h)| Arc::clone(h)).collect();
        for change in changes {
            for handler in &handlers {
                if catch_unwind(AssertUnwindSafe(|| handler(*change))).is_err() {
                    warn!(
                        "Status handler panicked for game {} (running: {})",
                        change.game_id, change.is_running
                    );
                }
            }
        }
    }
}

impl fmt::Debug for StatusSubscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusSubscribers")
            .field("handlers", &self.len())
            .finish()
    }
}

/// One batch of notifications, ready to run.
pub type Delivery = Box<dyn FnOnce() + Send>;

/// Decides on which thread subscriber handlers run.
pub trait EventDispatcher: Send + Sync {
    fn dispatch(&self, delivery: Delivery);
}

/// Runs handlers immediately on the polling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl EventDispatcher for InlineDispatcher {
    fn dispatch(&self, delivery: Delivery) {
        delivery();
    }
}

/// Queues deliveries for another context (a UI loop, a dedicated task).
///
/// The owner of the paired [`DispatchQueue`] decides when handlers run.
/// Deliveries keep their submission order.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl ChannelDispatcher {
    pub fn channel() -> (Self, DispatchQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, DispatchQueue { rx })
    }
}

impl EventDispatcher for ChannelDispatcher {
    fn dispatch(&self, delivery: Delivery) {
        if self.tx.send(delivery).is_err() {
            warn!("Dispatch queue closed; dropping status notifications");
        }
    }
}

/// Receiving half of a [`ChannelDispatcher`].
pub struct DispatchQueue {
    rx: mpsc::UnboundedReceiver<Delivery>,
}

impl DispatchQueue {
    /// Run every delivery already queued and return how many ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(delivery) = self.rx.try_recv() {
            delivery();
            ran += 1;
        }
        ran
    }

    /// Wait for the next delivery and run it. Returns `false` once every
    /// dispatcher has been dropped.
    pub async fn run_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(delivery) => {
                delivery();
                true
            }
            None => false,
        }
    }

    /// Run deliveries until every dispatcher has been dropped.
    pub async fn run(mut self) {
        while self.run_next().await {}
    }
}

impl fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchQueue").finish_non_exhaustive()
    }
}
