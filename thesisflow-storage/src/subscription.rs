//! Change subscriptions.
//!
//! A subscription delivers a snapshot on subscribe and a fresh snapshot on
//! every relevant change, until the subscriber cancels. Cancellation is
//! explicit and final: after `unsubscribe` no further snapshot is
//! observable, including snapshots already queued at cancellation time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Receiving half of a change subscription.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
    active: Arc<AtomicBool>,
}

impl<T> Subscription<T> {
    /// Pair a new subscription with its publishing handle.
    pub fn channel() -> (SubscriptionSender<T>, Subscription<T>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(true));
        (
            SubscriptionSender {
                tx,
                active: Arc::clone(&active),
            },
            Subscription { rx, active },
        )
    }

    /// Receive the next snapshot. Returns `None` once unsubscribed and the
    /// publisher is gone.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Cancel the subscription. Queued snapshots are discarded so nothing
    /// subscribed-to is observable afterwards.
    pub fn unsubscribe(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
    }

    /// Whether the subscription is still live.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Publishing half held by the store.
#[derive(Debug, Clone)]
pub struct SubscriptionSender<T> {
    tx: mpsc::UnboundedSender<T>,
    active: Arc<AtomicBool>,
}

impl<T> SubscriptionSender<T> {
    /// Deliver a snapshot. Returns false once the subscriber cancelled,
    /// letting the store prune the entry.
    pub fn send(&self, snapshot: T) -> bool {
        if !self.active.load(Ordering::SeqCst) {
            return false;
        }
        self.tx.send(snapshot).is_ok()
    }

    /// Whether the subscriber is still listening.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst) && !self.tx.is_closed()
    }
}

// ============================================================================
// TESTS
// ============================================================================
