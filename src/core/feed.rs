//! Change feed - push notifications that a ledger collection changed.
//!
//! [`crate::service::Ledger`] publishes the [`Collection`] each write touched. A
//! [`Subscription`] waits for its collection and re-runs a loader, so readers get a
//! fresh snapshot on every change instead of polling. Dropping a subscription
//! unsubscribes it.

use crate::errors::Result;
use std::future::Future;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

/// Default capacity of the notification channel.
pub const DEFAULT_FEED_CAPACITY: usize = 256;

/// Ledger collections a subscriber can watch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Day records and counters
    Attendance,
    /// Fee payment events
    Payments,
    /// Items, transactions, holdings and refunds
    Inventory,
    /// Expense lines
    Expenses,
    /// Students and teachers
    Directory,
    /// Terms and the active term pointer
    Terms,
}

/// Broadcasts collection changes to every live subscription.
#[derive(Clone, Debug)]
pub struct ChangeFeed {
    tx: broadcast::Sender<Collection>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl ChangeFeed {
    /// Creates a feed buffering up to `capacity` notifications per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Announces a change; returns how many subscriptions were notified.
    pub fn publish(&self, collection: Collection) -> usize {
        // No live receivers is not an error for a notification
        self.tx.send(collection).unwrap_or(0)
    }

    /// Watches one collection from now on.
    #[must_use]
    pub fn subscribe(&self, collection: Collection) -> Subscription {
        Subscription {
            collection,
            rx: self.tx.subscribe(),
        }
    }

    /// Number of live subscriptions
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// A live watch on one collection.
#[derive(Debug)]
pub struct Subscription {
    collection: Collection,
    rx: broadcast::Receiver<Collection>,
}

impl Subscription {
    /// The watched collection
    #[must_use]
    pub const fn collection(&self) -> Collection {
        self.collection
    }

    /// Waits for the next change to the watched collection.
    ///
    /// Returns `false` once every publisher is gone. Missed notifications count as
    /// a change since the reader must reload anyway.
    pub async fn changed(&mut self) -> bool {
        loop {
            match self.rx.recv().await {
                Ok(collection) if collection == self.collection => return true,
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!("{:?} subscription lagged by {skipped}", self.collection);
                    return true;
                }
                Err(RecvError::Closed) => return false,
            }
        }
    }

    /// Waits for the next change and returns what `load` reads afterwards, or
    /// `None` once the feed is closed.
    pub async fn next_snapshot<T, F, Fut>(&mut self, load: F) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.changed().await {
            return Ok(None);
        }
        load().await.map(Some)
    }
}
