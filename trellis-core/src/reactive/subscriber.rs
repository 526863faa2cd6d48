//! Subscriber and source types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values: a
//! computation, a memo, or one of the renderers built on top of them.
//! A source is anything a subscriber can read and be notified by: a cell
//! or a memo.
//!
//! The two traits form the edges of the dependency graph. Sources hold
//! strong references to their subscribers (forward edges, used to notify),
//! and subscribers hold strong references to the sources they read in their
//! most recent run (reverse edges, used to prune stale subscriptions).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. Sources key their
/// subscriber sets by this ID, which is what makes subscription idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    /// Generate a new unique source ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

/// A computation that is re-run when one of its sources changes.
pub trait Subscriber: Send + Sync {
    /// The subscriber's unique ID.
    fn subscriber_id(&self) -> SubscriberId;

    /// Re-run the computation. Called synchronously by a changed source.
    fn notify(&self);
}

/// A reactive value that subscribers can depend on.
pub trait Source: Send + Sync {
    /// The source's unique ID.
    fn source_id(&self) -> SourceId;

    /// Add a subscriber. Adding the same subscriber twice is a no-op.
    fn subscribe(&self, subscriber: Arc<dyn Subscriber>);

    /// Remove a subscriber. Removing an absent subscriber is a no-op.
    fn unsubscribe(&self, id: SubscriberId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn source_ids_increase() {
        let first = SourceId::new();
        let second = SourceId::new();
        assert!(first < second);
    }
}
