//! Cell Implementation
//!
//! A Cell is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Cells Work
//!
//! 1. When a cell is read within a reactive context (computation/memo), the
//!    cell registers that context as a subscriber. There is no other way to
//!    subscribe: dependencies are discovered purely by reading.
//!
//! 2. When a cell's value is set, every subscriber is re-run synchronously,
//!    in the order it first subscribed, before `set` returns.
//!
//! 3. There is no batching. Two writes in a row re-run a dependent twice.
//!
//! # Memory Layout
//!
//! Each cell consists of:
//! - A unique source ID
//! - The value, behind a lock
//! - An insertion-ordered set of subscribers

use std::fmt::Debug;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::subscriber::{Source, SourceId, Subscriber, SubscriberId};

/// A reactive cell holding a value of type T.
///
/// Cloning a cell yields another handle to the same value.
///
/// # Example
///
/// ```rust,ignore
/// let count = Cell::new(0);
///
/// count.set(5);
/// count.update(|v| v + 1);
/// assert_eq!(count.get(), 6);
/// ```
pub struct Cell<T>
where
    T: Send + Sync + 'static,
{
    inner: Arc<CellInner<T>>,
}

struct CellInner<T> {
    id: SourceId,
    value: RwLock<T>,
    subscribers: RwLock<IndexMap<SubscriberId, Arc<dyn Subscriber>>>,
}

impl<T> Cell<T>
where
    T: Send + Sync + 'static,
{
    /// Create a new cell with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(CellInner {
                id: SourceId::new(),
                value: RwLock::new(value),
                subscribers: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// Get the cell's unique ID.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.read())
    }

    /// Borrow the current value without tracking the read.
    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Replace the value and re-run every subscriber.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value;
        self.notify_subscribers();
    }

    /// Update the value from the previous one and re-run every subscriber.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let next = f(&self.inner.value.read());
        self.set(next);
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }

    fn track(&self) {
        if ReactiveContext::is_active() {
            ReactiveContext::track(self.inner.clone() as Arc<dyn Source>);
        }
    }

    /// Re-run subscribers from a snapshot. No lock is held while they run,
    /// and subscribers added during the pass wait for the next write.
    fn notify_subscribers(&self) {
        let subscribers: Vec<Arc<dyn Subscriber>> =
            self.inner.subscribers.read().values().cloned().collect();

        tracing::trace!(cell = ?self.inner.id, subscribers = subscribers.len(), "cell set");

        for subscriber in subscribers {
            subscriber.notify();
        }
    }
}

impl<T> Cell<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.with_untracked(T::clone)
    }
}

impl<T> Source for CellInner<T>
where
    T: Send + Sync + 'static,
{
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.subscribers
            .write()
            .entry(subscriber.subscriber_id())
            .or_insert(subscriber);
    }

    fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().shift_remove(&id);
    }
}

impl<T> Clone for Cell<T>
where
    T: Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Cell<T>
where
    T: Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
