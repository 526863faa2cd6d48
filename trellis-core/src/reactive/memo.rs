//! Memo Implementation
//!
//! A Memo is a cached derived value. It is both a subscriber (it reads cells)
//! and a source (computations read it).
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation and caches the result.
//!
//! 2. When accessed again while clean, it returns the cached value.
//!
//! 3. When a dependency changes and nothing reads the memo, it is only
//!    marked dirty; the next access recomputes.
//!
//! 4. When a dependency changes and the memo has dependents, it recomputes
//!    right away and re-runs its dependents only if the value actually
//!    changed. This is why `T` must be `PartialEq`.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use super::context::{run_tracked, Dependencies, ReactiveContext};
use super::subscriber::{Source, SourceId, Subscriber, SubscriberId};

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// The memo needs to recompute before its value can be read.
    Dirty,
}

/// A cached derived value that recomputes only when dependencies change.
///
/// # Example
///
/// ```rust,ignore
/// let count = Cell::new(2);
/// let c = count.clone();
/// let doubled = Memo::new(move || c.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// ```
pub struct Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<MemoInner<T>>,
}

struct MemoInner<T> {
    source_id: SourceId,
    subscriber_id: SubscriberId,
    this: Weak<MemoInner<T>>,

    /// The computation function.
    compute: Box<dyn Fn() -> T + Send + Sync>,

    /// The cached value (None if never computed).
    value: RwLock<Option<T>>,

    /// Current dirty state.
    state: RwLock<MemoState>,

    /// Sources read during the most recent computation.
    sources: Mutex<Dependencies>,

    /// Subscribers that read this memo.
    dependents: RwLock<IndexMap<SubscriberId, Arc<dyn Subscriber>>>,
}

impl<T> Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new memo with the given computation function.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new_cyclic(|this| MemoInner {
                source_id: SourceId::new(),
                subscriber_id: SubscriberId::new(),
                this: this.clone(),
                compute: Box::new(compute),
                value: RwLock::new(None),
                state: RwLock::new(MemoState::Dirty),
                sources: Mutex::new(Dependencies::new()),
                dependents: RwLock::new(IndexMap::new()),
            }),
        }
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        if ReactiveContext::is_active() {
            ReactiveContext::track(self.inner.clone() as Arc<dyn Source>);
        }

        if self.state() == MemoState::Clean {
            if let Some(value) = self.inner.value.read().clone() {
                return value;
            }
        }
        self.inner.recompute().0
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        *self.inner.state.read()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }
}

impl<T> MemoInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Recompute the value, returning it and whether it changed.
    fn recompute(&self) -> (T, bool) {
        let value = match self.this.upgrade() {
            Some(this) => run_tracked(this, &self.sources, || (self.compute)()),
            None => (self.compute)(),
        };

        let changed = self.value.read().as_ref() != Some(&value);
        *self.value.write() = Some(value.clone());
        *self.state.write() = MemoState::Clean;

        (value, changed)
    }
}

impl<T> Subscriber for MemoInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn notify(&self) {
        let dependents: Vec<Arc<dyn Subscriber>> =
            self.dependents.read().values().cloned().collect();

        if dependents.is_empty() {
            *self.state.write() = MemoState::Dirty;
            return;
        }

        let (_, changed) = self.recompute();
        if changed {
            for dependent in dependents {
                dependent.notify();
            }
        }
    }
}

impl<T> Source for MemoInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn source_id(&self) -> SourceId {
        self.source_id
    }

    fn subscribe(&self, subscriber: Arc<dyn Subscriber>) {
        self.dependents
            .write()
            .entry(subscriber.subscriber_id())
            .or_insert(subscriber);
    }

    fn unsubscribe(&self, id: SubscriberId) {
        self.dependents.write().shift_remove(&id);
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Memo<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("id", &self.inner.source_id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependent_count", &self.inner.dependents.read().len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
