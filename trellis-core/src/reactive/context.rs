//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a cell is read,
//! the current computation is registered as a subscriber of that cell.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a memo or computation), we
//! push an entry onto the stack. When the guard is dropped, we pop it. Because
//! the pop happens in `Drop`, the stack unwinds correctly even when the
//! computation panics.
//!
//! A stack rather than a single slot means a computation that creates another
//! computation while it is running keeps its own dependency attribution: reads
//! performed by the inner computation land on the inner entry only.
//!
//! An entry without a subscriber suppresses tracking; this is how [`untrack`]
//! works.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::subscriber::{Source, SourceId, Subscriber, SubscriberId};

/// Sources read during one run of a computation.
pub(crate) type Dependencies = SmallVec<[Arc<dyn Source>; 4]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// The computation being run, or `None` for an untracked section.
    subscriber: Option<Arc<dyn Subscriber>>,
    /// Sources read so far during this run, deduplicated by ID.
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, any source that is read will register
    /// the subscriber as a dependent.
    pub fn enter(subscriber: Arc<dyn Subscriber>) -> Self {
        let subscriber_id = Some(subscriber.subscriber_id());
        Self::push(ContextEntry {
            subscriber: Some(subscriber),
            dependencies: SmallVec::new(),
        });
        Self { subscriber_id }
    }

    /// Enter a context in which reads are not tracked.
    pub fn enter_untracked() -> Self {
        Self::push(ContextEntry {
            subscriber: None,
            dependencies: SmallVec::new(),
        });
        Self {
            subscriber_id: None,
        }
    }

    fn push(entry: ContextEntry) {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(entry));
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.subscriber.as_ref())
                .map(|subscriber| subscriber.subscriber_id())
        })
    }

    /// Number of entries on this thread's stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Record that the current computation read `source`.
    ///
    /// Called by sources when they are read. Subscribes the current
    /// computation to the source the first time it is read during a run.
    pub(crate) fn track(source: Arc<dyn Source>) {
        let id: SourceId = source.source_id();
        let subscriber = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let entry = stack.last_mut()?;
            let subscriber = entry.subscriber.clone()?;
            if contains(&entry.dependencies, id) {
                return None;
            }
            entry.dependencies.push(Arc::clone(&source));
            Some(subscriber)
        });

        if let Some(subscriber) = subscriber {
            source.subscribe(subscriber);
        }
    }

    /// Take the dependencies collected by the innermost context.
    pub(crate) fn take_dependencies() -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        // Bind the popped entry so its Arcs are released after the borrow ends.
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        if let Some(entry) = &popped {
            debug_assert_eq!(
                entry.subscriber.as_ref().map(|s| s.subscriber_id()),
                self.subscriber_id,
                "ReactiveContext mismatch"
            );
        }
    }
}

/// Run `f` as `subscriber` and store the sources it reads into `sink`.
///
/// Sources read again keep their subscription, and with it their place in
/// the source's subscriber order. Sources not read again are unsubscribed
/// once `f` returns. Both happen even when `f` unwinds.
pub(crate) fn run_tracked<R>(
    subscriber: Arc<dyn Subscriber>,
    sink: &Mutex<Dependencies>,
    f: impl FnOnce() -> R,
) -> R {
    let id = subscriber.subscriber_id();
    let previous = std::mem::take(&mut *sink.lock());
    let _run = TrackedRun {
        id,
        sink,
        previous,
        _ctx: ReactiveContext::enter(subscriber),
    };
    f()
}

struct TrackedRun<'a> {
    id: SubscriberId,
    sink: &'a Mutex<Dependencies>,
    previous: Dependencies,
    _ctx: ReactiveContext,
}

impl Drop for TrackedRun<'_> {
    // Runs before `_ctx` is dropped, while the entry is still on the stack.
    fn drop(&mut self) {
        let mut collected = ReactiveContext::take_dependencies();
        let nested = std::mem::take(&mut *self.sink.lock());

        // A re-entrant run of the same subscriber stored its sources first.
        for source in nested {
            if !contains(&collected, source.source_id()) {
                collected.push(source);
            }
        }

        let stale: Dependencies = std::mem::take(&mut self.previous)
            .into_iter()
            .filter(|source| !contains(&collected, source.source_id()))
            .collect();

        *self.sink.lock() = collected;

        for source in stale {
            source.unsubscribe(self.id);
        }
    }
}

fn contains(sources: &Dependencies, id: SourceId) -> bool {
    sources.iter().any(|source| source.source_id() == id)
}

/// Unsubscribe `id` from every source in `sources`, leaving it empty.
pub(crate) fn detach(id: SubscriberId, sources: &Mutex<Dependencies>) {
    let previous = std::mem::take(&mut *sources.lock());
    for source in previous {
        source.unsubscribe(id);
    }
}

/// Run `f` without tracking any reads it performs.
pub fn untrack<T>(f: impl FnOnce() -> T) -> T {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}
