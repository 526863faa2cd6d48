//! Computation Implementation
//!
//! A Computation is a re-runnable unit of work that subscribes to every
//! cell it read during its most recent execution.
//!
//! # How Computations Work
//!
//! 1. When created, the computation runs its function immediately to
//!    establish initial dependencies.
//!
//! 2. When any dependency is set, the computation re-runs synchronously,
//!    before the `set` call returns.
//!
//! 3. After each run, the computation unsubscribes from every source it read
//!    last time but not this time. Sources read in both runs keep the
//!    original subscription, so subscriber order on a cell is the order of
//!    first subscription. A computation that stops reading a cell stops being
//!    re-run by it.
//!
//! # Failure
//!
//! A panic inside the function unwinds out of `set` (or out of `new`) to the
//! caller. The context stack is popped on the way out, and stale
//! subscriptions are pruned against what was read before the panic.
//!
//! # Re-entrancy
//!
//! There is no cycle guard. A computation that writes a cell it also reads
//! re-enters itself; ending the recursion is the caller's responsibility.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::{detach, run_tracked, Dependencies};
use super::owner::Owner;
use super::subscriber::{Subscriber, SubscriberId};

/// A side-effecting computation that re-runs when its dependencies change.
///
/// Cloning yields another handle to the same computation.
///
/// # Example
///
/// ```rust,ignore
/// let count = Cell::new(0);
///
/// let c = count.clone();
/// let _logger = Computation::new(move || {
///     println!("Count is: {}", c.get());
/// });
///
/// count.set(5); // Prints: "Count is: 5"
/// ```
#[derive(Clone)]
pub struct Computation {
    inner: Arc<ComputationInner>,
}

struct ComputationInner {
    /// The subscriber ID used for dependency tracking.
    id: SubscriberId,

    /// Back-reference used to enter a context as a shared subscriber.
    this: Weak<ComputationInner>,

    /// The computation function.
    run: Box<dyn Fn() + Send + Sync>,

    /// Sources read during the most recent completed run.
    sources: Mutex<Dependencies>,

    /// Whether the computation has been disposed.
    disposed: AtomicBool,

    /// Number of completed runs.
    run_count: AtomicUsize,
}

impl Computation {
    /// Create a new computation and run it once.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let computation = Self {
            inner: Arc::new_cyclic(|this| ComputationInner {
                id: SubscriberId::new(),
                this: this.clone(),
                run: Box::new(run),
                sources: Mutex::new(Dependencies::new()),
                disposed: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
            }),
        };

        Owner::adopt(&computation);
        computation.execute();
        computation
    }

    /// Get the subscriber ID for this computation.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Run the computation now, re-collecting its dependencies.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Detach from every source and never run again.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.detach();
    }

    /// Check if the computation has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of completed runs.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of sources read during the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.lock().len()
    }
}

impl ComputationInner {
    fn execute(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        let Some(this) = self.this.upgrade() else {
            return;
        };

        tracing::trace!(computation = ?self.id, "running computation");

        run_tracked(this, &self.sources, || (self.run)());
        self.run_count.fetch_add(1, Ordering::SeqCst);

        // Disposed during its own run: drop what that run subscribed to.
        if self.disposed.load(Ordering::SeqCst) {
            self.detach();
        }
    }

    /// Remove this computation from every source it read last run.
    fn detach(&self) {
        detach(self.id, &self.sources);
    }
}

impl Subscriber for ComputationInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn notify(&self) {
        self.execute();
    }
}

impl std::fmt::Debug for Computation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computation")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Cell, ReactiveContext};
    use std::sync::atomic::AtomicI32;

    #[test]
    fn computation_runs_on_creation() {
        let run_count = Arc::new(AtomicI32::new(0));
        let run_count_clone = run_count.clone();

        let computation = Computation::new(move || {
            run_count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(run_count.load(Ordering::SeqCst), 1);
        assert_eq!(computation.run_count(), 1);
    }

    #[test]
    fn computation_reruns_when_dependency_set() {
        let cell = Cell::new(1);
        let seen = Arc::new(AtomicI32::new(0));

        let (c, s) = (cell.clone(), seen.clone());
        let computation = Computation::new(move || {
            s.store(c.get(), Ordering::SeqCst);
        });

        cell.set(7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
        assert_eq!(computation.run_count(), 2);
        assert_eq!(computation.dependency_count(), 1);
    }

    #[test]
    fn two_writes_run_twice() {
        let a = Cell::new(0);
        let b = Cell::new(0);

        let (ca, cb) = (a.clone(), b.clone());
        let computation = Computation::new(move || {
            let _ = ca.get() + cb.get();
        });

        a.set(1);
        b.set(1);
        assert_eq!(computation.run_count(), 3);
    }

    #[test]
    fn computation_does_not_run_after_disposal() {
        let cell = Cell::new(0);
        let c = cell.clone();
        let computation = Computation::new(move || {
            c.get();
        });

        computation.dispose();
        assert!(computation.is_disposed());
        assert_eq!(cell.subscriber_count(), 0);

        cell.set(1);
        computation.execute();
        assert_eq!(computation.run_count(), 1);
    }

    #[test]
    fn subscribers_run_in_subscription_order() {
        let cell = Cell::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut keep = Vec::new();
        for name in ["first", "second", "third"] {
            let (c, o) = (cell.clone(), order.clone());
            keep.push(Computation::new(move || {
                c.get();
                o.lock().push(name);
            }));
        }

        order.lock().clear();
        cell.set(1);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn rerun_keeps_place_in_shared_cell_order() {
        let x = Cell::new(0);
        let y = Cell::new(0);
        let order = Arc::new(Mutex::new(Vec::new()));

        let (cx, cy, o) = (x.clone(), y.clone(), order.clone());
        let _a = Computation::new(move || {
            cx.get();
            cy.get();
            o.lock().push("a");
        });
        let (cx, o) = (x.clone(), order.clone());
        let _b = Computation::new(move || {
            cx.get();
            o.lock().push("b");
        });

        y.set(1);
        order.lock().clear();

        x.set(1);
        assert_eq!(*order.lock(), vec!["a", "b"]);
    }

    #[test]
    fn panic_propagates_to_the_writer() {
        let cell = Cell::new(0);
        let c = cell.clone();
        let _computation = Computation::new(move || {
            if c.get() == 13 {
                panic!("unlucky");
            }
        });

        let writer = cell.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| writer.set(13)));

        assert!(result.is_err());
        assert_eq!(ReactiveContext::depth(), 0);
    }
}
