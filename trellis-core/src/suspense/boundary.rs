//! Suspense Boundary
//!
//! A boundary counts in-flight async operations and switches its root node
//! between a fallback view and its real content.
//!
//! # How Boundaries Work
//!
//! 1. While the boundary evaluates its children it sits on a thread-local
//!    boundary stack, so resources and lazy loaders read during that
//!    evaluation can find it with [`SuspenseBoundary::current`].
//!
//! 2. Those readers hand their in-flight work to [`SuspenseBoundary::register`].
//!    Registration increments the pending counter immediately and decrements
//!    it when the work completes, whether it succeeded or not.
//!
//! 3. A computation watches the counter. While it is above zero the root
//!    shows the fallback; when it returns to zero the children are evaluated
//!    again and shown. Children are evaluated inside that computation, so
//!    anything they read (a resource being reloaded, say) re-evaluates them.
//!
//! Each evaluation runs under an [`Owner`]. Computations the previous
//! evaluation created (a list renderer, say) are disposed before the children
//! are evaluated again or the fallback is shown.
//!
//! Children signal "not ready" by returning [`Suspended`] instead of a node.
//! That value is the whole suspension protocol: nothing is thrown or caught.

use std::cell::RefCell;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::dom::Node;
use crate::reactive::{Cell, Computation, Owner, Runtime};

/// Returned by a resource read while its load is still pending.
///
/// Inside Suspense children, propagate it with `?` and the boundary shows
/// its fallback until the pending work settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("read of a resource that is still loading")]
pub struct Suspended;

/// Unique identifier for a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoundaryId(u64);

impl BoundaryId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

thread_local! {
    static BOUNDARY_STACK: RefCell<Vec<SuspenseBoundary>> = const { RefCell::new(Vec::new()) };
}

/// A scope that defers showing content until its registered work settles.
#[derive(Clone)]
pub struct SuspenseBoundary {
    id: BoundaryId,
    pending: Cell<usize>,
}

impl SuspenseBoundary {
    /// Create a boundary with nothing pending.
    pub fn new() -> Self {
        Self {
            id: BoundaryId::new(),
            pending: Cell::new(0),
        }
    }

    /// Get the boundary's unique ID.
    pub fn id(&self) -> BoundaryId {
        self.id
    }

    /// The innermost boundary currently evaluating its children on this thread.
    pub fn current() -> Option<SuspenseBoundary> {
        BOUNDARY_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Number of registered operations still in flight. Tracked.
    pub fn pending(&self) -> usize {
        self.pending.get()
    }

    /// Number of registered operations still in flight, without tracking.
    pub fn pending_untracked(&self) -> usize {
        self.pending.get_untracked()
    }

    /// Make this boundary the current one until the scope is dropped.
    pub fn enter(&self) -> BoundaryScope {
        BOUNDARY_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        BoundaryScope { id: self.id }
    }

    /// Count `work` as pending until it completes.
    ///
    /// The counter goes up before this returns and comes back down when
    /// `work` finishes or is dropped. Outside of an async runtime the work
    /// cannot make progress, so it is not counted at all.
    pub fn register<F>(&self, work: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = match Runtime::handle() {
            Ok(handle) => handle,
            Err(_) => return,
        };

        let guard = PendingGuard::acquire(self.clone());
        handle.spawn(async move {
            let _guard = guard;
            work.await;
        });
    }
}

impl Default for SuspenseBoundary {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SuspenseBoundary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuspenseBoundary")
            .field("id", &self.id)
            .field("pending", &self.pending_untracked())
            .finish()
    }
}

/// Keeps a boundary on the boundary stack. Pops it when dropped.
pub struct BoundaryScope {
    id: BoundaryId,
}

impl Drop for BoundaryScope {
    fn drop(&mut self) {
        let popped = BOUNDARY_STACK.with(|stack| stack.borrow_mut().pop());
        debug_assert_eq!(popped.map(|b| b.id), Some(self.id), "boundary stack mismatch");
    }
}

/// One unit of pending work. Holding it keeps the counter raised.
struct PendingGuard {
    boundary: SuspenseBoundary,
}

impl PendingGuard {
    fn acquire(boundary: SuspenseBoundary) -> Self {
        boundary.pending.update(|n| n + 1);
        Self { boundary }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.boundary.pending.update(|n| n.saturating_sub(1));
    }
}

/// The content of a Suspense boundary.
#[derive(Clone)]
pub enum Children {
    /// A node that is already built.
    Static(Node),

    /// A function that builds the content, or reports that it is not ready.
    Render(Arc<dyn Fn() -> Result<Node, Suspended> + Send + Sync>),
}

impl Children {
    /// Content produced by `f` on every evaluation.
    pub fn render<F>(f: F) -> Self
    where
        F: Fn() -> Result<Node, Suspended> + Send + Sync + 'static,
    {
        Children::Render(Arc::new(f))
    }

    fn evaluate(&self) -> Result<Node, Suspended> {
        match self {
            Children::Static(node) => Ok(node.clone()),
            Children::Render(f) => f(),
        }
    }
}

impl From<Node> for Children {
    fn from(node: Node) -> Self {
        Children::Static(node)
    }
}

/// Render `children` inside a new boundary, showing `fallback` while any
/// work registered during their evaluation is pending.
///
/// Returns the boundary's root element.
pub fn suspense(fallback: Node, children: impl Into<Children>) -> Node {
    let config = Config::current();
    let root = Node::element(config.suspense_tag.clone());
    let placeholder = config.suspense_placeholder.clone();
    let children = children.into();
    let boundary = SuspenseBoundary::new();
    let owner = Owner::new();

    let target = root.clone();
    Computation::new(move || {
        owner.dispose();

        if boundary.pending() > 0 {
            show(&target, &fallback, &boundary, "fallback");
            return;
        }

        let content = {
            let _scope = boundary.enter();
            owner.with(|| children.evaluate())
        };

        // Registration during evaluation may already have raised the counter.
        if boundary.pending_untracked() > 0 {
            show(&target, &fallback, &boundary, "fallback");
            return;
        }

        let content = content.unwrap_or_else(|Suspended| {
            tracing::warn!(boundary = ?boundary.id(), "children suspended without registering pending work");
            Node::comment(placeholder.clone())
        });
        show(&target, &content, &boundary, "content");
    });

    root
}

fn show(root: &Node, node: &Node, boundary: &SuspenseBoundary, what: &str) {
    tracing::debug!(boundary = ?boundary.id(), showing = what, "suspense transition");
    if let Err(err) = root.replace_children(std::slice::from_ref(node)) {
        tracing::error!(%err, boundary = ?boundary.id(), "suspense could not update its root");
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn boundary_stack_is_scoped() {
        let outer = SuspenseBoundary::new();
        let inner = SuspenseBoundary::new();

        assert!(SuspenseBoundary::current().is_none());
        {
            let _outer = outer.enter();
            {
                let _inner = inner.enter();
                assert_eq!(SuspenseBoundary::current().map(|b| b.id()), Some(inner.id()));
            }
            assert_eq!(SuspenseBoundary::current().map(|b| b.id()), Some(outer.id()));
        }
        assert!(SuspenseBoundary::current().is_none());
    }

    #[test]
    fn register_without_runtime_is_not_counted() {
        let boundary = SuspenseBoundary::new();
        boundary.register(async {});
        assert_eq!(boundary.pending_untracked(), 0);
    }

    #[test]
    fn static_children_render_immediately() {
        let root = suspense(Node::text("Loading"), Node::text("ready"));
        assert_eq!(root.text_content(), "ready");
    }

    #[tokio::test]
    async fn register_counts_until_work_completes() {
        let boundary = SuspenseBoundary::new();
        let (tx, rx) = oneshot::channel::<()>();

        boundary.register(async move {
            let _ = rx.await;
        });
        assert_eq!(boundary.pending_untracked(), 1);

        tx.send(()).unwrap();
        settle().await;
        assert_eq!(boundary.pending_untracked(), 0);
    }

    #[tokio::test]
    async fn failed_work_still_settles() {
        let boundary = SuspenseBoundary::new();
        let (tx, rx) = oneshot::channel::<()>();

        boundary.register(async move {
            // The sender is dropped, so this resolves with an error.
            let _ = rx.await;
        });
        drop(tx);
        settle().await;
        assert_eq!(boundary.pending_untracked(), 0);
    }

    #[tokio::test]
    async fn registered_work_shows_fallback_then_content() {
        let (tx, rx) = oneshot::channel::<()>();
        let rx = parking_lot::Mutex::new(Some(rx));

        let root = suspense(
            Node::text("Loading"),
            Children::render(move || {
                if let Some(rx) = rx.lock().take() {
                    if let Some(boundary) = SuspenseBoundary::current() {
                        boundary.register(async move {
                            let _ = rx.await;
                        });
                    }
                    return Err(Suspended);
                }
                Ok(Node::text("done"))
            }),
        );
        assert_eq!(root.text_content(), "Loading");

        tx.send(()).unwrap();
        settle().await;
        assert_eq!(root.text_content(), "done");
    }
}
