//! Async Resource
//!
//! A resource wraps one external asynchronous fetch in reactive state:
//! pending, resolved or rejected, plus the most recent successful value.
//!
//! # How Resources Work
//!
//! 1. Creating a resource starts a load. A source-driven resource runs its
//!    source inside a computation and starts a fresh load every time the
//!    source changes.
//!
//! 2. Every load gets a new generation number. When a load settles it only
//!    writes its outcome if it is still the newest load; a superseded load
//!    settling late is ignored.
//!
//! 3. Reading a pending resource inside a Suspense boundary registers the
//!    in-flight load with that boundary, once per load and boundary, and
//!    reports the read as not ready ([`Loadable::Loading`] or [`Suspended`]).
//!
//! 4. A failed load is visible only through [`Resource::error`] and
//!    [`Resource::read`]. [`Resource::get`] keeps returning the last
//!    successful value.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use smallvec::SmallVec;

use super::boundary::{BoundaryId, Suspended, SuspenseBoundary};
use crate::error::Error;
use crate::reactive::{untrack, Cell, Computation, Runtime};

/// Where a resource is in its load cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// A load is in flight.
    Pending,
    /// The most recent load succeeded.
    Resolved,
    /// The most recent load failed.
    Rejected,
}

/// The outcome of reading a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loadable<T, E> {
    /// A load is in flight.
    Loading,
    /// The most recent load produced this value.
    Ready(T),
    /// The most recent load failed with this error.
    Failed(E),
}

impl<T, E> Loadable<T, E> {
    /// Check if a load is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, Loadable::Loading)
    }

    /// The value, if the load succeeded.
    pub fn ready(self) -> Option<T> {
        match self {
            Loadable::Ready(value) => Some(value),
            _ => None,
        }
    }

    /// Convert into a result, reporting `Loading` as [`Suspended`].
    pub fn suspend(self) -> Result<Result<T, E>, Suspended> {
        match self {
            Loadable::Loading => Err(Suspended),
            Loadable::Ready(value) => Ok(Ok(value)),
            Loadable::Failed(error) => Ok(Err(error)),
        }
    }
}

#[derive(Clone)]
struct Snapshot<T, E> {
    current: Loadable<T, E>,
    latest: Option<T>,
    error: Option<E>,
}

type Fetch<T, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type InFlight = Shared<BoxFuture<'static, ()>>;

/// Per-load bookkeeping, reset by every new load.
#[derive(Default)]
struct LoadSlot {
    in_flight: Option<InFlight>,
    registered: SmallVec<[BoundaryId; 2]>,
}

/// A reactive handle to asynchronously loaded data.
///
/// # Example
///
/// ```rust,ignore
/// let user_id = Cell::new(1);
/// let id = user_id.clone();
/// let user = Resource::with_source(move || id.get(), |id| fetch_user(id));
///
/// let view = suspense(Node::text("Loading"), Children::render(move || {
///     let name = user.get()?.map(|u| u.name).unwrap_or_default();
///     Ok(Node::text(name))
/// }));
/// ```
pub struct Resource<T, E = Error>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + From<Error> + Send + Sync + 'static,
{
    inner: Arc<ResourceInner<T, E>>,
}

struct ResourceInner<T, E>
where
    T: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    snapshot: Cell<Snapshot<T, E>>,
    generation: AtomicU64,
    load: Mutex<LoadSlot>,
    fetch: Fetch<T, E>,
}

impl<T, E> Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + From<Error> + Send + Sync + 'static,
{
    fn from_fetch(fetch: Fetch<T, E>) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                snapshot: Cell::new(Snapshot {
                    current: Loadable::Loading,
                    latest: None,
                    error: None,
                }),
                generation: AtomicU64::new(0),
                load: Mutex::new(LoadSlot::default()),
                fetch,
            }),
        }
    }

    /// Create a resource from a fetcher and start loading.
    pub fn new<F, Fut>(fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let resource = Self::from_fetch(Arc::new(move || fetch().boxed()));
        resource.refetch();
        resource
    }

    /// Create a resource that reloads whenever `source` changes.
    pub fn with_source<S, Src, F, Fut>(source: Src, fetch: F) -> Self
    where
        S: Send + 'static,
        Src: Fn() -> S + Send + Sync + 'static,
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let source = Arc::new(source);
        let fetch = Arc::new(fetch);

        let current: Fetch<T, E> = {
            let (source, fetch) = (Arc::clone(&source), Arc::clone(&fetch));
            Arc::new(move || fetch(source()).boxed())
        };
        let resource = Self::from_fetch(current);

        let inner = Arc::clone(&resource.inner);
        Computation::new(move || {
            let value = source();
            untrack(|| ResourceInner::load(&inner, fetch(value).boxed()));
        });

        resource
    }

    /// Read the resource as a tri-state value. Tracked.
    ///
    /// While loading inside a Suspense boundary, the in-flight load is
    /// registered with that boundary.
    pub fn read(&self) -> Loadable<T, E> {
        let current = self.inner.snapshot.with(|s| s.current.clone());
        if current.is_loading() {
            self.inner.register_with_current_boundary();
        }
        current
    }

    /// Read the value for use in Suspense children. Tracked.
    ///
    /// Returns [`Suspended`] while loading, the value once resolved, and the
    /// last successful value (if any) after a failure.
    pub fn get(&self) -> Result<Option<T>, Suspended> {
        match self.read() {
            Loadable::Loading => Err(Suspended),
            Loadable::Ready(value) => Ok(Some(value)),
            Loadable::Failed(_) => Ok(self.inner.snapshot.with_untracked(|s| s.latest.clone())),
        }
    }

    /// Where the resource is in its load cycle. Tracked.
    pub fn state(&self) -> ResourceState {
        self.inner.snapshot.with(|s| match s.current {
            Loadable::Loading => ResourceState::Pending,
            Loadable::Ready(_) => ResourceState::Resolved,
            Loadable::Failed(_) => ResourceState::Rejected,
        })
    }

    /// Check if a load is in flight. Tracked.
    pub fn loading(&self) -> bool {
        self.inner.snapshot.with(|s| s.current.is_loading())
    }

    /// The error of the most recent failed load, cleared by the next success. Tracked.
    pub fn error(&self) -> Option<E> {
        self.inner.snapshot.with(|s| s.error.clone())
    }

    /// The most recent successful value, even while a newer load is pending. Tracked.
    pub fn latest(&self) -> Option<T> {
        self.inner.snapshot.with(|s| s.latest.clone())
    }

    /// Start a new load with the current source value.
    pub fn refetch(&self) {
        let future = untrack(|| (self.inner.fetch)());
        ResourceInner::load(&self.inner, future);
    }

    /// Generation number of the most recent load.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }
}

impl<T, E> ResourceInner<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + From<Error> + Send + Sync + 'static,
{
    fn load(this: &Arc<Self>, future: BoxFuture<'static, Result<T, E>>) {
        let generation = this.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(generation, "resource load started");

        let weak = Arc::downgrade(this);
        let task: InFlight = async move {
            let outcome = future.await;
            if let Some(inner) = weak.upgrade() {
                inner.settle(generation, outcome);
            }
        }
        .boxed()
        .shared();

        {
            let mut slot = this.load.lock();
            slot.in_flight = Some(task.clone());
            slot.registered.clear();
        }

        this.snapshot.update(|s| Snapshot {
            current: Loadable::Loading,
            ..s.clone()
        });

        if let Err(err) = Runtime::spawn(task) {
            this.settle(generation, Err(E::from(err)));
        }
    }

    fn settle(&self, generation: u64, outcome: Result<T, E>) {
        let current = self.generation.load(Ordering::SeqCst);
        if current != generation {
            tracing::debug!(generation, current, "ignoring superseded resource load");
            return;
        }
        self.load.lock().in_flight = None;

        match outcome {
            Ok(value) => self.snapshot.update(|_| Snapshot {
                current: Loadable::Ready(value.clone()),
                latest: Some(value),
                error: None,
            }),
            Err(error) => self.snapshot.update(|s| Snapshot {
                current: Loadable::Failed(error.clone()),
                latest: s.latest.clone(),
                error: Some(error),
            }),
        }
    }

    /// Hand the in-flight load to the current boundary, once per load.
    fn register_with_current_boundary(&self) {
        let Some(boundary) = SuspenseBoundary::current() else {
            return;
        };

        let task = {
            let mut slot = self.load.lock();
            if slot.registered.contains(&boundary.id()) {
                None
            } else {
                slot.registered.push(boundary.id());
                slot.in_flight.clone()
            }
        };

        if let Some(task) = task {
            boundary.register(task);
        }
    }
}

impl<T, E> Clone for Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + From<Error> + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Create a resource from a fetcher. See [`Resource::new`].
pub fn resource<T, E, F, Fut>(fetch: F) -> Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + From<Error> + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Resource::new(fetch)
}

/// Create a source-driven resource. See [`Resource::with_source`].
pub fn query<T, E, S, Src, F, Fut>(source: Src, fetch: F) -> Resource<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + From<Error> + Send + Sync + 'static,
    S: Send + 'static,
    Src: Fn() -> S + Send + Sync + 'static,
    F: Fn(S) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    Resource::with_source(source, fetch)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
