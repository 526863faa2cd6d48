//! Lazy Loader
//!
//! A lazy component renders a placeholder comment until its module loads,
//! then swaps the placeholder for the real component in place. The load is
//! started once and shared by every render; it is never retried.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};

use super::boundary::SuspenseBoundary;
use crate::config::Config;
use crate::dom::Node;
use crate::error::Error;
use crate::reactive::Runtime;

/// A loaded component: props in, node out.
pub type Component<P> = Arc<dyn Fn(P) -> Node + Send + Sync>;

type LoadFuture<P> = Shared<BoxFuture<'static, Result<Component<P>, Error>>>;
type Loader<P> = Box<dyn Fn() -> BoxFuture<'static, Result<Component<P>, Error>> + Send + Sync>;

/// Wrap a render function as a [`Component`].
pub fn component<P, F>(render: F) -> Component<P>
where
    F: Fn(P) -> Node + Send + Sync + 'static,
{
    Arc::new(render)
}

/// A component whose implementation is loaded on first render.
pub struct Lazy<P> {
    inner: Arc<LazyInner<P>>,
}

struct LazyInner<P> {
    loader: Loader<P>,
    load: Mutex<Option<LoadFuture<P>>>,
    resolved: RwLock<Option<Component<P>>>,
}

impl<P> Lazy<P>
where
    P: Send + 'static,
{
    /// Create a lazy component. Nothing is loaded until the first render.
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Component<P>, Error>> + Send + 'static,
    {
        Self {
            inner: Arc::new(LazyInner {
                loader: Box::new(move || loader().boxed()),
                load: Mutex::new(None),
                resolved: RwLock::new(None),
            }),
        }
    }

    /// Render the component.
    ///
    /// Once loaded this renders synchronously. Before that it returns a
    /// placeholder comment, registers the load with the current Suspense
    /// boundary (if any), and replaces the placeholder in its parent when
    /// the load completes. After a failed load it only returns the
    /// placeholder.
    pub fn render(&self, props: P) -> Node {
        if let Some(component) = self.loaded() {
            return component(props);
        }

        let placeholder = Node::comment(Config::current().lazy_placeholder.clone());
        let Ok(handle) = Runtime::handle() else {
            return placeholder;
        };

        let load = LazyInner::start(&self.inner);
        match load.peek() {
            Some(Ok(component)) => return component(props),
            Some(Err(err)) => {
                tracing::debug!(%err, "rendering placeholder for failed lazy component");
                return placeholder;
            }
            None => {}
        }

        if let Some(boundary) = SuspenseBoundary::current() {
            boundary.register(load.clone().map(|_| ()));
        }

        let target = placeholder.clone();
        handle.spawn(async move {
            match load.await {
                Ok(component) => {
                    let node = component(props);
                    if let Err(err) = target.replace_with(&node) {
                        tracing::error!(%err, "could not swap lazy placeholder");
                    }
                }
                Err(err) => {
                    tracing::error!(%err, "lazy component failed to load");
                }
            }
        });

        placeholder
    }

    /// Check if the component has finished loading.
    pub fn is_loaded(&self) -> bool {
        self.inner.resolved.read().is_some()
    }

    fn loaded(&self) -> Option<Component<P>> {
        self.inner.resolved.read().clone()
    }
}

impl<P> LazyInner<P>
where
    P: Send + 'static,
{
    /// Start the load on first call; later calls share the same load.
    fn start(this: &Arc<Self>) -> LoadFuture<P> {
        let mut slot = this.load.lock();
        if let Some(load) = slot.as_ref() {
            return load.clone();
        }

        let weak = Arc::downgrade(this);
        let future = (this.loader)();
        let load = async move {
            let result = future.await;
            if let (Ok(component), Some(inner)) = (&result, weak.upgrade()) {
                *inner.resolved.write() = Some(Arc::clone(component));
            }
            result
        }
        .boxed()
        .shared();

        *slot = Some(load.clone());
        load
    }
}

impl<P> Clone for Lazy<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Create a lazy component. See [`Lazy::new`].
pub fn lazy<P, F, Fut>(loader: F) -> Lazy<P>
where
    P: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Component<P>, Error>> + Send + 'static,
{
    Lazy::new(loader)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
