//! Reactive Runtime
//!
//! The reactive engine itself never awaits. Cells, computations and the
//! renderers run synchronously on whichever thread calls them. The only
//! asynchrony is external work: resource fetches and lazy component loads.
//! The runtime is the bridge that hands that work to the async executor.
//!
//! # How It Works
//!
//! 1. A resource or lazy loader builds a future that awaits the external
//!    work and then writes the outcome into reactive state.
//!
//! 2. The future is spawned onto the ambient Tokio runtime.
//!
//! 3. When it completes, the write re-runs dependent computations on the
//!    executor thread, exactly as if a user had called `set`.
//!
//! # Thread Safety
//!
//! Reactive state is `Arc` + lock based, so a continuation may complete on
//! any worker thread. The context stacks are thread-local; a continuation
//! starts with empty stacks, which is correct because it never runs inside
//! another computation's evaluation.

use std::future::Future;

use tokio::runtime::Handle;

use crate::error::{Error, Result};

/// Entry point for scheduling async continuations.
pub struct Runtime;

impl Runtime {
    /// Spawn `future` onto the current Tokio runtime.
    ///
    /// Returns [`Error::NoRuntime`] when called outside of a runtime. The
    /// future is dropped in that case, which runs any drop guards it owns.
    pub fn spawn<F>(future: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self::handle().map(|handle| {
            handle.spawn(future);
        })
    }

    /// The ambient Tokio runtime, for callers that must check before they
    /// build the work they spawn.
    ///
    /// This is the one place a missing runtime is logged.
    pub fn handle() -> Result<Handle> {
        Handle::try_current().map_err(|_| {
            tracing::error!("async work scheduled outside of a Tokio runtime");
            Error::NoRuntime
        })
    }

    /// Check if async work can currently be scheduled.
    pub fn is_available() -> bool {
        Handle::try_current().is_ok()
    }
}
