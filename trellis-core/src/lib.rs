//! Trellis Core
//!
//! This crate provides the reactive execution core of the Trellis UI
//! framework. It implements:
//!
//! - Reactive primitives (cells, computations, memos)
//! - Suspense boundaries, async resources and lazily loaded components
//! - A keyed list reconciler that moves the minimum number of nodes
//! - A conditional renderer
//!
//! Everything renders into a small DOM-like tree ([`dom::Node`]) so the core
//! can be driven and tested without a browser.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `dom`: The tree the renderers mutate
//! - `suspense`: Async coordination for rendering
//! - `render`: List and conditional renderers
//! - `config`: Process-wide settings
//! - `error`: The crate error type
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{cell, computation};
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//!
//! // Create a cell
//! let count = cell(0);
//!
//! // Mirror it into an observer
//! let seen = Arc::new(AtomicI32::new(-1));
//! let (c, s) = (count.clone(), seen.clone());
//! computation(move || s.store(c.get(), Ordering::SeqCst));
//!
//! // Update the cell; the computation re-runs before `set` returns
//! count.set(5);
//! assert_eq!(seen.load(Ordering::SeqCst), 5);
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod reactive;
pub mod render;
pub mod suspense;

pub use config::Config;
pub use dom::{Node, NodeId, NodeKind, View};
pub use error::{Error, Result};
pub use reactive::{untrack, Cell, Computation, Memo, Owner};
pub use render::{
    branch, render_conditional, render_list, render_list_by_item, Branch, ListHandle, PatchStats,
};
pub use suspense::{
    component, lazy, query, resource, suspense, Children, Component, Lazy, Loadable, Resource,
    ResourceState, Suspended, SuspenseBoundary,
};

/// Create a reactive cell. See [`Cell::new`].
pub fn cell<T>(initial: T) -> Cell<T>
where
    T: Send + Sync + 'static,
{
    Cell::new(initial)
}

/// Create a computation that runs now and whenever a cell it read changes.
/// See [`Computation::new`].
pub fn computation<F>(f: F) -> Computation
where
    F: Fn() + Send + Sync + 'static,
{
    Computation::new(f)
}
