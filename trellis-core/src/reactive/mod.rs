//! Reactive Primitives
//!
//! This module implements the core reactive system: cells, computations and
//! memos. These primitives form the foundation of Trellis's fine-grained
//! reactivity; the renderers and Suspense are specialised computations.
//!
//! # Concepts
//!
//! ## Cells
//!
//! A Cell is a container for mutable state. When a cell's value is read
//! within a tracking context (a computation or memo), the cell automatically
//! registers that context as a dependent. When the cell's value is set, all
//! dependents re-run synchronously.
//!
//! ## Computations
//!
//! A Computation is a side-effecting function that runs once when created
//! and again whenever a cell it read during its last run is set. Computations
//! synchronize reactive state with the outside world, such as the DOM.
//!
//! ## Owners
//!
//! An Owner collects the computations created inside its scope so a region
//! that rebuilds its content can dispose the previous build.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result and only notifies its
//! dependents when the result actually changes.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking stack to detect
//! dependencies. When a cell is read, we check if there is an active
//! tracking context and, if so, register the dependency in both directions:
//! the cell remembers the computation (to notify it) and the computation
//! remembers the cell (to drop the subscription once a run no longer reads it).

mod cell;
mod computation;
mod context;
mod memo;
mod owner;
mod runtime;
mod subscriber;

pub use cell::Cell;
pub use computation::Computation;
pub use context::{untrack, ReactiveContext};
pub use memo::{Memo, MemoState};
pub use owner::Owner;
pub use runtime::Runtime;
pub use subscriber::{Source, SourceId, Subscriber, SubscriberId};
