//! Suspense
//!
//! Async coordination for rendering: boundaries that show a fallback while
//! work is in flight, resources that load values asynchronously, and lazily
//! loaded components.
//!
//! Resources and lazy components find the enclosing boundary through a
//! thread-local stack that is only populated while a boundary evaluates its
//! children. Reads outside any boundary still work; they just have nobody to
//! report their pending work to.

mod boundary;
mod lazy;
mod resource;

pub use boundary::{suspense, BoundaryId, BoundaryScope, Children, SuspenseBoundary, Suspended};
pub use lazy::{component, lazy, Component, Lazy};
pub use resource::{query, resource, Loadable, Resource, ResourceState};
