//! Rendering Pipeline
//!
//! Renderers are computations that keep a region of a parent's children,
//! delimited by an anchor node, in sync with reactive state:
//!
//! - [`render_list`] reconciles a keyed list with minimal node moves.
//! - [`render_conditional`] swaps between two branches.

mod conditional;
mod lis;
mod list;

pub use conditional::{branch, render_conditional, Branch};
pub use lis::longest_increasing_subsequence;
pub use list::{render_list, render_list_by_item, ListHandle, PatchStats};
