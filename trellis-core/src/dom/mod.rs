//! DOM-like Tree
//!
//! The reactive core assumes a single UI thread and synchronous mutation of
//! a DOM-like tree. This module provides that tree: the renderers insert,
//! move and remove [`Node`]s, and branches produce [`View`]s.

mod node;
mod view;

pub use node::{Node, NodeId, NodeKind};
pub use view::View;
