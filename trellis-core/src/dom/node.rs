//! Tree Nodes
//!
//! This module defines the DOM-like tree the renderers mutate. It mirrors
//! the parts of the browser DOM the reactive core relies on: elements, text,
//! comments used as anchors and placeholders, and fragments used to insert
//! a batch of siblings in one operation.
//!
//! Nodes are shared handles. Cloning a [`Node`] clones the handle, not the
//! subtree, and equality is identity.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;

use crate::error::{Error, Result};

/// Unique identifier for a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of node in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    /// An element with the given tag. Elements own children and attributes.
    Element(String),

    /// A text leaf.
    Text,

    /// A comment leaf. Used for anchors and placeholders.
    Comment,

    /// A detached container whose children move into the target on insert.
    Fragment,
}

/// A handle to a node in the tree.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    id: NodeId,
    kind: NodeKind,
    state: RwLock<NodeState>,
}

#[derive(Default)]
struct NodeState {
    /// The node this one is attached to, if any.
    parent: Option<Weak<NodeInner>>,

    /// Children in document order.
    children: Vec<Node>,

    /// Character data of text and comment nodes.
    data: String,

    /// Element attributes in insertion order.
    attributes: IndexMap<String, String>,
}

impl Node {
    fn with_kind(kind: NodeKind, data: String) -> Self {
        Self {
            inner: Arc::new(NodeInner {
                id: NodeId::new(),
                kind,
                state: RwLock::new(NodeState {
                    data,
                    ..NodeState::default()
                }),
            }),
        }
    }

    /// Create an element node.
    pub fn element(tag: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Element(tag.into()), String::new())
    }

    /// Create a text node.
    pub fn text(data: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Text, data.into())
    }

    /// Create a comment node.
    pub fn comment(data: impl Into<String>) -> Self {
        Self::with_kind(NodeKind::Comment, data.into())
    }

    /// Create an empty fragment.
    pub fn fragment() -> Self {
        Self::with_kind(NodeKind::Fragment, String::new())
    }

    /// Get the node's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the node's kind.
    pub fn kind(&self) -> &NodeKind {
        &self.inner.kind
    }

    /// Get the parent node, if attached.
    pub fn parent(&self) -> Option<Node> {
        self.inner
            .state
            .read()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Node { inner })
    }

    /// Snapshot of the children in document order.
    pub fn children(&self) -> Vec<Node> {
        self.inner.state.read().children.clone()
    }

    /// Number of children.
    pub fn child_count(&self) -> usize {
        self.inner.state.read().children.len()
    }

    /// The first child, if any.
    pub fn first_child(&self) -> Option<Node> {
        self.inner.state.read().children.first().cloned()
    }

    /// The sibling immediately after this node, if any.
    pub fn next_sibling(&self) -> Option<Node> {
        let parent = self.parent()?;
        let state = parent.inner.state.read();
        let index = state.children.iter().position(|c| c == self)?;
        state.children.get(index + 1).cloned()
    }

    /// Check whether `other` is this node or one of its descendants.
    pub fn contains(&self, other: &Node) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if &node == self {
                return true;
            }
            current = node.parent();
        }
        false
    }

    fn is_parent_of(&self, child: &Node) -> bool {
        child.parent().as_ref() == Some(self)
    }

    /// Append `child` as the last child, moving it if already attached.
    pub fn append_child(&self, child: &Node) -> Result<()> {
        self.insert_before(child, None)
    }

    /// Insert `child` immediately before `reference`, or at the end when
    /// `reference` is `None`.
    ///
    /// An attached `child` is moved. A fragment inserts all of its children,
    /// in order, and is left empty.
    pub fn insert_before(&self, child: &Node, reference: Option<&Node>) -> Result<()> {
        if let Some(reference) = reference {
            if !self.is_parent_of(reference) {
                return Err(Error::NotAChild {
                    parent: self.id(),
                    child: reference.id(),
                });
            }
        }

        if child.inner.kind == NodeKind::Fragment {
            let moved = std::mem::take(&mut child.inner.state.write().children);
            for node in &moved {
                node.inner.state.write().parent = None;
            }
            for node in &moved {
                self.insert_before(node, reference)?;
            }
            return Ok(());
        }

        if child.contains(self) {
            return Err(Error::HierarchyRequest {
                parent: self.id(),
                child: child.id(),
            });
        }

        let reference = match reference {
            Some(r) if r == child => child.next_sibling(),
            other => other.cloned(),
        };

        child.detach();

        {
            let mut state = self.inner.state.write();
            let index = reference
                .as_ref()
                .and_then(|r| state.children.iter().position(|c| c == r))
                .unwrap_or(state.children.len());
            state.children.insert(index, child.clone());
        }
        child.inner.state.write().parent = Some(Arc::downgrade(&self.inner));

        Ok(())
    }

    /// Remove `child` from this node's children.
    pub fn remove_child(&self, child: &Node) -> Result<Node> {
        if !self.is_parent_of(child) {
            return Err(Error::NotAChild {
                parent: self.id(),
                child: child.id(),
            });
        }
        child.detach();
        Ok(child.clone())
    }

    /// Detach this node from its parent. Does nothing when detached.
    pub fn remove(&self) {
        self.detach();
    }

    fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent.inner.state.write().children.retain(|c| c != self);
        }
        self.inner.state.write().parent = None;
    }

    /// Put `replacement` where this node is and detach this node.
    ///
    /// Does nothing when this node has no parent.
    pub fn replace_with(&self, replacement: &Node) -> Result<()> {
        if replacement == self {
            return Ok(());
        }
        let Some(parent) = self.parent() else {
            return Ok(());
        };
        parent.insert_before(replacement, Some(self))?;
        self.detach();
        Ok(())
    }

    /// Remove every child and append `nodes` in order.
    pub fn replace_children(&self, nodes: &[Node]) -> Result<()> {
        for child in self.children() {
            child.detach();
        }
        for node in nodes {
            self.append_child(node)?;
        }
        Ok(())
    }

    /// Character data of a text or comment node.
    pub fn data(&self) -> String {
        self.inner.state.read().data.clone()
    }

    /// Replace the character data of a text or comment node.
    pub fn set_text(&self, data: impl Into<String>) {
        self.inner.state.write().data = data.into();
    }

    /// Set an element attribute.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner
            .state
            .write()
            .attributes
            .insert(name.into(), value.into());
    }

    /// Get an element attribute.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.state.read().attributes.get(name).cloned()
    }

    /// Concatenated text of this node and its descendants. Comments inside
    /// a container do not contribute.
    pub fn text_content(&self) -> String {
        match self.inner.kind {
            NodeKind::Text | NodeKind::Comment => self.data(),
            NodeKind::Element(_) | NodeKind::Fragment => {
                let mut out = String::new();
                self.collect_text(&mut out);
                out
            }
        }
    }

    fn collect_text(&self, out: &mut String) {
        for child in self.children() {
            match child.inner.kind {
                NodeKind::Text => out.push_str(&child.data()),
                NodeKind::Comment => {}
                NodeKind::Element(_) | NodeKind::Fragment => child.collect_text(out),
            }
        }
    }

    /// Serialize the subtree as markup.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match &self.inner.kind {
            NodeKind::Text => out.push_str(&self.data()),
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&self.data());
                out.push_str("-->");
            }
            NodeKind::Fragment => {
                for child in self.children() {
                    child.write_html(out);
                }
            }
            NodeKind::Element(tag) => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in self.inner.state.read().attributes.iter() {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for child in self.children() {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("child_count", &self.child_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ul_with(items: &[&str]) -> (Node, Vec<Node>) {
        let ul = Node::element("ul");
        let lis: Vec<Node> = items.iter().map(|t| Node::text(*t)).collect();
        for li in &lis {
            ul.append_child(li).unwrap();
        }
        (ul, lis)
    }

    #[test]
    fn node_ids_are_unique() {
        let a = Node::element("a");
        let b = Node::element("a");
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn insert_before_places_node() {
        let (ul, lis) = ul_with(&["a", "c"]);
        let b = Node::text("b");

        ul.insert_before(&b, Some(&lis[1])).unwrap();
        assert_eq!(ul.text_content(), "abc");
        assert_eq!(b.parent(), Some(ul.clone()));
        assert_eq!(lis[0].next_sibling(), Some(b));
    }

    #[test]
    fn inserting_an_attached_node_moves_it() {
        let (ul, lis) = ul_with(&["a", "b", "c"]);

        ul.insert_before(&lis[2], Some(&lis[0])).unwrap();
        assert_eq!(ul.text_content(), "cab");
        assert_eq!(ul.child_count(), 3);

        let other = Node::element("ol");
        other.append_child(&lis[0]).unwrap();
        assert_eq!(ul.text_content(), "cb");
        assert_eq!(other.text_content(), "a");
    }

    #[test]
    fn inserting_before_itself_keeps_position() {
        let (ul, lis) = ul_with(&["a", "b", "c"]);
        ul.insert_before(&lis[1], Some(&lis[1])).unwrap();
        assert_eq!(ul.text_content(), "abc");
    }

    #[test]
    fn fragment_inserts_children_in_order() {
        let (ul, lis) = ul_with(&["a", "d"]);
        let fragment = Node::fragment();
        fragment.append_child(&Node::text("b")).unwrap();
        fragment.append_child(&Node::text("c")).unwrap();

        ul.insert_before(&fragment, Some(&lis[1])).unwrap();
        assert_eq!(ul.text_content(), "abcd");
        assert_eq!(fragment.child_count(), 0);
    }

    #[test]
    fn foreign_reference_is_rejected() {
        let (ul, _) = ul_with(&["a"]);
        let stranger = Node::text("x");
        let err = ul.insert_before(&Node::text("b"), Some(&stranger)).unwrap_err();
        assert!(matches!(err, Error::NotAChild { .. }));
    }

    #[test]
    fn cycles_are_rejected() {
        let outer = Node::element("div");
        let inner = Node::element("span");
        outer.append_child(&inner).unwrap();

        let err = inner.append_child(&outer).unwrap_err();
        assert!(matches!(err, Error::HierarchyRequest { .. }));
    }

    #[test]
    fn replace_with_swaps_in_place() {
        let (ul, lis) = ul_with(&["a", "b", "c"]);
        let placeholder = &lis[1];
        placeholder.replace_with(&Node::text("B")).unwrap();

        assert_eq!(ul.text_content(), "aBc");
        assert!(placeholder.parent().is_none());
    }

    #[test]
    fn remove_child_requires_parentage() {
        let (ul, lis) = ul_with(&["a", "b"]);
        assert_eq!(ul.remove_child(&lis[0]).unwrap(), lis[0]);
        assert!(ul.remove_child(&lis[0]).is_err());
        assert_eq!(ul.text_content(), "b");
    }

    #[test]
    fn html_serialization() {
        let div = Node::element("div");
        div.set_attribute("class", "card");
        div.append_child(&Node::comment("anchor")).unwrap();
        div.append_child(&Node::text("hi")).unwrap();

        assert_eq!(div.to_html(), r#"<div class="card"><!--anchor-->hi</div>"#);
        assert_eq!(div.text_content(), "hi");
    }
}
