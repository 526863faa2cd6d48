//! Rendered output of a branch: nothing, one node, or a run of siblings.

use smallvec::SmallVec;

use super::{Node, NodeKind};

/// What a branch renders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum View {
    /// Nothing is inserted.
    #[default]
    Empty,

    /// A single node.
    Node(Node),

    /// A run of sibling nodes, inserted in order.
    Nodes(Vec<Node>),
}

impl View {
    /// Flatten into the nodes to insert. A fragment contributes its
    /// children, since those are what end up in the tree.
    pub fn into_nodes(self) -> SmallVec<[Node; 2]> {
        let nodes: SmallVec<[Node; 2]> = match self {
            View::Empty => SmallVec::new(),
            View::Node(node) => smallvec::smallvec![node],
            View::Nodes(nodes) => nodes.into_iter().collect(),
        };
        nodes
            .into_iter()
            .flat_map(|node| {
                if *node.kind() == NodeKind::Fragment {
                    node.children()
                } else {
                    vec![node]
                }
            })
            .collect()
    }
}

impl From<Node> for View {
    fn from(node: Node) -> Self {
        View::Node(node)
    }
}

impl From<Vec<Node>> for View {
    fn from(nodes: Vec<Node>) -> Self {
        View::Nodes(nodes)
    }
}

impl From<Option<Node>> for View {
    fn from(node: Option<Node>) -> Self {
        node.map_or(View::Empty, View::Node)
    }
}
