//! Conditional Renderer
//!
//! Swaps the nodes before an anchor between two branches whenever a reactive
//! condition changes.

use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::dom::{Node, View};
use crate::reactive::Computation;

/// A lazily evaluated branch of a conditional.
pub type Branch = Arc<dyn Fn() -> View + Send + Sync>;

/// Wrap a closure returning anything convertible to a [`View`] as a [`Branch`].
pub fn branch<F, V>(f: F) -> Branch
where
    F: Fn() -> V + Send + Sync + 'static,
    V: Into<View>,
{
    Arc::new(move || f().into())
}

/// Render `consequent` while `condition()` holds and `alternate` otherwise,
/// immediately before `anchor` in `parent`.
///
/// Each run removes what the previous run inserted and evaluates the chosen
/// branch afresh. Cells read by `condition()` or by the chosen branch re-run
/// it. Without an alternate, a false condition renders nothing. The returned computation can be
/// disposed to freeze the region.
pub fn render_conditional<C>(
    parent: &Node,
    anchor: Option<&Node>,
    condition: C,
    consequent: Branch,
    alternate: Option<Branch>,
) -> Computation
where
    C: Fn() -> bool + Send + Sync + 'static,
{
    let parent = parent.clone();
    let anchor = anchor.cloned();
    let inserted: Mutex<SmallVec<[Node; 2]>> = Mutex::new(SmallVec::new());

    Computation::new(move || {
        let previous = std::mem::take(&mut *inserted.lock());
        for node in &previous {
            node.remove();
        }

        let shown = condition();
        let view = match (shown, alternate.as_ref()) {
            (true, _) => consequent(),
            (false, Some(alternate)) => alternate(),
            (false, None) => View::Empty,
        };

        let nodes = view.into_nodes();
        for node in &nodes {
            if let Err(err) = parent.insert_before(node, anchor.as_ref()) {
                tracing::error!(%err, parent = %parent.id(), "conditional could not insert branch");
                break;
            }
        }
        tracing::trace!(shown, nodes = nodes.len(), "conditional rendered");

        *inserted.lock() = nodes;
    })
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (Node, Node) {
        let parent = Node::element("div");
        let anchor = Node::comment("if");
        parent.append_child(&Node::text("[")).unwrap();
        parent.append_child(&anchor).unwrap();
        parent.append_child(&Node::text("]")).unwrap();
        (parent, anchor)
    }

    #[test]
    fn switches_between_branches() {
        let (parent, anchor) = setup();
        let logged_in = Cell::new(false);
        let flag = logged_in.clone();

        render_conditional(
            &parent,
            Some(&anchor),
            move || flag.get(),
            branch(|| Node::text("welcome")),
            Some(branch(|| Node::text("sign in"))),
        );
        assert_eq!(parent.to_html(), "<div>[sign in<!--if-->]</div>");

        logged_in.set(true);
        assert_eq!(parent.to_html(), "<div>[welcome<!--if-->]</div>");

        logged_in.set(false);
        assert_eq!(parent.to_html(), "<div>[sign in<!--if-->]</div>");
    }

    #[test]
    fn missing_alternate_renders_nothing() {
        let (parent, anchor) = setup();
        let visible = Cell::new(true);
        let flag = visible.clone();

        render_conditional(
            &parent,
            Some(&anchor),
            move || flag.get(),
            branch(|| Node::text("shown")),
            None,
        );
        assert_eq!(parent.text_content(), "[shown]");

        visible.set(false);
        assert_eq!(parent.text_content(), "[]");
    }

    #[test]
    fn branch_may_render_several_nodes() {
        let (parent, anchor) = setup();
        let open = Cell::new(true);
        let flag = open.clone();

        render_conditional(
            &parent,
            Some(&anchor),
            move || flag.get(),
            branch(|| (1..=3).map(|n| Node::text(n.to_string())).collect::<Vec<_>>()),
            None,
        );
        assert_eq!(parent.text_content(), "[123]");

        open.set(false);
        assert_eq!(parent.text_content(), "[]");
    }

    #[test]
    fn branch_reads_rerender_the_branch() {
        let parent = Node::element("div");
        let flag = Cell::new(true);
        let label = Cell::new("a".to_string());
        let runs = Arc::new(AtomicUsize::new(0));

        let (f, l, r) = (flag.clone(), label.clone(), runs.clone());
        render_conditional(
            &parent,
            None,
            move || f.get(),
            branch(move || {
                r.fetch_add(1, Ordering::SeqCst);
                Node::text(l.get())
            }),
            None,
        );
        assert_eq!(parent.to_html(), "<div>a</div>");

        label.set("b".to_string());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(parent.to_html(), "<div>b</div>");

        flag.set(false);
        label.set("c".to_string());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(parent.to_html(), "<div></div>");
    }
}
