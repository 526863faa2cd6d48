//! Keyed List Reconciler
//!
//! Keeps a run of sibling nodes, immediately before an anchor, in sync with a
//! reactive list of items. Rows are matched by key across runs so that a row
//! whose key survives keeps its node; only new rows are built.
//!
//! # Algorithm
//!
//! Each run maps the new keys onto the previous run's key order:
//!
//! 1. An empty list removes every row. A first run builds all rows and
//!    inserts them as one fragment.
//! 2. Otherwise every new slot either reuses the node of a surviving key,
//!    remembering that key's old position as the slot's source, or builds a
//!    new node. If the sources of reused rows ever decrease, rows have been
//!    reordered.
//! 3. Rows whose key is gone are removed.
//! 4. Without reordering, only new rows are inserted. With reordering, the
//!    longest increasing subsequence of the sources marks the rows that are
//!    already in relative order; every other row is inserted at its slot.
//!
//! Insertion walks from the last slot to the first, so each row is placed
//! before the node that must follow it. The number of reused rows that move
//! is the number of reused rows outside the subsequence.

use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use super::lis::longest_increasing_subsequence;
use crate::dom::Node;
use crate::error::Result;
use crate::reactive::Computation;

/// What one reconciliation run did to the tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PatchStats {
    /// Rows built by the map function and inserted.
    pub created: usize,

    /// Reused rows that were physically moved.
    pub moved: usize,

    /// Rows removed because their key disappeared.
    pub removed: usize,
}

/// A live keyed list. Dropping the handle does not stop the list; call
/// [`ListHandle::dispose`] for that.
pub struct ListHandle {
    computation: Computation,
    stats: Arc<Mutex<PatchStats>>,
    len: Arc<AtomicUsize>,
}

impl ListHandle {
    /// Statistics of the most recent run.
    pub fn last_patch(&self) -> PatchStats {
        *self.stats.lock()
    }

    /// Number of rows currently rendered.
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    /// Check if no rows are rendered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop reacting to the item list. Rendered rows stay where they are.
    pub fn dispose(&self) {
        self.computation.dispose();
    }
}

impl fmt::Debug for ListHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListHandle")
            .field("len", &self.len())
            .field("last_patch", &self.last_patch())
            .finish()
    }
}

/// Render `items()` before `anchor` in `parent`, one node per key.
///
/// `map` builds the node for an item the first time its key appears and
/// `key` identifies an item across runs. Both receive the item's index.
/// Cells read by `items`, `map` or `key` all re-run the reconciliation. With
/// no anchor, rows go at the end of `parent`.
pub fn render_list<T, K, I, M, F>(
    parent: &Node,
    anchor: Option<&Node>,
    items: I,
    map: M,
    key: F,
) -> ListHandle
where
    K: Hash + Eq + fmt::Debug + Send + 'static,
    I: Fn() -> Vec<T> + Send + Sync + 'static,
    M: Fn(&T, usize) -> Node + Send + Sync + 'static,
    F: Fn(&T, usize) -> K + Send + Sync + 'static,
{
    let parent = parent.clone();
    let anchor = anchor.cloned();
    let rows: Mutex<Option<Rows<K>>> = Mutex::new(Some(Rows::default()));
    let rerun = AtomicBool::new(false);
    let stats = Arc::new(Mutex::new(PatchStats::default()));
    let len = Arc::new(AtomicUsize::new(0));

    let run_stats = Arc::clone(&stats);
    let run_len = Arc::clone(&len);
    let computation = Computation::new(move || {
        // Taken out so a nested run never waits on this lock. A nested run
        // started by `map` or `key` finds the slot empty and leaves the
        // reconciliation to the run that holds the rows.
        let Some(mut current) = rows.lock().take() else {
            rerun.store(true, Ordering::Release);
            return;
        };

        loop {
            let list = items();
            match current.reconcile(&parent, anchor.as_ref(), &list, &map, &key) {
                Ok(patch) => {
                    tracing::debug!(
                        rows = current.len(),
                        created = patch.created,
                        moved = patch.moved,
                        removed = patch.removed,
                        "list reconciled"
                    );
                    *run_stats.lock() = patch;
                }
                Err(err) => {
                    tracing::error!(%err, parent = %parent.id(), "list reconciliation failed");
                }
            }
            if !rerun.swap(false, Ordering::AcqRel) {
                break;
            }
        }

        run_len.store(current.len(), Ordering::Release);
        *rows.lock() = Some(current);
    });

    ListHandle {
        computation,
        stats,
        len,
    }
}

/// Render a list whose items are their own keys.
pub fn render_list_by_item<T, I, M>(
    parent: &Node,
    anchor: Option<&Node>,
    items: I,
    map: M,
) -> ListHandle
where
    T: Clone + Hash + Eq + fmt::Debug + Send + 'static,
    I: Fn() -> Vec<T> + Send + Sync + 'static,
    M: Fn(&T, usize) -> Node + Send + Sync + 'static,
{
    render_list(parent, anchor, items, map, |item: &T, _| item.clone())
}

/// Rendered rows in document order, by key.
struct Rows<K> {
    nodes: IndexMap<K, Node>,
}

impl<K> Default for Rows<K> {
    fn default() -> Self {
        Self {
            nodes: IndexMap::new(),
        }
    }
}

impl<K> Rows<K>
where
    K: Hash + Eq + fmt::Debug,
{
    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn reconcile<T, M, F>(
        &mut self,
        parent: &Node,
        anchor: Option<&Node>,
        items: &[T],
        map: &M,
        key: &F,
    ) -> Result<PatchStats>
    where
        M: Fn(&T, usize) -> Node,
        F: Fn(&T, usize) -> K,
    {
        let keys = unique_keys(items, key);

        if keys.is_empty() {
            let removed = self.nodes.len();
            for (_, node) in self.nodes.drain(..) {
                node.remove();
            }
            return Ok(PatchStats {
                removed,
                ..PatchStats::default()
            });
        }

        if self.nodes.is_empty() {
            let batch = Node::fragment();
            for (index, key) in keys {
                let node = map(&items[index], index);
                batch.append_child(&node)?;
                self.nodes.insert(key, node);
            }
            parent.insert_before(&batch, anchor)?;
            return Ok(PatchStats {
                created: self.nodes.len(),
                ..PatchStats::default()
            });
        }

        let old = std::mem::take(&mut self.nodes);
        let mut patch = PatchStats::default();

        // sources[slot] is the old position of a reused row, None for a new one.
        let mut sources: Vec<Option<usize>> = Vec::with_capacity(keys.len());
        let mut reordered = false;
        let mut last_source = 0;

        for (index, key) in keys {
            let node = match old.get_full(&key) {
                Some((source, _, node)) => {
                    if source < last_source {
                        reordered = true;
                    }
                    last_source = source;
                    sources.push(Some(source));
                    node.clone()
                }
                None => {
                    sources.push(None);
                    patch.created += 1;
                    map(&items[index], index)
                }
            };
            self.nodes.insert(key, node);
        }

        for (key, node) in &old {
            if !self.nodes.contains_key(key) {
                node.remove();
                patch.removed += 1;
            }
        }

        let nodes: Vec<Node> = self.nodes.values().cloned().collect();
        let stable = if reordered {
            in_order_rows(&sources)
        } else {
            sources.iter().map(Option::is_some).collect()
        };

        let mut next_sibling = anchor.cloned();
        for (slot, node) in nodes.iter().enumerate().rev() {
            if !stable[slot] {
                parent.insert_before(node, next_sibling.as_ref())?;
                if sources[slot].is_some() {
                    patch.moved += 1;
                }
            }
            next_sibling = Some(node.clone());
        }

        Ok(patch)
    }
}

/// Item indices paired with their keys, first occurrence of each key only.
fn unique_keys<T, K, F>(items: &[T], key: &F) -> Vec<(usize, K)>
where
    K: Hash + Eq + fmt::Debug,
    F: Fn(&T, usize) -> K,
{
    let mut seen: IndexMap<K, usize> = IndexMap::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let key = key(item, index);
        if let Some(first) = seen.get(&key) {
            tracing::warn!(?key, first = *first, duplicate = index, "duplicate list key, row skipped");
            continue;
        }
        seen.insert(key, index);
    }
    seen.into_iter().map(|(key, index)| (index, key)).collect()
}

/// Marks the reused rows that lie on the longest increasing run of sources.
fn in_order_rows(sources: &[Option<usize>]) -> Vec<bool> {
    let reused: Vec<usize> = (0..sources.len()).filter(|&slot| sources[slot].is_some()).collect();
    let sequence: Vec<usize> = sources.iter().flatten().copied().collect();

    let mut stable = vec![false; sources.len()];
    for position in longest_increasing_subsequence(&sequence) {
        stable[reused[position]] = true;
    }
    stable
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::NodeId;
    use crate::reactive::Cell;

    fn row(n: &u32, _: usize) -> Node {
        Node::text(n.to_string())
    }

    fn texts(parent: &Node) -> Vec<String> {
        parent.children().iter().map(Node::data).collect()
    }

    fn ids(parent: &Node) -> Vec<(String, NodeId)> {
        parent.children().iter().map(|n| (n.data(), n.id())).collect()
    }

    fn id_of(snapshot: &[(String, NodeId)], text: &str) -> Option<NodeId> {
        snapshot.iter().find(|(t, _)| t == text).map(|(_, id)| *id)
    }

    fn list(parent: &Node, anchor: Option<&Node>, initial: Vec<u32>) -> (Cell<Vec<u32>>, ListHandle) {
        let items = Cell::new(initial);
        let source = items.clone();
        let handle = render_list_by_item(parent, anchor, move || source.get(), row);
        (items, handle)
    }

    #[test]
    fn first_run_builds_every_row() {
        let parent = Node::element("ul");
        let (_items, handle) = list(&parent, None, vec![1, 2, 3]);

        assert_eq!(texts(&parent), ["1", "2", "3"]);
        assert_eq!(handle.len(), 3);
        assert_eq!(handle.last_patch(), PatchStats { created: 3, moved: 0, removed: 0 });
    }

    #[test]
    fn rows_go_before_the_anchor() {
        let parent = Node::element("ul");
        let head = Node::text("head");
        let anchor = Node::comment("end");
        let tail = Node::text("tail");
        for node in [&head, &anchor, &tail] {
            parent.append_child(node).unwrap();
        }

        let (items, _handle) = list(&parent, Some(&anchor), vec![1, 2]);
        assert_eq!(texts(&parent), ["head", "1", "2", "end", "tail"]);

        items.set(vec![2, 3]);
        assert_eq!(texts(&parent), ["head", "2", "3", "end", "tail"]);
    }

    #[test]
    fn empty_list_removes_everything() {
        let parent = Node::element("ul");
        let (items, handle) = list(&parent, None, vec![1, 2, 3]);

        items.set(Vec::new());
        assert_eq!(parent.child_count(), 0);
        assert!(handle.is_empty());
        assert_eq!(handle.last_patch().removed, 3);
    }

    #[test]
    fn appending_reuses_existing_rows() {
        let parent = Node::element("ul");
        let (items, handle) = list(&parent, None, vec![1, 2]);
        let before = ids(&parent);

        items.set(vec![1, 2, 3]);
        let after = ids(&parent);

        assert_eq!(texts(&parent), ["1", "2", "3"]);
        assert_eq!(id_of(&after, "1"), id_of(&before, "1"));
        assert_eq!(id_of(&after, "2"), id_of(&before, "2"));
        assert_eq!(handle.last_patch(), PatchStats { created: 1, moved: 0, removed: 0 });
    }

    #[test]
    fn cells_read_by_map_rerun_the_list() {
        let parent = Node::element("ul");
        let items = Cell::new(vec![1u32, 2]);
        let prefix = Cell::new(String::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let (source, p, r) = (items.clone(), prefix.clone(), runs.clone());
        let handle = render_list_by_item(
            &parent,
            None,
            move || {
                r.fetch_add(1, Ordering::SeqCst);
                source.get()
            },
            move |n: &u32, _| Node::text(format!("{}{n}", p.get())),
        );
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        prefix.set("#".to_string());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(handle.last_patch(), PatchStats::default());

        items.set(vec![1, 2, 3]);
        assert_eq!(texts(&parent), ["1", "2", "#3"]);
    }

    #[test]
    fn write_from_map_is_reconciled_by_the_outer_run() {
        let parent = Node::element("ul");
        let items = Cell::new(vec![1u32, 2]);
        let built = Cell::new(0usize);

        let (source, b) = (items.clone(), built.clone());
        let handle = render_list_by_item(
            &parent,
            None,
            move || source.get(),
            move |n: &u32, _| {
                let count = b.get();
                b.set(count + 1);
                Node::text(n.to_string())
            },
        );

        assert_eq!(texts(&parent), ["1", "2"]);
        assert_eq!(handle.len(), 2);
        assert_eq!(built.get_untracked(), 2);

        items.set(vec![2, 3]);
        assert_eq!(texts(&parent), ["2", "3"]);
        assert_eq!(built.get_untracked(), 3);
    }

    #[test]
    fn single_swap_moves_one_row() {
        let parent = Node::element("ul");
        let (items, handle) = list(&parent, None, vec![1, 2, 3, 4, 5]);

        items.set(vec![1, 3, 2, 4, 5]);

        assert_eq!(texts(&parent), ["1", "3", "2", "4", "5"]);
        assert_eq!(handle.last_patch(), PatchStats { created: 0, moved: 1, removed: 0 });
    }

    #[test]
    fn rotation_reuses_all_rows() {
        let parent = Node::element("ul");
        let (items, handle) = list(&parent, None, vec![1, 2, 3]);
        let before = ids(&parent);

        items.set(vec![3, 1, 2]);
        let after = ids(&parent);

        assert_eq!(texts(&parent), ["3", "1", "2"]);
        for key in ["1", "2", "3"] {
            assert_eq!(id_of(&after, key), id_of(&before, key));
        }
        assert_eq!(handle.last_patch().created, 0);
    }

    #[test]
    fn mixed_insert_remove_and_move() {
        let parent = Node::element("ul");
        let (items, handle) = list(&parent, None, vec![1, 2, 3, 4, 5, 6]);
        let before = ids(&parent);

        items.set(vec![6, 2, 7, 4, 1]);
        let after = ids(&parent);

        assert_eq!(texts(&parent), ["6", "2", "7", "4", "1"]);
        for key in ["6", "2", "4", "1"] {
            assert_eq!(id_of(&after, key), id_of(&before, key));
        }
        let patch = handle.last_patch();
        assert_eq!(patch.created, 1);
        assert_eq!(patch.removed, 2);
        // Old positions [5, 1, 3, 0]; [1, 3] stays put.
        assert_eq!(patch.moved, 2);
    }

    #[test]
    fn reversal() {
        let parent = Node::element("ul");
        let (items, handle) = list(&parent, None, vec![1, 2, 3, 4]);

        items.set(vec![4, 3, 2, 1]);

        assert_eq!(texts(&parent), ["4", "3", "2", "1"]);
        assert_eq!(handle.last_patch().moved, 3);
    }

    #[test]
    fn duplicate_keys_render_once() {
        let parent = Node::element("ul");
        let (items, handle) = list(&parent, None, vec![1, 1, 2]);
        assert_eq!(texts(&parent), ["1", "2"]);
        assert_eq!(handle.len(), 2);

        items.set(vec![2, 2, 1]);
        assert_eq!(texts(&parent), ["2", "1"]);
    }

    #[test]
    fn explicit_key_function() {
        #[derive(Clone)]
        struct Todo {
            id: u32,
            title: &'static str,
        }

        let parent = Node::element("ul");
        let todos = Cell::new(vec![
            Todo { id: 1, title: "a" },
            Todo { id: 2, title: "b" },
        ]);
        let source = todos.clone();
        let handle = render_list(
            &parent,
            None,
            move || source.get(),
            |todo: &Todo, _| Node::text(todo.title),
            |todo: &Todo, _| todo.id,
        );

        // Same key, new title: the node is reused as is.
        todos.set(vec![
            Todo { id: 2, title: "b" },
            Todo { id: 1, title: "renamed" },
        ]);
        assert_eq!(texts(&parent), ["b", "a"]);
        assert_eq!(handle.last_patch().created, 0);
    }

    #[test]
    fn disposed_list_stops_updating() {
        let parent = Node::element("ul");
        let (items, handle) = list(&parent, None, vec![1]);

        handle.dispose();
        items.set(vec![1, 2]);
        assert_eq!(texts(&parent), ["1"]);
    }
}
