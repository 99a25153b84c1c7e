//! The visible tree: exactly the currently-expanded portion of the document,
//! kept as a doubly-linked chain of list nodes with sibling and parent
//! shortcuts.
//!
//! Nodes live in an arena (`Vec<Option<ListNode>>` plus a free list) and all
//! links are handle indices, so the cyclic link structure needs no reference
//! counting. Structural invariants:
//! * `a.next == Some(b)` iff `b.prev == Some(a)`; the chain starts at the
//!   root and ends at the unique node whose `next` is `None`.
//! * `nextsib` points at the first following node whose depth does not
//!   exceed the node's own; `prevsib` is the mirror, with a first child's
//!   `prevsib` being its parent.
//! * A node's `children` holds its visible children in document order and is
//!   non-empty only while `expanded`.
//!
//! Children are created as a complete run when their parent expands and are
//! destroyed when it collapses; there is no general-position insertion, which
//! is what keeps the sibling links correct by construction.

use core_doc::{Adapter, DocId, Document};
use core_format::{Fmt, MatchRange, Preformatted, format};
use tracing::debug;

mod pos;
mod search;

pub use pos::Pos;

/// Handle into the visible-tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Cells of row prefix (tree glyphs) a node at `depth` is drawn behind.
pub fn prefix_width(depth: usize) -> usize {
    2 * depth + 2
}

#[derive(Debug)]
struct ListNode {
    doc: DocId,
    expanded: bool,
    last: bool,
    content: Preformatted,
    placeholder: Preformatted,
    /// Search cache over the currently displayed preformatted content.
    query: Option<String>,
    matches: Vec<MatchRange>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    prevsib: Option<NodeId>,
    nextsib: Option<NodeId>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

pub struct ViewTree {
    doc: Document,
    adapter: Adapter,
    arena: Vec<Option<ListNode>>,
    free: Vec<usize>,
    root: NodeId,
    width: usize,
}

impl ViewTree {
    /// Build the visible tree for `doc` at a terminal width. The root node
    /// is created and immediately expanded.
    pub fn new(doc: Document, adapter: Adapter, width: usize) -> Self {
        let mut tree = Self {
            doc,
            adapter,
            arena: Vec::new(),
            free: Vec::new(),
            root: NodeId(0),
            width,
        };
        let root_doc = tree.doc.root();
        let root = tree.alloc(root_doc);
        tree.root = root;
        tree.node_mut(root).last = true;
        tree.expand(root);
        tree
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn width(&self) -> usize {
        self.width
    }

    fn node(&self, id: NodeId) -> &ListNode {
        self.arena[id.0].as_ref().expect("stale node handle")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut ListNode {
        self.arena[id.0].as_mut().expect("stale node handle")
    }

    fn render(&self, doc_id: DocId) -> (Preformatted, Preformatted) {
        let depth = self.doc.depth(doc_id);
        let avail = self.width.saturating_sub(prefix_width(depth)).max(1);
        let keyword = self.adapter.palette().keyword;
        let content = format(&self.adapter.content(&self.doc, doc_id), avail, keyword);
        let placeholder = format(&self.adapter.placeholder(&self.doc, doc_id), avail, keyword);
        (content, placeholder)
    }

    fn alloc(&mut self, doc_id: DocId) -> NodeId {
        let (content, placeholder) = self.render(doc_id);
        let node = ListNode {
            doc: doc_id,
            expanded: false,
            last: false,
            content,
            placeholder,
            query: None,
            matches: Vec::new(),
            prev: None,
            next: None,
            prevsib: None,
            nextsib: None,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(slot) => {
                self.arena[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.arena.push(Some(node));
                NodeId(self.arena.len() - 1)
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        self.arena[id.0] = None;
        self.free.push(id.0);
    }

    // ----- link accessors -------------------------------------------------

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next
    }

    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev
    }

    pub fn nextsib(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).nextsib
    }

    pub fn prevsib(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prevsib
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn doc_id(&self, id: NodeId) -> DocId {
        self.node(id).doc
    }

    pub fn depth(&self, id: NodeId) -> usize {
        self.doc.depth(self.node(id).doc)
    }

    pub fn expanded(&self, id: NodeId) -> bool {
        self.node(id).expanded
    }

    pub fn is_last_child(&self, id: NodeId) -> bool {
        self.node(id).last
    }

    /// Can this node be expanded (a container with at least one child)?
    pub fn expandable(&self, id: NodeId) -> bool {
        !self.doc.children(self.node(id).doc).is_empty()
    }

    /// The preformatted content currently on display: the full content while
    /// collapsed, the key placeholder while expanded.
    pub fn displayed(&self, id: NodeId) -> &Preformatted {
        let n = self.node(id);
        if n.expanded { &n.placeholder } else { &n.content }
    }

    /// Rows the node currently occupies; at least one.
    pub fn lines(&self, id: NodeId) -> usize {
        self.displayed(id).line_count()
    }

    /// Last node of the visible chain.
    pub fn tail(&self) -> NodeId {
        let mut cur = self.root;
        while let Some(next) = self.node(cur).next {
            cur = next;
        }
        cur
    }

    /// Strict document pre-order over visible nodes: path compare.
    pub fn is_before(&self, a: NodeId, b: NodeId) -> bool {
        self.doc.path(self.node(a).doc) < self.doc.path(self.node(b).doc)
    }

    // ----- expansion ------------------------------------------------------

    /// Create and splice in one list node per document child. No-op when
    /// already expanded or childless.
    pub fn expand(&mut self, id: NodeId) {
        if self.node(id).expanded {
            return;
        }
        let doc_id = self.node(id).doc;
        let kid_docs: Vec<DocId> = self.doc.children(doc_id).to_vec();
        if kid_docs.is_empty() {
            return;
        }
        // While collapsed, `next` and `nextsib` agree: the successor at no
        // greater depth.
        let after = self.node(id).nextsib;
        let kids: Vec<NodeId> = kid_docs.iter().map(|&d| self.alloc(d)).collect();
        let count = kids.len();
        for (i, &kid) in kids.iter().enumerate() {
            let before = if i == 0 { id } else { kids[i - 1] };
            let following = if i + 1 < count { Some(kids[i + 1]) } else { after };
            let n = self.node_mut(kid);
            n.parent = Some(id);
            n.last = i + 1 == count;
            n.prev = Some(before);
            n.prevsib = Some(before);
            n.next = following;
            n.nextsib = following;
        }
        self.node_mut(id).next = Some(kids[0]);
        if let Some(a) = after {
            self.node_mut(a).prev = Some(kids[count - 1]);
        }
        let n = self.node_mut(id);
        n.expanded = true;
        n.children = kids;
        // The displayed preformatted flipped to the placeholder.
        n.query = None;
        debug!(target: "tree.expand", children = count, "expand");
    }

    /// Splice the node's subtree out of the chain and destroy it.
    pub fn collapse(&mut self, id: NodeId) {
        if !self.node(id).expanded {
            return;
        }
        let after = self.node(id).nextsib;
        let mut stack: Vec<NodeId> = self.node(id).children.clone();
        let mut destroyed = 0usize;
        while let Some(kid) = stack.pop() {
            stack.extend(self.node(kid).children.iter().copied());
            self.release(kid);
            destroyed += 1;
        }
        self.node_mut(id).next = after;
        if let Some(a) = after {
            self.node_mut(a).prev = Some(id);
        }
        let n = self.node_mut(id);
        n.expanded = false;
        n.children.clear();
        n.query = None;
        debug!(target: "tree.collapse", destroyed, "collapse");
    }

    /// Expand when expandable, collapse otherwise.
    pub fn toggle(&mut self, id: NodeId) {
        if !self.node(id).expanded && self.expandable(id) {
            self.expand(id);
        } else {
            self.collapse(id);
        }
    }

    /// Expand the whole subtree under `id`, pre-order, without recursion.
    pub fn expand_recursive(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            self.expand(cur);
            stack.extend(self.node(cur).children.iter().rev().copied());
        }
    }

    /// Expand collapsed ancestors along a document path, returning the list
    /// node for the path's end and whether anything actually expanded.
    pub fn reveal(&mut self, path: &[usize]) -> (NodeId, bool) {
        let mut cur = self.root;
        let mut changed = false;
        for &index in path {
            if !self.node(cur).expanded {
                self.expand(cur);
                changed = true;
            }
            cur = self.node(cur).children[index];
        }
        (cur, changed)
    }

    // ----- formatting and search caches -----------------------------------

    /// Recompute every node's preformatted content at a new terminal width.
    pub fn reformat_all(&mut self, width: usize) {
        self.width = width;
        let ids: Vec<NodeId> = (0..self.arena.len())
            .filter(|&i| self.arena[i].is_some())
            .map(NodeId)
            .collect();
        for id in ids {
            let doc_id = self.node(id).doc;
            let (content, placeholder) = self.render(doc_id);
            let n = self.node_mut(id);
            n.content = content;
            n.placeholder = placeholder;
            n.query = None;
            n.matches.clear();
        }
    }

    /// Match ranges of `query` over the node's displayed content, cached per
    /// node until the query or the displayed content changes.
    pub fn matches(&mut self, id: NodeId, query: &str) -> &[MatchRange] {
        let stale = self.node(id).query.as_deref() != Some(query);
        if stale {
            let hits = self.displayed(id).find(query);
            let n = self.node_mut(id);
            n.query = Some(query.to_string());
            n.matches = hits;
        }
        &self.node(id).matches
    }

    /// The cached ranges if they are current for `query`, without computing.
    pub fn cached_matches(&self, id: NodeId, query: &str) -> Option<&[MatchRange]> {
        let n = self.node(id);
        (n.query.as_deref() == Some(query)).then_some(n.matches.as_slice())
    }

    /// Content format for an arbitrary document node (used by the search
    /// iterator, which looks beyond the expanded region).
    pub fn content_fmt(&self, doc_id: DocId) -> Fmt {
        self.adapter.content(&self.doc, doc_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_style::Palette;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn tree_of(value: serde_json::Value, width: usize) -> ViewTree {
        let doc = Document::from_json(&value);
        ViewTree::new(doc, Adapter::new(Palette::default()), width)
    }

    fn visible_keys(tree: &ViewTree) -> Vec<String> {
        let mut out = Vec::new();
        let mut cur = Some(tree.root());
        while let Some(id) = cur {
            out.push(tree.doc().key(tree.doc_id(id)).to_string());
            cur = tree.next(id);
        }
        out
    }

    /// Re-derive every link from the chain and check the module invariants
    /// globally: mirrored next/prev, sibling shortcuts by depth, children
    /// matching expansion state, and the chain covering exactly the live
    /// arena slots.
    fn assert_structure(tree: &ViewTree) {
        assert_eq!(tree.prev(tree.root()), None);
        let mut chain = vec![tree.root()];
        while let Some(next) = tree.next(*chain.last().expect("chain is never empty")) {
            assert_eq!(
                tree.prev(next),
                Some(*chain.last().expect("chain is never empty")),
                "prev must mirror next"
            );
            chain.push(next);
        }
        let mut chain_slots: Vec<usize> = chain.iter().map(|id| id.0).collect();
        chain_slots.sort_unstable();
        let live_slots: Vec<usize> = (0..tree.arena.len())
            .filter(|&i| tree.arena[i].is_some())
            .collect();
        assert_eq!(
            chain_slots, live_slots,
            "the chain visits every live node exactly once"
        );
        for (i, &node) in chain.iter().enumerate() {
            assert!(tree.lines(node) >= 1);
            let depth = tree.depth(node);
            let expect_next = chain[i + 1..]
                .iter()
                .copied()
                .find(|&m| tree.depth(m) <= depth);
            assert_eq!(
                tree.nextsib(node),
                expect_next,
                "nextsib is the first successor at no greater depth"
            );
            let expect_prev = chain[..i]
                .iter()
                .rev()
                .copied()
                .find(|&m| tree.depth(m) <= depth);
            assert_eq!(
                tree.prevsib(node),
                expect_prev,
                "prevsib is the last predecessor at no greater depth"
            );
            if tree.expanded(node) {
                let doc_kids = tree.doc().children(tree.doc_id(node)).to_vec();
                assert_eq!(tree.children(node).len(), doc_kids.len());
                for (k, &kid) in tree.children(node).iter().enumerate() {
                    assert_eq!(tree.parent(kid), Some(node));
                    assert_eq!(tree.doc_id(kid), doc_kids[k]);
                    assert_eq!(tree.is_last_child(kid), k + 1 == doc_kids.len());
                    assert_eq!(tree.depth(kid), depth + 1);
                }
            } else {
                assert!(tree.children(node).is_empty());
            }
        }
    }

    #[test]
    fn root_starts_expanded() {
        let tree = tree_of(json!({"a": 1, "b": [2, 3]}), 60);
        assert!(tree.expanded(tree.root()));
        assert_eq!(visible_keys(&tree), vec!["", "a", "b"]);
    }

    #[test]
    fn expand_and_collapse_restore_the_chain() {
        let mut tree = tree_of(json!({"a": 1, "b": [2, 3]}), 60);
        let b = tree.children(tree.root())[1];
        tree.expand(b);
        assert_eq!(visible_keys(&tree), vec!["", "a", "b", "0", "1"]);
        assert_structure(&tree);
        tree.collapse(b);
        assert_eq!(visible_keys(&tree), vec!["", "a", "b"]);
        assert_structure(&tree);
        // prev-links mirror next-links after the splice.
        let mut cur = tree.tail();
        let mut reversed = vec![tree.doc().key(tree.doc_id(cur)).to_string()];
        while let Some(p) = tree.prev(cur) {
            reversed.push(tree.doc().key(tree.doc_id(p)).to_string());
            cur = p;
        }
        reversed.reverse();
        assert_eq!(reversed, vec!["", "a", "b"]);
    }

    #[test]
    fn sibling_links_skip_subtrees() {
        let mut tree = tree_of(json!({"a": 1, "b": [2, 3], "c": 4}), 60);
        let kids: Vec<NodeId> = tree.children(tree.root()).to_vec();
        let (a, b, c) = (kids[0], kids[1], kids[2]);
        tree.expand(b);
        assert_eq!(tree.nextsib(a), Some(b));
        assert_eq!(tree.nextsib(b), Some(c));
        // a -> b's subtree -> c via next, but siblings jump over it.
        assert_eq!(tree.next(b), Some(tree.children(b)[0]));
        let b1 = tree.children(b)[1];
        assert_eq!(tree.nextsib(b1), Some(c));
        assert_eq!(tree.prevsib(tree.children(b)[0]), Some(b));
        assert_eq!(tree.prevsib(c), Some(b));
        assert!(tree.is_last_child(c));
        assert!(!tree.is_last_child(b));
        assert_structure(&tree);
    }

    #[test]
    fn toggle_expands_then_collapses() {
        let mut tree = tree_of(json!([[1]]), 60);
        let outer = tree.children(tree.root())[0];
        tree.toggle(outer);
        assert!(tree.expanded(outer));
        tree.toggle(outer);
        assert!(!tree.expanded(outer));
        // Scalars toggle to nothing.
        tree.toggle(outer);
        let inner = tree.children(outer)[0];
        tree.toggle(inner);
        assert!(tree.expanded(inner));
        let leaf = tree.children(inner)[0];
        tree.toggle(leaf);
        assert!(!tree.expanded(leaf));
    }

    #[test]
    fn expand_recursive_reaches_all_levels() {
        let mut tree = tree_of(json!([[1, 2, 3]]), 60);
        tree.expand_recursive(tree.root());
        assert_eq!(visible_keys(&tree), vec!["", "0", "0", "1", "2"]);
        assert_structure(&tree);
    }

    #[test]
    fn is_before_matches_preorder() {
        let mut tree = tree_of(json!({"a": 1, "b": [2, 3], "c": 4}), 60);
        let b = tree.children(tree.root())[1];
        tree.expand(b);
        let mut order = Vec::new();
        let mut cur = Some(tree.root());
        while let Some(id) = cur {
            order.push(id);
            cur = tree.next(id);
        }
        for i in 0..order.len() {
            for j in 0..order.len() {
                assert_eq!(tree.is_before(order[i], order[j]), i < j);
            }
        }
    }

    #[test]
    fn reveal_expands_ancestors_once() {
        let mut tree = tree_of(json!({"b": {"c": {"d": 1}}}), 60);
        let doc_d = tree.doc().node_at(&[0, 0, 0]).expect("path exists");
        let path = tree.doc().path(doc_d);
        let (node, changed) = tree.reveal(&path);
        assert!(changed);
        assert_eq!(tree.doc_id(node), doc_d);
        let (again, changed_again) = tree.reveal(&path);
        assert_eq!(again, node);
        assert!(!changed_again);
        assert_structure(&tree);
    }

    #[test]
    fn match_cache_invalidated_by_toggle() {
        let mut tree = tree_of(json!({"b": [2, 3]}), 60);
        let b = tree.children(tree.root())[0];
        assert_eq!(tree.matches(b, "b").len(), 1);
        assert!(tree.cached_matches(b, "b").is_some());
        tree.expand(b);
        // Displayed content flipped to the placeholder; cache dropped.
        assert!(tree.cached_matches(b, "b").is_none());
        assert_eq!(tree.matches(b, "b").len(), 1);
    }

    #[test]
    fn reformat_changes_line_counts() {
        let mut tree = tree_of(json!({"k": "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"}), 80);
        let k = tree.children(tree.root())[0];
        assert_eq!(tree.lines(k), 1);
        tree.reformat_all(14);
        assert!(tree.lines(k) > 1);
        assert!(tree.cached_matches(k, "a").is_none());
    }

    #[test]
    fn arena_slots_are_reused() {
        let mut tree = tree_of(json!([1, 2, 3, 4]), 60);
        let before = tree.arena.len();
        tree.collapse(tree.root());
        tree.expand(tree.root());
        assert_eq!(tree.arena.len(), before);
        assert_structure(&tree);
    }

    #[test]
    fn structure_invariants_hold_through_expand_collapse_sequences() {
        let mut tree = tree_of(
            json!({"a": [1, {"x": [2, 3]}], "b": {"c": 4, "d": [5]}, "e": 6}),
            60,
        );
        assert_structure(&tree);
        let a = tree.children(tree.root())[0];
        let b = tree.children(tree.root())[1];
        tree.expand(a);
        assert_structure(&tree);
        let a1 = tree.children(a)[1];
        tree.expand_recursive(a1);
        assert_structure(&tree);
        tree.expand(b);
        assert_structure(&tree);
        tree.collapse(a);
        assert_structure(&tree);
        let d = tree.children(b)[1];
        tree.expand(d);
        assert_structure(&tree);
        tree.collapse(tree.root());
        assert_structure(&tree);
        tree.expand(tree.root());
        assert_structure(&tree);
    }
}
