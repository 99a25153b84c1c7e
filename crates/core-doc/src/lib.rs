//! The immutable source document.
//!
//! A parsed `serde_json::Value` is flattened once at load into an arena of
//! [`DocNode`]s addressed by [`DocId`]. Each node carries its key (array
//! element keys are decimal indices, the root key is empty), its index among
//! its parent's children, its parent, and its depth, so navigation never
//! re-derives context from the JSON value. Object members keep insertion
//! order (`serde_json/preserve_order`).

use serde_json::Value;

mod adapter;

pub use adapter::Adapter;

/// Handle into [`Document`]'s node arena. Stable for the document lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocId(usize);

/// Scalar payload kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Scalar(Scalar),
    Array(Vec<DocId>),
    Object(Vec<DocId>),
}

/// Node kind as exposed to renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Integer,
    Float,
    Bool,
    Null,
    String,
    Array,
    Object,
}

#[derive(Debug, Clone)]
struct DocNode {
    key: String,
    index: usize,
    parent: Option<DocId>,
    depth: usize,
    payload: Payload,
}

/// A flattened, immutable JSON document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<DocNode>,
}

const EMPTY: &[DocId] = &[];

impl Document {
    pub fn from_json(value: &Value) -> Self {
        let mut doc = Document { nodes: Vec::new() };
        doc.push_value(value, String::new(), 0, None, 0);
        doc
    }

    fn push_value(
        &mut self,
        value: &Value,
        key: String,
        index: usize,
        parent: Option<DocId>,
        depth: usize,
    ) -> DocId {
        let id = DocId(self.nodes.len());
        self.nodes.push(DocNode {
            key,
            index,
            parent,
            depth,
            payload: Payload::Scalar(Scalar::Null),
        });
        let payload = match value {
            Value::Null => Payload::Scalar(Scalar::Null),
            Value::Bool(b) => Payload::Scalar(Scalar::Bool(*b)),
            Value::Number(n) => Payload::Scalar(number_scalar(n)),
            Value::String(s) => Payload::Scalar(Scalar::Str(s.clone())),
            Value::Array(items) => {
                let mut kids = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    kids.push(self.push_value(item, i.to_string(), i, Some(id), depth + 1));
                }
                Payload::Array(kids)
            }
            Value::Object(members) => {
                let mut kids = Vec::with_capacity(members.len());
                for (i, (k, v)) in members.iter().enumerate() {
                    kids.push(self.push_value(v, k.clone(), i, Some(id), depth + 1));
                }
                Payload::Object(kids)
            }
        };
        self.nodes[id.0].payload = payload;
        id
    }

    pub fn root(&self) -> DocId {
        DocId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn key(&self, id: DocId) -> &str {
        &self.nodes[id.0].key
    }

    pub fn index(&self, id: DocId) -> usize {
        self.nodes[id.0].index
    }

    pub fn parent(&self, id: DocId) -> Option<DocId> {
        self.nodes[id.0].parent
    }

    pub fn depth(&self, id: DocId) -> usize {
        self.nodes[id.0].depth
    }

    pub fn kind(&self, id: DocId) -> Kind {
        match &self.nodes[id.0].payload {
            Payload::Scalar(Scalar::Integer(_)) => Kind::Integer,
            Payload::Scalar(Scalar::Float(_)) => Kind::Float,
            Payload::Scalar(Scalar::Bool(_)) => Kind::Bool,
            Payload::Scalar(Scalar::Null) => Kind::Null,
            Payload::Scalar(Scalar::Str(_)) => Kind::String,
            Payload::Array(_) => Kind::Array,
            Payload::Object(_) => Kind::Object,
        }
    }

    pub fn scalar(&self, id: DocId) -> Option<&Scalar> {
        match &self.nodes[id.0].payload {
            Payload::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Children in document order; empty for scalars.
    pub fn children(&self, id: DocId) -> &[DocId] {
        match &self.nodes[id.0].payload {
            Payload::Array(kids) | Payload::Object(kids) => kids,
            Payload::Scalar(_) => EMPTY,
        }
    }

    pub fn is_container(&self, id: DocId) -> bool {
        matches!(
            self.nodes[id.0].payload,
            Payload::Array(_) | Payload::Object(_)
        )
    }

    /// Child indices from the root down to `id`. Empty for the root.
    pub fn path(&self, id: DocId) -> Vec<usize> {
        let mut out = Vec::with_capacity(self.depth(id));
        let mut cur = id;
        while let Some(p) = self.parent(cur) {
            out.push(self.index(cur));
            cur = p;
        }
        out.reverse();
        out
    }

    pub fn node_at(&self, path: &[usize]) -> Option<DocId> {
        let mut cur = self.root();
        for &i in path {
            cur = *self.children(cur).get(i)?;
        }
        Some(cur)
    }

    /// Pre-order successor over the whole document.
    pub fn dfs_next(&self, id: DocId) -> Option<DocId> {
        if let Some(&first) = self.children(id).first() {
            return Some(first);
        }
        let mut cur = id;
        loop {
            let parent = self.parent(cur)?;
            let siblings = self.children(parent);
            if let Some(&next) = siblings.get(self.index(cur) + 1) {
                return Some(next);
            }
            cur = parent;
        }
    }

    /// Pre-order predecessor over the whole document.
    pub fn dfs_prev(&self, id: DocId) -> Option<DocId> {
        let parent = self.parent(id)?;
        let index = self.index(id);
        if index == 0 {
            return Some(parent);
        }
        let mut cur = self.children(parent)[index - 1];
        while let Some(&last) = self.children(cur).last() {
            cur = last;
        }
        Some(cur)
    }
}

fn number_scalar(n: &serde_json::Number) -> Scalar {
    if let Some(i) = n.as_i64() {
        Scalar::Integer(i)
    } else if let Some(f) = n.as_f64() {
        // u64 beyond i64 range degrades to float kind.
        Scalar::Float(f)
    } else {
        Scalar::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Document {
        Document::from_json(&json!({"a": 1, "b": [2, 3]}))
    }

    #[test]
    fn flatten_preserves_member_order_and_keys() {
        let doc = sample();
        let root = doc.root();
        assert_eq!(doc.kind(root), Kind::Object);
        assert_eq!(doc.key(root), "");
        let kids = doc.children(root);
        assert_eq!(kids.len(), 2);
        assert_eq!(doc.key(kids[0]), "a");
        assert_eq!(doc.key(kids[1]), "b");
        let b_kids = doc.children(kids[1]);
        assert_eq!(doc.key(b_kids[0]), "0");
        assert_eq!(doc.key(b_kids[1]), "1");
        assert_eq!(doc.index(b_kids[1]), 1);
        assert_eq!(doc.depth(b_kids[1]), 2);
        assert_eq!(doc.parent(b_kids[0]), Some(kids[1]));
    }

    #[test]
    fn path_and_node_at_round_trip() {
        let doc = sample();
        for i in 0..doc.len() {
            let id = DocId(i);
            assert_eq!(doc.node_at(&doc.path(id)), Some(id));
        }
        assert_eq!(doc.path(doc.root()), Vec::<usize>::new());
    }

    #[test]
    fn dfs_order_is_preorder() {
        let doc = sample();
        let mut order = vec![doc.root()];
        while let Some(next) = doc.dfs_next(*order.last().expect("nonempty")) {
            order.push(next);
        }
        assert_eq!(order.len(), doc.len());
        let keys: Vec<&str> = order.iter().map(|&id| doc.key(id)).collect();
        assert_eq!(keys, vec!["", "a", "b", "0", "1"]);
        // dfs_prev walks the same order backwards.
        for pair in order.windows(2) {
            assert_eq!(doc.dfs_prev(pair[1]), Some(pair[0]));
        }
        assert_eq!(doc.dfs_prev(doc.root()), None);
    }

    #[test]
    fn number_kinds() {
        let doc = Document::from_json(&json!([1, 2.5, true, null, "s"]));
        let kids = doc.children(doc.root());
        assert_eq!(doc.kind(kids[0]), Kind::Integer);
        assert_eq!(doc.kind(kids[1]), Kind::Float);
        assert_eq!(doc.kind(kids[2]), Kind::Bool);
        assert_eq!(doc.kind(kids[3]), Kind::Null);
        assert_eq!(doc.kind(kids[4]), Kind::String);
    }
}
