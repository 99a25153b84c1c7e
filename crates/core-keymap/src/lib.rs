//! Prefix-keyed command lookup.
//!
//! Key sequences compile into a small trie; resolution is pure and
//! deterministic, depending only on the pending buffer. A strict prefix of a
//! longer binding reports `NeedMore` so the dispatcher can wait for the rest
//! of a chord (`z` of `zz`), and later bindings override earlier ones.

use smallvec::SmallVec;
use tracing::trace;

/// Logical keys as the dispatcher sees them. Count digits never reach the
/// trie; the viewport's count buffer consumes them first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Ctrl(char),
    Named(NamedKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedKey {
    Enter,
    Esc,
    Backspace,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
}

/// Everything a key sequence can ask the browser to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserCmd {
    SelectNext,
    SelectPrev,
    SelectNextSibling,
    SelectPrevSibling,
    SelectParent,
    SelectFirst,
    SelectLast,
    SelectTop,
    SelectMiddle,
    SelectBottom,
    ScrollDown,
    ScrollUp,
    PageDown,
    PageUp,
    HalfPageDown,
    HalfPageUp,
    CentreSelection,
    ToggleSelection,
    ExpandRecursive,
    /// Reserved: editing is not implemented.
    Edit,
    SearchForward,
    SearchBackward,
    SearchNext,
    SearchPrev,
    ClearQuery,
    Redraw,
    Quit,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub sequence: Vec<Key>,
    pub command: BrowserCmd,
}

#[derive(Debug, Clone)]
struct Edge {
    key: Key,
    next: usize,
}

#[derive(Debug, Clone)]
struct Node {
    terminal: Option<BrowserCmd>,
    edges: SmallVec<[Edge; 4]>,
}

impl Node {
    fn new() -> Self {
        Self {
            terminal: None,
            edges: SmallVec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Keymap {
    nodes: Vec<Node>,
}

/// Outcome of resolving the pending key buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Matched { consumed: usize, command: BrowserCmd },
    /// The whole buffer is a strict prefix of one or more bindings.
    NeedMore,
    /// No binding can ever complete from this buffer.
    Unmapped,
}

impl Keymap {
    pub fn build(bindings: Vec<Binding>) -> Self {
        let mut nodes = vec![Node::new()];
        for binding in bindings {
            let mut cur = 0usize;
            for key in &binding.sequence {
                let next = match nodes[cur].edges.iter().find(|e| e.key == *key) {
                    Some(edge) => edge.next,
                    None => {
                        let idx = nodes.len();
                        nodes.push(Node::new());
                        nodes[cur].edges.push(Edge { key: *key, next: idx });
                        idx
                    }
                };
                cur = next;
            }
            if nodes[cur].terminal.is_some() {
                trace!(target: "input.map", node = cur, "binding_override");
            }
            nodes[cur].terminal = Some(binding.command);
        }
        Self { nodes }
    }

    /// Longest-match resolution over the buffer, from its start.
    pub fn resolve(&self, buffer: &[Key]) -> Resolution {
        let mut node = 0usize;
        let mut matched: Option<(usize, BrowserCmd)> = None;
        let mut consumed_all = true;
        for (i, key) in buffer.iter().enumerate() {
            let Some(edge) = self.nodes[node].edges.iter().find(|e| e.key == *key) else {
                consumed_all = false;
                break;
            };
            node = edge.next;
            trace!(target: "input.map", step = i, node, "advance");
            if let Some(cmd) = self.nodes[node].terminal {
                matched = Some((i + 1, cmd));
            }
        }
        match matched {
            Some((consumed, command)) => Resolution::Matched { consumed, command },
            // A live prefix only counts when every buffered key advanced;
            // a dead tail can never complete and must be dropped.
            None if consumed_all && !self.nodes[node].edges.is_empty() => Resolution::NeedMore,
            None => Resolution::Unmapped,
        }
    }
}

/// The default binding table: the whole browsing surface, arrow/page/home
/// mirrors included.
pub fn default_bindings() -> Vec<Binding> {
    use BrowserCmd::*;
    let one = |key: Key, command: BrowserCmd| Binding {
        sequence: vec![key],
        command,
    };
    vec![
        one(Key::Char('j'), SelectNext),
        one(Key::Char('k'), SelectPrev),
        one(Key::Named(NamedKey::Down), SelectNext),
        one(Key::Named(NamedKey::Up), SelectPrev),
        one(Key::Char('J'), SelectNextSibling),
        one(Key::Char('K'), SelectPrevSibling),
        one(Key::Char('p'), SelectParent),
        one(Key::Char('g'), SelectFirst),
        one(Key::Char('G'), SelectLast),
        one(Key::Named(NamedKey::Home), SelectFirst),
        one(Key::Named(NamedKey::End), SelectLast),
        one(Key::Char('H'), SelectTop),
        one(Key::Char('M'), SelectMiddle),
        one(Key::Char('L'), SelectBottom),
        one(Key::Ctrl('e'), ScrollDown),
        one(Key::Ctrl('y'), ScrollUp),
        one(Key::Ctrl('f'), PageDown),
        one(Key::Ctrl('b'), PageUp),
        one(Key::Named(NamedKey::PageDown), PageDown),
        one(Key::Named(NamedKey::PageUp), PageUp),
        one(Key::Ctrl('d'), HalfPageDown),
        one(Key::Ctrl('u'), HalfPageUp),
        Binding {
            sequence: vec![Key::Char('z'), Key::Char('z')],
            command: CentreSelection,
        },
        one(Key::Char(' '), ToggleSelection),
        one(Key::Char('w'), ExpandRecursive),
        one(Key::Named(NamedKey::Enter), Edit),
        one(Key::Char('/'), SearchForward),
        one(Key::Char('?'), SearchBackward),
        one(Key::Char('n'), SearchNext),
        one(Key::Char('N'), SearchPrev),
        one(Key::Char('c'), ClearQuery),
        one(Key::Ctrl('l'), Redraw),
        one(Key::Char('q'), Quit),
        one(Key::Ctrl('c'), Quit),
    ]
}
