//! Declarative styled content and the width-wrapping layout engine.
//!
//! A [`Fmt`] tree describes what a document node looks like; [`format`] lays
//! it out at a display width and yields a [`Preformatted`] carrying styled
//! output lines, their escape-free twins, the raw searchable text, and the
//! raw-to-screen coordinate map. All display-width decisions flow through
//! [`rune_width`] so no caller measures cells on its own.

use unicode_width::UnicodeWidthChar;

pub use core_style::Color;

mod layout;
mod search;

pub use layout::{Preformatted, format};
pub use search::{MatchRange, contains};

/// Cells a tab expands to.
pub const TAB_CELLS: usize = 4;

/// Control runes render as a visible caret pair; tab and newline are handled
/// structurally by the layout engine and are not control runes here.
pub fn is_control_rune(ch: char) -> bool {
    matches!(ch as u32, 0..=8 | 11..=31 | 127)
}

/// Two-cell visible form of a control rune: caret plus `(ord + 64) mod 128`.
pub fn caret_pair(ch: char) -> [char; 2] {
    let shifted = (ch as u32 + 64) % 128;
    ['^', char::from_u32(shifted).unwrap_or('?')]
}

/// Terminal cell width of one rune. Runes the width tables reject count as
/// zero cells rather than poisoning column arithmetic.
pub fn rune_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

/// Cell width of an escape-free string.
pub fn display_width(s: &str) -> usize {
    s.chars().map(rune_width).sum()
}

/// Cells occupied by the first `rune_col` runes of an escape-free string.
pub fn cells_before(s: &str, rune_col: usize) -> usize {
    s.chars().take(rune_col).map(rune_width).sum()
}

/// A declarative, immutable description of styled content.
#[derive(Debug, Clone, PartialEq)]
pub enum Fmt {
    /// In-order composition.
    Concat(Vec<Fmt>),
    /// Paint the child's foreground slot.
    Fg(Color, Box<Fmt>),
    /// Paint the child's background slot.
    Bg(Color, Box<Fmt>),
    /// Keep the child on one output line, starting a fresh line first if it
    /// would not fit the remaining width.
    NoBreak(Box<Fmt>),
    /// Raw text; may contain `\n`, `\t`, and arbitrary runes.
    Literal(String),
    /// Rendered visually but omitted from the raw searchable stream.
    Exclude(Box<Fmt>),
}

impl Fmt {
    pub fn text(t: impl Into<String>) -> Self {
        Fmt::Literal(t.into())
    }

    pub fn empty() -> Self {
        Fmt::Literal(String::new())
    }

    pub fn fg(color: Color, child: Fmt) -> Self {
        Fmt::Fg(color, Box::new(child))
    }

    pub fn bg(color: Color, child: Fmt) -> Self {
        Fmt::Bg(color, Box::new(child))
    }

    pub fn nobreak(child: Fmt) -> Self {
        Fmt::NoBreak(Box::new(child))
    }

    pub fn exclude(child: Fmt) -> Self {
        Fmt::Exclude(Box::new(child))
    }

    pub fn concat(children: Vec<Fmt>) -> Self {
        Fmt::Concat(children)
    }
}

/// Width of `f` if it were laid out on a single unbounded line, or `None`
/// when a hard newline makes that impossible. Excluded children count: they
/// occupy cells even though they are invisible to search.
pub fn single_line_width(f: &Fmt) -> Option<usize> {
    match f {
        Fmt::Literal(s) => {
            let mut w = 0usize;
            for ch in s.chars() {
                match ch {
                    '\n' => return None,
                    '\t' => w += TAB_CELLS,
                    c if is_control_rune(c) => w += 2,
                    c => w += rune_width(c),
                }
            }
            Some(w)
        }
        Fmt::Concat(children) => {
            let mut w = 0usize;
            for c in children {
                w += single_line_width(c)?;
            }
            Some(w)
        }
        Fmt::Fg(_, c) | Fmt::Bg(_, c) | Fmt::NoBreak(c) | Fmt::Exclude(c) => single_line_width(c),
    }
}
