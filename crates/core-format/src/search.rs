//! Literal substring search over preformatted content.
//!
//! [`contains`] is the cheap pre-format check used while walking the
//! document; [`Preformatted::find`] produces the on-screen ranges used for
//! highlighting. Matching is byte-based (`str::find`), positions are
//! reported in runes, and excluded subtrees never participate.

use crate::{Fmt, Preformatted};

/// One match, as half-open `(line, rune column)` screen coordinates over a
/// node's plain lines. A match may span soft-wrapped lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchRange {
    pub start: (usize, usize),
    pub end: (usize, usize),
}

impl MatchRange {
    /// Rune-column span of this match on `line`, clipped to a line that
    /// holds `line_runes` runes. `None` when the match does not touch the
    /// line or clips to nothing.
    pub fn span_on_line(&self, line: usize, line_runes: usize) -> Option<(usize, usize)> {
        if line < self.start.0 || line > self.end.0 {
            return None;
        }
        let s = if line == self.start.0 { self.start.1 } else { 0 };
        let e = if line == self.end.0 {
            self.end.1.min(line_runes)
        } else {
            line_runes
        };
        (s < e).then_some((s, e))
    }
}

/// Does any literal in `f` contain `query`? Excluded subtrees are skipped.
/// Matches never span adjacent literals; the displayed search works the same
/// way through the raw chunk boundaries.
pub fn contains(f: &Fmt, query: &str) -> bool {
    if query.is_empty() {
        return false;
    }
    match f {
        Fmt::Literal(s) => s.contains(query),
        Fmt::Concat(children) => children.iter().any(|c| contains(c, query)),
        Fmt::Fg(_, c) | Fmt::Bg(_, c) | Fmt::NoBreak(c) => contains(c, query),
        Fmt::Exclude(_) => false,
    }
}

impl Preformatted {
    /// Every occurrence of `query` in the raw chunks, mapped to screen
    /// ranges. Ranges are disjoint and in document order.
    pub fn find(&self, query: &str) -> Vec<MatchRange> {
        if query.is_empty() {
            return Vec::new();
        }
        let query_runes = query.chars().count();
        let mut out = Vec::new();
        for (chunk_index, chunk) in self.raw_chunks().iter().enumerate() {
            let mut byte = 0usize;
            let mut runes = 0usize;
            while let Some(found) = chunk[byte..].find(query) {
                let at = byte + found;
                runes += chunk[byte..at].chars().count();
                let start = self.translate(chunk_index, runes);
                let end = self.translate(chunk_index, runes + query_runes);
                if let (Some(start), Some(end)) = (start, end) {
                    out.push(MatchRange { start, end });
                }
                byte = at + query.len();
                runes += query_runes;
            }
        }
        out
    }
}
