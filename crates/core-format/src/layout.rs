//! The layout engine: walk a [`Fmt`] tree at a display width, producing
//! wrapped styled lines plus the raw-to-screen coordinate map.
//!
//! Invariants maintained here:
//! * `value`, `plain`, and the anchor line indices always agree; `plain` is
//!   `value` with every escape stripped.
//! * A style never spans a line break: each forced or soft break closes the
//!   active slots and reopens them on the next line.
//! * Anchor offsets within a chunk are strictly increasing, and every
//!   recorded rune has an anchor, so translation is exact (a follow-up
//!   anchor after tabs and control runes covers one-past-the-end lookups).

use core_style::{Color, StylePair, fg_reset, fg_seq};

use crate::{Fmt, TAB_CELLS, caret_pair, is_control_rune, rune_width, single_line_width};

/// One entry of the raw-to-screen map: raw rune offset `off` within its
/// chunk renders at rune column `col` of plain line `line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Anchor {
    off: usize,
    line: usize,
    col: usize,
}

/// The result of laying a format tree out at a fixed width.
#[derive(Debug, Clone, PartialEq)]
pub struct Preformatted {
    value: Vec<String>,
    plain: Vec<String>,
    raw: Vec<String>,
    anchors: Vec<Vec<Anchor>>,
}

impl Preformatted {
    /// Number of visual rows; at least one, even for empty content.
    pub fn line_count(&self) -> usize {
        self.value.len()
    }

    /// Styled output line `i`, escapes embedded.
    pub fn styled(&self, i: usize) -> &str {
        &self.value[i]
    }

    /// Escape-free twin of [`styled`](Self::styled).
    pub fn plain(&self, i: usize) -> &str {
        &self.plain[i]
    }

    pub fn raw_chunks(&self) -> &[String] {
        &self.raw
    }

    /// Map a raw position to its on-screen `(line, rune column)`. Positions
    /// past the last anchor resolve through it with a rune-count delta, so
    /// one-past-the-end range bounds land correctly.
    pub fn translate(&self, chunk: usize, off: usize) -> Option<(usize, usize)> {
        let table = self.anchors.get(chunk)?;
        if table.is_empty() {
            return None;
        }
        let i = table.partition_point(|a| a.off <= off);
        let anchor = if i == 0 { &table[0] } else { &table[i - 1] };
        Some((anchor.line, anchor.col + off.saturating_sub(anchor.off)))
    }

}

/// Lay `f` out at `width` terminal cells. Width 0 means unbounded (no soft
/// wrapping). Control runes render in `control` colour.
pub fn format(f: &Fmt, width: usize, control: Color) -> Preformatted {
    let mut lay = Layout::new(width, control);
    lay.walk(f);
    lay.finish()
}

struct Layout {
    width: usize,
    control: Color,
    value: Vec<String>,
    plain: Vec<String>,
    raw: Vec<String>,
    anchors: Vec<Vec<Anchor>>,
    /// Display cells used on the current line.
    col: usize,
    /// Runes on the current plain line.
    col_runes: usize,
    /// Rune offset within the current raw chunk.
    raw_off: usize,
    style: StylePair,
    record: bool,
    /// Soft-wrap suppression depth (inside fitting `nobreak` content).
    nobreak: usize,
}

impl Layout {
    fn new(width: usize, control: Color) -> Self {
        Self {
            width,
            control,
            value: vec![String::new()],
            plain: vec![String::new()],
            raw: vec![String::new()],
            anchors: vec![Vec::new()],
            col: 0,
            col_runes: 0,
            raw_off: 0,
            style: StylePair::default(),
            record: true,
            nobreak: 0,
        }
    }

    fn finish(self) -> Preformatted {
        Preformatted {
            value: self.value,
            plain: self.plain,
            raw: self.raw,
            anchors: self.anchors,
        }
    }

    fn push_styled(&mut self, s: &str) {
        let i = self.value.len() - 1;
        self.value[i].push_str(s);
    }

    /// One visible rune: goes to both the styled line and its plain twin.
    fn push_cell(&mut self, ch: char) {
        let i = self.value.len() - 1;
        self.value[i].push(ch);
        self.plain[i].push(ch);
    }

    /// Break the line, closing and reopening the active style so escapes
    /// never span a row.
    fn newline(&mut self) {
        let close = self.style.close();
        self.push_styled(&close);
        self.value.push(String::new());
        self.plain.push(String::new());
        let open = self.style.open();
        self.push_styled(&open);
        self.col = 0;
        self.col_runes = 0;
    }

    fn wrap_before(&mut self, cells: usize) {
        if self.width > 0 && self.nobreak == 0 && self.col > 0 && self.col + cells > self.width {
            self.newline();
        }
    }

    fn anchor_here(&mut self, off: usize) {
        if !self.record {
            return;
        }
        let line = self.value.len() - 1;
        let col = self.col_runes;
        let chunk = self.anchors.len() - 1;
        let table = &mut self.anchors[chunk];
        if table.last().is_some_and(|a| a.off >= off) {
            return;
        }
        table.push(Anchor { off, line, col });
    }

    fn record_raw(&mut self, ch: char) {
        if self.record {
            let i = self.raw.len() - 1;
            self.raw[i].push(ch);
            self.raw_off += 1;
        }
    }

    fn walk(&mut self, f: &Fmt) {
        match f {
            Fmt::Concat(children) => {
                for c in children {
                    self.walk(c);
                }
            }
            Fmt::Literal(text) => self.literal(text),
            Fmt::Fg(color, child) => {
                let prev = self.style.fg;
                self.style.fg = Some(*color);
                self.push_styled(&fg_seq(*color));
                self.walk(child);
                self.style.fg = prev;
                let restore = match prev {
                    Some(p) => fg_seq(p),
                    None => fg_reset(),
                };
                self.push_styled(&restore);
            }
            Fmt::Bg(color, child) => {
                let prev = self.style.bg;
                self.style.bg = Some(*color);
                self.push_styled(&core_style::bg_seq(*color));
                self.walk(child);
                self.style.bg = prev;
                let restore = match prev {
                    Some(p) => core_style::bg_seq(p),
                    None => core_style::bg_reset(),
                };
                self.push_styled(&restore);
            }
            Fmt::Exclude(child) => {
                let was = self.record;
                if was {
                    self.raw.push(String::new());
                    self.anchors.push(Vec::new());
                    self.raw_off = 0;
                }
                self.record = false;
                self.walk(child);
                self.record = was;
            }
            Fmt::NoBreak(child) => self.nobreak(child),
        }
    }

    fn nobreak(&mut self, child: &Fmt) {
        let Some(w) = single_line_width(child) else {
            // Hard newlines inside defeat the single-line contract; lay out
            // normally rather than guessing.
            self.walk(child);
            return;
        };
        if self.width == 0 || self.nobreak > 0 {
            self.nobreak += 1;
            self.walk(child);
            self.nobreak -= 1;
            return;
        }
        if self.col > 0 && self.col + w > self.width {
            self.newline();
        }
        if w <= self.width {
            self.nobreak += 1;
            self.walk(child);
            self.nobreak -= 1;
        } else {
            // Wider than the whole display: wrap it like ordinary content.
            self.walk(child);
        }
    }

    fn literal(&mut self, text: &str) {
        for ch in text.chars() {
            match ch {
                '\n' => {
                    self.record_raw('\n');
                    self.newline();
                }
                '\t' => {
                    // A tab cannot straddle a wrap; break early when fewer
                    // than TAB_CELLS cells remain.
                    if self.width > 0
                        && self.nobreak == 0
                        && self.col > 0
                        && self.col + TAB_CELLS >= self.width
                    {
                        self.newline();
                    }
                    self.anchor_here(self.raw_off);
                    for _ in 0..TAB_CELLS {
                        self.push_cell(' ');
                    }
                    self.col += TAB_CELLS;
                    self.col_runes += TAB_CELLS;
                    self.record_raw('\t');
                    self.anchor_here(self.raw_off);
                }
                c if is_control_rune(c) => {
                    self.wrap_before(2);
                    self.anchor_here(self.raw_off);
                    self.push_styled(&fg_seq(self.control));
                    for p in caret_pair(c) {
                        self.push_cell(p);
                    }
                    let restore = match self.style.fg {
                        Some(prev) => fg_seq(prev),
                        None => fg_reset(),
                    };
                    self.push_styled(&restore);
                    self.col += 2;
                    self.col_runes += 2;
                    self.record_raw(c);
                    self.anchor_here(self.raw_off);
                }
                c => {
                    let w = rune_width(c);
                    self.wrap_before(w);
                    self.anchor_here(self.raw_off);
                    self.push_cell(c);
                    self.col += w;
                    self.col_runes += 1;
                    self.record_raw(c);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display_width;
    use core_style::Palette;
    use pretty_assertions::assert_eq;

    fn fmt_at(f: &Fmt, width: usize) -> Preformatted {
        format(f, width, Palette::default().keyword)
    }

    fn plains(p: &Preformatted) -> Vec<&str> {
        (0..p.line_count()).map(|i| p.plain(i)).collect()
    }

    #[test]
    fn empty_content_still_has_one_line() {
        let p = fmt_at(&Fmt::empty(), 10);
        assert_eq!(p.line_count(), 1);
        assert_eq!(p.plain(0), "");
    }

    #[test]
    fn soft_wrap_at_width() {
        let p = fmt_at(&Fmt::text("abcdef"), 3);
        assert_eq!(plains(&p), vec!["abc", "def"]);
        // No styling involved, so styled lines match the plain ones.
        assert_eq!(p.styled(0), "abc");
        assert_eq!(p.styled(1), "def");
        // One raw chunk, unwrapped.
        assert_eq!(p.raw_chunks(), &["abcdef".to_string()]);
    }

    #[test]
    fn hard_newlines_break_lines_and_stay_in_raw() {
        let p = fmt_at(&Fmt::text("ab\ncd"), 10);
        assert_eq!(plains(&p), vec!["ab", "cd"]);
        assert_eq!(p.raw_chunks(), &["ab\ncd".to_string()]);
        // First rune after the newline maps to the start of line 1.
        assert_eq!(p.translate(0, 3), Some((1, 0)));
    }

    #[test]
    fn tab_expands_in_place_when_it_fits() {
        let p = fmt_at(&Fmt::text("ab\tz"), 20);
        assert_eq!(plains(&p), vec!["ab    z"]);
        assert_eq!(p.translate(0, 2), Some((0, 2)));
        // 'z' sits after the four expanded cells.
        assert_eq!(p.translate(0, 3), Some((0, 6)));
    }

    #[test]
    fn tab_wraps_when_too_close_to_the_edge() {
        // col 5, width 9: 5 >= 9 - 4, so the tab opens a fresh line.
        let p = fmt_at(&Fmt::text("hello\tworld"), 9);
        assert_eq!(plains(&p), vec!["hello", "    world"]);
    }

    #[test]
    fn trailing_tab_translates_one_past_the_end() {
        let p = fmt_at(&Fmt::text("a\t"), 20);
        assert_eq!(plains(&p), vec!["a    "]);
        // Offset 2 is one past the tab; the follow-up anchor resolves it to
        // the end of the expansion rather than the tab's first cell.
        assert_eq!(p.translate(0, 2), Some((0, 5)));
    }

    #[test]
    fn control_rune_renders_as_caret_pair() {
        let p = fmt_at(&Fmt::text("a\u{1}b"), 20);
        assert_eq!(plains(&p), vec!["a^Ab"]);
        // Raw keeps the original rune.
        assert_eq!(p.raw_chunks(), &["a\u{1}b".to_string()]);
        assert_eq!(p.translate(0, 2), Some((0, 3)));
        let kw = fg_seq(Palette::default().keyword);
        assert!(p.styled(0).contains(&kw));
        assert!(p.styled(0).contains(&fg_reset()));
    }

    #[test]
    fn style_closes_and_reopens_across_wraps() {
        let green = Color::Green;
        let p = fmt_at(&Fmt::fg(green, Fmt::text("abcd")), 2);
        assert_eq!(plains(&p), vec!["ab", "cd"]);
        assert_eq!(p.styled(0), format!("{}ab{}", fg_seq(green), fg_reset()));
        assert_eq!(p.styled(1), format!("{}cd{}", fg_seq(green), fg_reset()));
    }

    #[test]
    fn nested_fg_restores_outer_color() {
        let p = fmt_at(
            &Fmt::fg(
                Color::Blue,
                Fmt::concat(vec![
                    Fmt::text("a"),
                    Fmt::fg(Color::Green, Fmt::text("b")),
                    Fmt::text("c"),
                ]),
            ),
            20,
        );
        let expect = format!(
            "{}a{}b{}c{}",
            fg_seq(Color::Blue),
            fg_seq(Color::Green),
            fg_seq(Color::Blue),
            fg_reset()
        );
        assert_eq!(p.styled(0), expect);
    }

    #[test]
    fn exclude_opens_a_chunk_and_hides_text_from_raw() {
        let f = Fmt::concat(vec![
            Fmt::text("a"),
            Fmt::exclude(Fmt::text("xx")),
            Fmt::text("b"),
        ]);
        let p = fmt_at(&f, 10);
        assert_eq!(plains(&p), vec!["axxb"]);
        assert_eq!(p.raw_chunks(), &["a".to_string(), "b".to_string()]);
        // 'b' lives in the second chunk but maps past the excluded cells.
        assert_eq!(p.translate(1, 0), Some((0, 3)));
    }

    #[test]
    fn nobreak_fits_in_place() {
        let f = Fmt::concat(vec![Fmt::text("abc "), Fmt::nobreak(Fmt::text("defgh"))]);
        let p = fmt_at(&f, 10);
        assert_eq!(plains(&p), vec!["abc defgh"]);
    }

    #[test]
    fn nobreak_starts_fresh_line_when_needed() {
        let f = Fmt::concat(vec![Fmt::text("abc "), Fmt::nobreak(Fmt::text("defghijk"))]);
        let p = fmt_at(&f, 10);
        assert_eq!(plains(&p), vec!["abc ", "defghijk"]);
    }

    #[test]
    fn oversized_nobreak_falls_back_to_wrapping() {
        let f = Fmt::nobreak(Fmt::text("abcdefgh"));
        let p = fmt_at(&f, 5);
        assert_eq!(plains(&p), vec!["abcde", "fgh"]);
        for i in 0..p.line_count() {
            assert!(display_width(p.plain(i)) <= 5);
        }
    }

    #[test]
    fn wide_runes_wrap_by_cells_not_runes() {
        let p = fmt_at(&Fmt::text("漢漢漢"), 4);
        assert_eq!(plains(&p), vec!["漢漢", "漢"]);
    }

    #[test]
    fn unbounded_width_never_wraps() {
        let p = fmt_at(&Fmt::text("a".repeat(500)), 0);
        assert_eq!(p.line_count(), 1);
        assert_eq!(display_width(p.plain(0)), 500);
    }
}
