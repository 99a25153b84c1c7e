//! The viewport/selection controller.
//!
//! Owns the visible tree and the output sink, and maintains the screen
//! equation: the node rendered at canvas row `r` is `move(start, r)`, the
//! selection's anchor row is `offset` (its first row while `down`, its last
//! row otherwise), and `lineno` is the absolute document row at the top of
//! the canvas. Every operation repaints the smallest region that restores
//! the equation: region shifts for small scrolls, row spans for selection
//! moves, everything below the selection for expansion changes.

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::Result;
use core_format::cells_before;
use core_style::{bg_reset, bg_seq, fg_reset, fg_seq};
use core_term::Writer;
use core_tree::{NodeId, Pos, ViewTree, prefix_width};
use tracing::debug;

mod status;

pub use status::{StatusContext, StatusSegment, compose_status, format_status};

/// Everything needed to put the viewport back exactly as it was (the prompt
/// restores this when a search is cancelled).
#[derive(Debug, Clone)]
pub struct ViewSnapshot {
    start: Pos,
    sel: NodeId,
    offset: isize,
    down: bool,
    lineno: usize,
    query: Option<String>,
    search_back: bool,
}

pub struct Viewport<W: Write> {
    tree: ViewTree,
    out: W,
    /// Topmost visible row; never the past-end sentinel.
    start: Pos,
    sel: NodeId,
    /// Screen row of the selection anchor.
    offset: isize,
    /// Anchor selector: first row of the selection when true, last when false.
    down: bool,
    width: usize,
    /// Canvas rows; the status line sits on the row below.
    height: usize,
    query: Option<String>,
    search_back: bool,
    /// Absolute row at the top of the canvas (informational).
    lineno: usize,
    numbuf: String,
    last_click: Option<(Instant, NodeId)>,
}

const COUNT_DIGITS_MAX: usize = 6;

impl<W: Write> Viewport<W> {
    /// `cols`/`rows` is the full terminal size; one row is reserved for the
    /// status line.
    pub fn new(tree: ViewTree, cols: usize, rows: usize, out: W) -> Self {
        let root = tree.root();
        Self {
            tree,
            out,
            start: Pos::at(root),
            sel: root,
            offset: 0,
            down: true,
            width: cols,
            height: rows.saturating_sub(1).max(1),
            query: None,
            search_back: false,
            lineno: 0,
            numbuf: String::new(),
            last_click: None,
        }
    }

    // ----- accessors ------------------------------------------------------

    pub fn tree(&self) -> &ViewTree {
        &self.tree
    }

    /// Everything written to the sink so far (tests replay these bytes
    /// against a screen model to compare repaint strategies).
    pub fn sink(&self) -> &W {
        &self.out
    }

    pub fn selected(&self) -> NodeId {
        self.sel
    }

    /// Topmost visible position.
    pub fn start(&self) -> Pos {
        self.start
    }

    pub fn offset(&self) -> isize {
        self.offset
    }

    pub fn down(&self) -> bool {
        self.down
    }

    pub fn top_line(&self) -> usize {
        self.lineno
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Canvas rows (status line excluded).
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn search_back(&self) -> bool {
        self.search_back
    }

    pub fn set_search_back(&mut self, backward: bool) {
        self.search_back = backward;
    }

    /// Node currently rendered at canvas row `row`.
    pub fn node_at_row(&self, row: usize) -> Option<NodeId> {
        self.tree.move_by(self.start, row as isize, false).node
    }

    // ----- geometry helpers ----------------------------------------------

    fn anchor_pos(&self, id: NodeId, down: bool) -> Pos {
        if down {
            Pos::at(id)
        } else {
            Pos::new(id, self.tree.lines(id) - 1)
        }
    }

    /// Screen row of `to`, negative when it lies above the canvas top.
    fn signed_row(&self, to: Pos) -> isize {
        match self.tree.distance_fwd(self.start, to) {
            Some(d) => d as isize,
            None => -(self.tree.distance_fwd(to, self.start).unwrap_or(0) as isize),
        }
    }

    fn row_of_first(&self, id: NodeId) -> isize {
        self.signed_row(Pos::at(id))
    }

    // ----- painting -------------------------------------------------------

    /// Erase and repaint canvas rows `[first, last)`.
    pub fn draw_rows(&mut self, first: usize, last: usize) -> Result<()> {
        let last = last.min(self.height);
        if first >= last {
            return Ok(());
        }
        let mut w = Writer::new();
        let mut pos = self.tree.move_by(self.start, first as isize, false);
        for row in first..last {
            self.draw_row(&mut w, row, pos);
            if pos.node.is_some() {
                pos = self.tree.move_by(pos, 1, false);
            }
        }
        w.flush_to(&mut self.out)
    }

    fn draw_row(&mut self, w: &mut Writer, row: usize, pos: Pos) {
        w.move_to(0, row as u16);
        let Some(id) = pos.node else {
            w.clear_to_eol();
            return;
        };
        let palette = *self.tree.adapter().palette();
        let selected = id == self.sel;
        if selected {
            // Background first: erase-to-EOL floods the row with it.
            w.print(bg_seq(palette.selection_bg));
        }
        w.clear_to_eol();
        w.print(fg_seq(palette.muted));
        w.print(self.prefix_string(id, pos.line));
        w.print(fg_reset());
        w.print(self.tree.displayed(id).styled(pos.line).to_string());
        if selected {
            w.print(bg_reset());
        }
        if let Some(q) = self.query.clone() {
            self.overlay_matches(w, row, id, pos.line, &q);
        }
    }

    /// Re-print the match segments of one row over the already-drawn line.
    fn overlay_matches(&mut self, w: &mut Writer, row: usize, id: NodeId, line: usize, query: &str) {
        let palette = *self.tree.adapter().palette();
        let indent = prefix_width(self.tree.depth(id));
        let plain = self.tree.displayed(id).plain(line).to_string();
        let line_runes = plain.chars().count();
        let spans: Vec<(usize, usize)> = self
            .tree
            .matches(id, query)
            .iter()
            .filter_map(|m| m.span_on_line(line, line_runes))
            .collect();
        for (s, e) in spans {
            let x = indent + cells_before(&plain, s);
            if x >= self.width {
                continue;
            }
            let text: String = plain.chars().skip(s).take(e - s).collect();
            w.move_to(x as u16, row as u16);
            w.print(format!(
                "{}{}{}{}{}",
                fg_seq(palette.match_fg),
                bg_seq(palette.match_bg),
                text,
                bg_reset(),
                fg_reset()
            ));
        }
    }

    fn prefix_string(&self, id: NodeId, line: usize) -> String {
        let depth = self.tree.depth(id);
        if line > 0 {
            return " ".repeat(prefix_width(depth));
        }
        let mut s = "  ".repeat(depth);
        if self.tree.expandable(id) {
            s.push(if self.tree.expanded(id) { '▾' } else { '▸' });
            s.push(' ');
        } else {
            s.push_str("  ");
        }
        s
    }

    /// Repaint the on-screen rows of one node (used for selection moves).
    fn repaint_node_rows(&mut self, id: NodeId) -> Result<()> {
        let first = self.row_of_first(id);
        let last = first + self.tree.lines(id) as isize;
        let a = first.max(0) as usize;
        let b = last.clamp(0, self.height as isize) as usize;
        self.draw_rows(a, b)
    }

    pub fn draw_status(&mut self) -> Result<()> {
        let ctx = StatusContext {
            query: self.query.as_deref(),
            backward: self.search_back,
            count: &self.numbuf,
            top_line: self.lineno,
        };
        let text = format_status(&compose_status(&ctx), self.width);
        let mut w = Writer::new();
        w.move_to(0, self.height as u16);
        w.clear_to_eol();
        w.print(text);
        w.flush_to(&mut self.out)
    }

    /// Paint arbitrary text on the status row (the prompt borrows it).
    pub fn paint_status_text(&mut self, text: &str) -> Result<()> {
        let mut w = Writer::new();
        w.move_to(0, self.height as u16);
        w.clear_to_eol();
        w.print(text.to_string());
        w.flush_to(&mut self.out)
    }

    /// Full repaint of canvas and status.
    pub fn draw_all(&mut self) -> Result<()> {
        self.draw_rows(0, self.height)?;
        self.draw_status()
    }

    /// Clear the terminal and repaint from scratch.
    pub fn refresh(&mut self) -> Result<()> {
        let mut w = Writer::new();
        w.clear_all();
        w.flush_to(&mut self.out)?;
        self.draw_all()
    }

    // ----- scrolling ------------------------------------------------------

    /// Move the canvas top by `by` rows (positive scrolls forward). Shifts
    /// the already-drawn region when the move is small, repaints everything
    /// otherwise, and drags the selection back on screen when it falls off.
    pub fn scroll(&mut self, by: isize) -> Result<()> {
        if by == 0 {
            return Ok(());
        }
        let old_start = self.start;
        let target = self.tree.move_by(old_start, by, true);
        let diff: isize = if by > 0 {
            self.tree.distance_fwd(old_start, target).unwrap_or(0) as isize
        } else {
            -(self.tree.distance_fwd(target, old_start).unwrap_or(0) as isize)
        };
        if diff == 0 {
            return Ok(());
        }
        self.start = target;
        self.offset -= diff;
        self.lineno = (self.lineno as isize + diff).max(0) as usize;
        let old_sel = self.clamp_selection();
        debug!(target: "view.scroll", diff, offset = self.offset, lineno = self.lineno, "scroll");

        if diff.unsigned_abs() >= self.height {
            self.draw_all()?;
        } else if diff > 0 {
            let mut w = Writer::new();
            w.move_to(0, 0);
            w.delete_lines(diff as u16);
            w.flush_to(&mut self.out)?;
            self.draw_rows(self.height - diff as usize, self.height)?;
            self.finish_scroll_repaint(old_sel)?;
        } else {
            let rows = (-diff) as usize;
            let mut w = Writer::new();
            w.move_to(0, 0);
            w.insert_lines(rows as u16);
            w.flush_to(&mut self.out)?;
            self.draw_rows(0, rows)?;
            self.finish_scroll_repaint(old_sel)?;
        }
        Ok(())
    }

    fn finish_scroll_repaint(&mut self, old_sel: Option<NodeId>) -> Result<()> {
        if let Some(old) = old_sel {
            self.repaint_node_rows(old)?;
            self.repaint_node_rows(self.sel)?;
        }
        // The region shift dragged the status row; repaint it always.
        self.draw_status()
    }

    /// Bring the selection back inside the canvas after a scroll, walking
    /// the chain in the scroll direction and flipping `down` accordingly.
    fn clamp_selection(&mut self) -> Option<NodeId> {
        let first = self.signed_row(self.anchor_pos(self.sel, true));
        let last = first + self.tree.lines(self.sel) as isize - 1;
        if last < 0 {
            let old = self.sel;
            let mut node = self.sel;
            let mut last_row = last;
            while last_row < 0 {
                let Some(next) = self.tree.next(node) else {
                    break;
                };
                let next_first = last_row + 1;
                node = next;
                last_row = next_first + self.tree.lines(next) as isize - 1;
            }
            self.sel = node;
            self.down = true;
            self.offset = last_row - (self.tree.lines(node) as isize - 1);
            (old != node).then_some(old)
        } else if first >= self.height as isize {
            let old = self.sel;
            let mut node = self.sel;
            let mut first_row = first;
            while first_row >= self.height as isize {
                let Some(prev) = self.tree.prev(node) else {
                    break;
                };
                node = prev;
                first_row -= self.tree.lines(prev) as isize;
            }
            self.sel = node;
            self.down = false;
            self.offset = first_row + self.tree.lines(node) as isize - 1;
            (old != node).then_some(old)
        } else {
            None
        }
    }

    /// Centre the selection anchor.
    pub fn centre(&mut self) -> Result<()> {
        self.scroll(self.offset - (self.height as isize) / 2)
    }

    // ----- selection ------------------------------------------------------

    /// Select `target`, adjusting the anchor by the row distance between the
    /// two anchors and scrolling minimally if it left the canvas.
    pub fn select(&mut self, target: NodeId) -> Result<()> {
        if target == self.sel {
            return Ok(());
        }
        let old = self.sel;
        let forward = self.tree.is_before(old, target);
        let from = self.anchor_pos(old, self.down);
        let to = self.anchor_pos(target, forward);
        let delta: isize = if forward {
            self.tree.distance_fwd(from, to).unwrap_or(0) as isize
        } else {
            -(self.tree.distance_fwd(to, from).unwrap_or(0) as isize)
        };
        self.sel = target;
        self.down = forward;
        self.offset += delta;
        debug!(target: "view.select", forward, offset = self.offset, "select");
        if self.offset < 0 {
            self.scroll(self.offset)?;
        } else if self.offset >= self.height as isize {
            self.scroll(self.offset - self.height as isize + 1)?;
        }
        self.repaint_node_rows(old)?;
        self.repaint_node_rows(self.sel)?;
        self.draw_status()
    }

    pub fn select_next(&mut self, count: usize) -> Result<()> {
        let mut target = self.sel;
        for _ in 0..count {
            match self.tree.next(target) {
                Some(n) => target = n,
                None => break,
            }
        }
        self.select(target)
    }

    pub fn select_prev(&mut self, count: usize) -> Result<()> {
        let mut target = self.sel;
        for _ in 0..count {
            match self.tree.prev(target) {
                Some(n) => target = n,
                None => break,
            }
        }
        self.select(target)
    }

    pub fn select_next_sibling(&mut self, count: usize) -> Result<()> {
        let mut target = self.sel;
        for _ in 0..count {
            match self.tree.nextsib(target) {
                Some(n) => target = n,
                None => break,
            }
        }
        self.select(target)
    }

    pub fn select_prev_sibling(&mut self, count: usize) -> Result<()> {
        let mut target = self.sel;
        for _ in 0..count {
            match self.tree.prevsib(target) {
                Some(n) => target = n,
                None => break,
            }
        }
        self.select(target)
    }

    pub fn select_parent(&mut self, count: usize) -> Result<()> {
        let mut target = self.sel;
        for _ in 0..count {
            match self.tree.parent(target) {
                Some(n) => target = n,
                None => break,
            }
        }
        self.select(target)
    }

    pub fn select_first(&mut self) -> Result<()> {
        let root = self.tree.root();
        self.select(root)
    }

    pub fn select_last(&mut self) -> Result<()> {
        let tail = self.tree.tail();
        self.select(tail)
    }

    /// Select whatever is rendered at canvas row `row`.
    pub fn selpos(&mut self, row: usize) -> Result<()> {
        let row = row.min(self.height.saturating_sub(1));
        let pos = self.tree.move_by(self.start, row as isize, true);
        match pos.node {
            Some(id) => self.select(id),
            None => Ok(()),
        }
    }

    pub fn select_top(&mut self) -> Result<()> {
        self.selpos(0)
    }

    pub fn select_middle(&mut self) -> Result<()> {
        self.selpos(self.height / 2)
    }

    pub fn select_bottom(&mut self) -> Result<()> {
        self.selpos(self.height.saturating_sub(1))
    }

    // ----- expansion ------------------------------------------------------

    /// Toggle the selection's expansion and repaint the affected region
    /// (everything from its first row down).
    pub fn toggle_sel(&mut self) -> Result<()> {
        if !self.tree.expanded(self.sel) && !self.tree.expandable(self.sel) {
            return Ok(());
        }
        self.structure_change(|tree, sel| tree.toggle(sel))
    }

    /// Recursively expand the selection's subtree.
    pub fn expand_sel_recursive(&mut self) -> Result<()> {
        if !self.tree.expandable(self.sel) {
            return Ok(());
        }
        self.structure_change(|tree, sel| tree.expand_recursive(sel))
    }

    fn structure_change(&mut self, apply: impl FnOnce(&mut ViewTree, NodeId)) -> Result<()> {
        let mut first = self.row_of_first(self.sel);
        if first < 0 {
            // The selection starts above the screen; pin the canvas top to
            // its first row so the anchor math stays clamped.
            self.lineno = (self.lineno as isize + first).max(0) as usize;
            self.start = Pos::at(self.sel);
            first = 0;
        }
        apply(&mut self.tree, self.sel);
        if self.start.node == Some(self.sel) {
            let max_line = self.tree.lines(self.sel) - 1;
            if self.start.line > max_line {
                self.start.line = max_line;
            }
        }
        let rows = self.tree.lines(self.sel) as isize;
        self.offset = if self.down { first } else { first + rows - 1 };
        if self.offset >= self.height as isize {
            self.scroll(self.offset - self.height as isize + 1)?;
            first = self.row_of_first(self.sel);
        }
        self.draw_rows(first.max(0) as usize, self.height)?;
        self.draw_status()
    }

    // ----- resize ---------------------------------------------------------

    /// Reformat every visible node at the new size and repaint everything.
    pub fn resize(&mut self, cols: usize, rows: usize) -> Result<()> {
        self.width = cols;
        self.height = rows.saturating_sub(1).max(1);
        self.tree.reformat_all(cols);
        if let Some(node) = self.start.node {
            let max_line = self.tree.lines(node) - 1;
            if self.start.line > max_line {
                self.start.line = max_line;
            }
        }
        self.lineno = self
            .tree
            .distance_fwd(Pos::at(self.tree.root()), self.start)
            .unwrap_or(0);
        let anchor = self.anchor_pos(self.sel, self.down);
        self.offset = self.signed_row(anchor);
        if self.offset < 0 {
            self.scroll(self.offset)?;
        } else if self.offset >= self.height as isize {
            self.scroll(self.offset - self.height as isize + 1)?;
        }
        debug!(target: "view.resize", cols, rows, "resize");
        self.refresh()
    }

    // ----- search ---------------------------------------------------------

    /// Update the active query and repaint exactly the rows whose match set
    /// changed.
    pub fn set_query(&mut self, query: Option<String>) -> Result<()> {
        let old_query = self.query.clone();
        self.query = query;
        let mut row = 0usize;
        let mut pos = self.start;
        let mut regions: Vec<(usize, usize)> = Vec::new();
        while row < self.height {
            let Some(id) = pos.node else {
                break;
            };
            let old_hits = match &old_query {
                Some(oq) => self
                    .tree
                    .cached_matches(id, oq)
                    .map(|s| s.to_vec())
                    .unwrap_or_default(),
                None => Vec::new(),
            };
            let new_hits = match self.query.clone() {
                Some(nq) => self.tree.matches(id, &nq).to_vec(),
                None => Vec::new(),
            };
            let span = self.tree.lines(id) - pos.line;
            let end = (row + span).min(self.height);
            if old_hits != new_hits {
                regions.push((row, end));
            }
            row = end;
            pos = self.tree.move_by(pos, span as isize, false);
        }
        for (a, b) in regions {
            self.draw_rows(a, b)?;
        }
        self.draw_status()
    }

    /// Jump to the `|n|`-th match in the search direction (reversed when `n`
    /// is negative), expanding collapsed ancestors along the way. Fewer
    /// matches than requested selects the furthest one; none is a no-op.
    pub fn search_next(&mut self, n: isize) -> Result<()> {
        let Some(query) = self.query.clone() else {
            return Ok(());
        };
        let backward = self.search_back ^ (n < 0);
        let wanted = n.unsigned_abs().max(1);
        let origin = self.tree.doc_id(self.sel);
        let mut found = None;
        {
            let mut iter = self.tree.search_from(origin, &query, backward);
            for _ in 0..wanted {
                match iter.next() {
                    Some(id) => found = Some(id),
                    None => break,
                }
            }
        }
        let Some(hit) = found else {
            return Ok(());
        };
        let path = self.tree.doc().path(hit);
        let (node, changed) = self.tree.reveal(&path);
        if changed {
            // Expansion may have inserted rows between the canvas top and
            // the selection; restore the bookkeeping before moving.
            self.lineno = self
                .tree
                .distance_fwd(Pos::at(self.tree.root()), self.start)
                .unwrap_or(0);
            self.offset = self.signed_row(self.anchor_pos(self.sel, self.down));
        }
        debug!(target: "view.search", backward, changed, "search_next");
        self.select(node)?;
        if changed { self.draw_all() } else { Ok(()) }
    }

    // ----- mouse ----------------------------------------------------------

    /// Select the node at canvas row `y`; a second click on it within one
    /// second also toggles it.
    pub fn click(&mut self, y: usize, now: Instant) -> Result<()> {
        if y >= self.height {
            return Ok(());
        }
        let Some(id) = self.tree.move_by(self.start, y as isize, false).node else {
            return Ok(());
        };
        let double = self
            .last_click
            .take()
            .is_some_and(|(at, node)| node == id && now.duration_since(at) <= Duration::from_secs(1));
        self.select(id)?;
        if double {
            self.toggle_sel()?;
        } else {
            self.last_click = Some((now, id));
        }
        Ok(())
    }

    // ----- count prefix ---------------------------------------------------

    /// Accumulate a digit; capped at six digits, leading zero rejected.
    pub fn push_count_digit(&mut self, digit: char) -> Result<()> {
        if !digit.is_ascii_digit() || (self.numbuf.is_empty() && digit == '0') {
            return Ok(());
        }
        if self.numbuf.len() < COUNT_DIGITS_MAX {
            self.numbuf.push(digit);
        }
        self.draw_status()
    }

    /// Consume the count buffer: `max(1, parsed)`.
    pub fn take_count(&mut self) -> usize {
        let n: usize = self.numbuf.parse().unwrap_or(0);
        self.numbuf.clear();
        n.max(1)
    }

    pub fn pending_count(&self) -> &str {
        &self.numbuf
    }

    /// Drop an unconsumed count after a non-movement command.
    pub fn reset_count(&mut self) -> Result<()> {
        if self.numbuf.is_empty() {
            return Ok(());
        }
        self.numbuf.clear();
        self.draw_status()
    }

    // ----- snapshots ------------------------------------------------------

    pub fn snapshot(&self) -> ViewSnapshot {
        ViewSnapshot {
            start: self.start,
            sel: self.sel,
            offset: self.offset,
            down: self.down,
            lineno: self.lineno,
            query: self.query.clone(),
            search_back: self.search_back,
        }
    }

    /// Restore a snapshot taken in the same tree shape and repaint.
    pub fn restore(&mut self, snap: ViewSnapshot) -> Result<()> {
        self.start = snap.start;
        self.sel = snap.sel;
        self.offset = snap.offset;
        self.down = snap.down;
        self.lineno = snap.lineno;
        self.query = snap.query;
        self.search_back = snap.search_back;
        self.draw_all()
    }
}
