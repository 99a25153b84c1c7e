//! One-line modal input with its own cursor.
//!
//! The prompt owns a single line of text and a cursor that moves by extended
//! grapheme cluster, never splitting one. The dispatcher feeds it keys while
//! a search is being typed and observes every edit, so the query can be
//! applied live and rolled back on cancel. Rendering is width-aware and
//! horizontally scrolled so the cursor stays on screen even with wide
//! characters.

use core_keymap::{Key, NamedKey};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

/// What a key did to the prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptEvent {
    /// Buffer text changed; re-apply the live query and redraw.
    Changed,
    /// Cursor moved without a text change; redraw only.
    Moved,
    Accepted(String),
    Cancelled,
    /// Not a prompt key.
    Unhandled,
}

#[derive(Debug)]
pub struct Prompt {
    prefix: char,
    buf: String,
    /// Byte offset into `buf`, always a grapheme boundary.
    cursor: usize,
    history: Vec<String>,
    hist_pos: Option<usize>,
    stash: String,
}

fn prev_boundary(line: &str, byte: usize) -> usize {
    let mut last = 0;
    for (idx, _) in line.grapheme_indices(true) {
        if idx >= byte {
            break;
        }
        last = idx;
    }
    last
}

fn next_boundary(line: &str, byte: usize) -> usize {
    for (idx, _) in line.grapheme_indices(true) {
        if idx > byte {
            return idx;
        }
    }
    line.len()
}

impl Prompt {
    /// `prefix` is the echo of the key that opened the prompt (`/` or `?`).
    pub fn new(prefix: char, history: Vec<String>) -> Self {
        Self {
            prefix,
            buf: String::new(),
            cursor: 0,
            history,
            hist_pos: None,
            stash: String::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.buf
    }

    pub fn prefix(&self) -> char {
        self.prefix
    }

    pub fn handle_key(&mut self, key: Key) -> PromptEvent {
        match key {
            Key::Char(c) => {
                self.buf.insert(self.cursor, c);
                self.cursor += c.len_utf8();
                PromptEvent::Changed
            }
            Key::Named(NamedKey::Backspace) | Key::Ctrl('h') => {
                if self.cursor == 0 {
                    return PromptEvent::Moved;
                }
                let start = prev_boundary(&self.buf, self.cursor);
                self.buf.drain(start..self.cursor);
                self.cursor = start;
                PromptEvent::Changed
            }
            Key::Named(NamedKey::Delete) => {
                if self.cursor >= self.buf.len() {
                    return PromptEvent::Moved;
                }
                let end = next_boundary(&self.buf, self.cursor);
                self.buf.drain(self.cursor..end);
                PromptEvent::Changed
            }
            Key::Ctrl('u') => {
                if self.cursor == 0 {
                    return PromptEvent::Moved;
                }
                self.buf.drain(..self.cursor);
                self.cursor = 0;
                PromptEvent::Changed
            }
            Key::Named(NamedKey::Left) => {
                self.cursor = prev_boundary(&self.buf, self.cursor);
                PromptEvent::Moved
            }
            Key::Named(NamedKey::Right) => {
                if self.cursor < self.buf.len() {
                    self.cursor = next_boundary(&self.buf, self.cursor);
                }
                PromptEvent::Moved
            }
            Key::Named(NamedKey::Home) | Key::Ctrl('a') => {
                self.cursor = 0;
                PromptEvent::Moved
            }
            Key::Named(NamedKey::End) | Key::Ctrl('e') => {
                self.cursor = self.buf.len();
                PromptEvent::Moved
            }
            Key::Named(NamedKey::Up) => self.history_up(),
            Key::Named(NamedKey::Down) => self.history_down(),
            Key::Named(NamedKey::Enter) => PromptEvent::Accepted(self.buf.clone()),
            Key::Named(NamedKey::Esc) | Key::Ctrl('c') => PromptEvent::Cancelled,
            _ => PromptEvent::Unhandled,
        }
    }

    fn history_up(&mut self) -> PromptEvent {
        let next = match self.hist_pos {
            None if self.history.is_empty() => return PromptEvent::Moved,
            None => {
                self.stash = std::mem::take(&mut self.buf);
                self.history.len() - 1
            }
            Some(0) => return PromptEvent::Moved,
            Some(p) => p - 1,
        };
        self.hist_pos = Some(next);
        self.buf = self.history[next].clone();
        self.cursor = self.buf.len();
        PromptEvent::Changed
    }

    fn history_down(&mut self) -> PromptEvent {
        match self.hist_pos {
            None => PromptEvent::Moved,
            Some(p) if p + 1 < self.history.len() => {
                self.hist_pos = Some(p + 1);
                self.buf = self.history[p + 1].clone();
                self.cursor = self.buf.len();
                PromptEvent::Changed
            }
            Some(_) => {
                self.hist_pos = None;
                self.buf = std::mem::take(&mut self.stash);
                self.cursor = self.buf.len();
                PromptEvent::Changed
            }
        }
    }

    /// Visible window of the line for a row of `width` cells, plus the
    /// cursor's cell within that window. The window slides right in whole
    /// clusters until the cursor fits.
    pub fn render(&self, width: usize) -> (String, usize) {
        if width == 0 {
            return (String::new(), 0);
        }
        let full = format!("{}{}", self.prefix, self.buf);
        let cursor_cells = 1 + self.buf[..self.cursor].width();
        let mut skip_bytes = 0usize;
        let mut skip_cells = 0usize;
        // Keep one spare cell so the cursor can sit after the last rune.
        while cursor_cells.saturating_sub(skip_cells) >= width {
            let step = next_boundary(&full, skip_bytes);
            skip_cells += full[skip_bytes..step].width();
            skip_bytes = step;
        }
        let mut shown = String::new();
        let mut used = 0usize;
        let mut at = skip_bytes;
        while at < full.len() {
            let step = next_boundary(&full, at);
            let w = full[at..step].width();
            if used + w > width {
                break;
            }
            shown.push_str(&full[at..step]);
            used += w;
            at = step;
        }
        (shown, cursor_cells.saturating_sub(skip_cells))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn feed(prompt: &mut Prompt, text: &str) {
        for c in text.chars() {
            prompt.handle_key(Key::Char(c));
        }
    }

    #[test]
    fn insert_and_backspace_by_cluster() {
        let mut p = Prompt::new('/', Vec::new());
        feed(&mut p, "ae");
        // Combining acute joins the previous 'e' into one cluster.
        p.handle_key(Key::Char('\u{301}'));
        assert_eq!(p.text(), "ae\u{301}");
        assert_eq!(p.handle_key(Key::Named(NamedKey::Backspace)), PromptEvent::Changed);
        assert_eq!(p.text(), "a");
        p.handle_key(Key::Named(NamedKey::Backspace));
        assert_eq!(p.text(), "");
        // At the start backspace is a cursor no-op.
        assert_eq!(p.handle_key(Key::Named(NamedKey::Backspace)), PromptEvent::Moved);
    }

    #[test]
    fn cursor_motion_and_mid_insert() {
        let mut p = Prompt::new('/', Vec::new());
        feed(&mut p, "ac");
        p.handle_key(Key::Named(NamedKey::Left));
        p.handle_key(Key::Char('b'));
        assert_eq!(p.text(), "abc");
        p.handle_key(Key::Named(NamedKey::Home));
        p.handle_key(Key::Named(NamedKey::Delete));
        assert_eq!(p.text(), "bc");
        p.handle_key(Key::Named(NamedKey::End));
        p.handle_key(Key::Char('!'));
        assert_eq!(p.text(), "bc!");
    }

    #[test]
    fn kill_to_start() {
        let mut p = Prompt::new('/', Vec::new());
        feed(&mut p, "hello");
        p.handle_key(Key::Named(NamedKey::Left));
        assert_eq!(p.handle_key(Key::Ctrl('u')), PromptEvent::Changed);
        assert_eq!(p.text(), "o");
    }

    #[test]
    fn history_walks_up_and_restores_stash() {
        let mut p = Prompt::new('/', vec!["first".into(), "second".into()]);
        feed(&mut p, "part");
        p.handle_key(Key::Named(NamedKey::Up));
        assert_eq!(p.text(), "second");
        p.handle_key(Key::Named(NamedKey::Up));
        assert_eq!(p.text(), "first");
        // Clamped at the oldest entry.
        assert_eq!(p.handle_key(Key::Named(NamedKey::Up)), PromptEvent::Moved);
        p.handle_key(Key::Named(NamedKey::Down));
        assert_eq!(p.text(), "second");
        p.handle_key(Key::Named(NamedKey::Down));
        assert_eq!(p.text(), "part");
    }

    #[test]
    fn accept_and_cancel() {
        let mut p = Prompt::new('?', Vec::new());
        feed(&mut p, "abc");
        assert_eq!(
            p.handle_key(Key::Named(NamedKey::Enter)),
            PromptEvent::Accepted("abc".into())
        );
        assert_eq!(p.handle_key(Key::Named(NamedKey::Esc)), PromptEvent::Cancelled);
    }

    #[test]
    fn render_includes_prefix_and_cursor_cell() {
        let mut p = Prompt::new('/', Vec::new());
        feed(&mut p, "abc");
        let (shown, cursor) = p.render(20);
        assert_eq!(shown, "/abc");
        assert_eq!(cursor, 4);
    }

    #[test]
    fn render_scrolls_to_keep_cursor_visible() {
        let mut p = Prompt::new('/', Vec::new());
        feed(&mut p, "abcdefghij");
        let (shown, cursor) = p.render(6);
        assert!(cursor < 6);
        assert!(shown.ends_with('j'));
    }

    #[test]
    fn render_counts_wide_runes_in_cells() {
        let mut p = Prompt::new('/', Vec::new());
        feed(&mut p, "漢字");
        let (shown, cursor) = p.render(20);
        assert_eq!(shown, "/漢字");
        assert_eq!(cursor, 5);
    }
}
