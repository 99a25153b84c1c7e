//! Colour and style primitives.
//!
//! Every escape byte the browser emits for colour goes through this crate so
//! the rest of the workspace never hand-formats SGR sequences. Escape strings
//! are rendered by crossterm's `Command::write_ansi`, which covers the named
//! 8/16 colours, 256-colour indexed values, and the per-slot defaults
//! (`39`/`49`).

use std::fmt::Write as _;

use crossterm::Command;
use crossterm::style::{SetBackgroundColor, SetForegroundColor};

pub use crossterm::style::Color;

/// Render a crossterm command into its escape string.
fn ansi(cmd: impl Command) -> String {
    let mut s = String::new();
    // Writing into a String cannot fail.
    let _ = cmd.write_ansi(&mut s);
    s
}

/// Escape string that switches the foreground to `color`.
pub fn fg_seq(color: Color) -> String {
    ansi(SetForegroundColor(color))
}

/// Escape string that switches the background to `color`.
pub fn bg_seq(color: Color) -> String {
    ansi(SetBackgroundColor(color))
}

/// Escape string restoring the terminal's default foreground.
pub fn fg_reset() -> String {
    ansi(SetForegroundColor(Color::Reset))
}

/// Escape string restoring the terminal's default background.
pub fn bg_reset() -> String {
    ansi(SetBackgroundColor(Color::Reset))
}

/// The active colour state of one layout position: an optional override per
/// slot. `None` means the terminal default.
///
/// Styles nest by slot, not by stack depth: entering a foreground override
/// leaves the background slot untouched and vice versa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StylePair {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
}

impl StylePair {
    pub fn is_plain(&self) -> bool {
        self.fg.is_none() && self.bg.is_none()
    }

    /// Escapes that (re)establish this style from the default state.
    /// Emitted after every forced line break so no style spans a wrap.
    pub fn open(&self) -> String {
        let mut s = String::new();
        if let Some(fg) = self.fg {
            let _ = s.write_str(&fg_seq(fg));
        }
        if let Some(bg) = self.bg {
            let _ = s.write_str(&bg_seq(bg));
        }
        s
    }

    /// Escapes that return every active slot to the terminal default.
    pub fn close(&self) -> String {
        let mut s = String::new();
        if self.fg.is_some() {
            let _ = s.write_str(&fg_reset());
        }
        if self.bg.is_some() {
            let _ = s.write_str(&bg_reset());
        }
        s
    }
}

/// Colour assignments for everything the browser draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    /// Object member names and array indices.
    pub key: Color,
    /// String scalar values.
    pub string: Color,
    /// Integer and float scalar values.
    pub number: Color,
    /// `true` / `false` / `null`, and the caret pair a control rune renders as.
    pub keyword: Color,
    /// Tree glyphs, punctuation, collapsed-container summaries.
    pub muted: Color,
    /// Background of the selected node's rows.
    pub selection_bg: Color,
    /// Search match overlay.
    pub match_fg: Color,
    pub match_bg: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            key: Color::Blue,
            string: Color::Green,
            number: Color::Magenta,
            keyword: Color::Yellow,
            muted: Color::DarkGrey,
            selection_bg: Color::AnsiValue(237),
            match_fg: Color::Black,
            match_bg: Color::DarkYellow,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resets_use_per_slot_defaults() {
        assert_eq!(fg_reset(), "\x1b[39m");
        assert_eq!(bg_reset(), "\x1b[49m");
    }

    #[test]
    fn indexed_colors_use_256_form() {
        assert_eq!(fg_seq(Color::AnsiValue(237)), "\x1b[38;5;237m");
        assert_eq!(bg_seq(Color::AnsiValue(17)), "\x1b[48;5;17m");
    }

    #[test]
    fn open_close_round_trip() {
        let style = StylePair {
            fg: Some(Color::Green),
            bg: None,
        };
        assert_eq!(style.open(), fg_seq(Color::Green));
        assert_eq!(style.close(), fg_reset());
        assert!(StylePair::default().open().is_empty());
        assert!(StylePair::default().close().is_empty());
    }

    #[test]
    fn close_covers_both_slots() {
        let style = StylePair {
            fg: Some(Color::Red),
            bg: Some(Color::AnsiValue(17)),
        };
        assert_eq!(style.close(), format!("{}{}", fg_reset(), bg_reset()));
    }
}
