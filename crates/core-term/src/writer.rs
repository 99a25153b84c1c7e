//! Batched terminal writer.
//!
//! Repaints queue primitive operations and flush once, so a scroll or a
//! selection move reaches the terminal as a single write. Positions are
//! absolute, (0,0) origin; the caller ensures bounds.
//!
//! Region shifts use `CSI n M` (delete lines) and `CSI n L` (insert lines)
//! at the cursor; crossterm has no command for those, so they are emitted as
//! raw sequences through the same batch.

use anyhow::Result;
use crossterm::{
    cursor::MoveTo,
    queue,
    style::Print,
    terminal::{Clear, ClearType},
};
use std::io::{Write, stdout};

#[derive(Debug)]
pub enum Command {
    MoveTo(u16, u16),
    /// Erase from the cursor to the end of the line (fills with the current
    /// background on BCE terminals).
    ClearToEol,
    ClearAll,
    Print(String),
    /// Delete `n` lines at the cursor row; lines below shift up.
    DeleteLines(u16),
    /// Insert `n` blank lines at the cursor row; lines below shift down.
    InsertLines(u16),
}

#[derive(Default)]
pub struct Writer {
    cmds: Vec<Command>,
}

impl Writer {
    pub fn new() -> Self {
        Self { cmds: Vec::new() }
    }

    pub fn move_to(&mut self, x: u16, y: u16) {
        self.cmds.push(Command::MoveTo(x, y));
    }

    pub fn clear_to_eol(&mut self) {
        self.cmds.push(Command::ClearToEol);
    }

    pub fn clear_all(&mut self) {
        self.cmds.push(Command::ClearAll);
    }

    pub fn print<S: Into<String>>(&mut self, s: S) {
        let s: String = s.into();
        if !s.is_empty() {
            self.cmds.push(Command::Print(s));
        }
    }

    pub fn delete_lines(&mut self, n: u16) {
        if n > 0 {
            self.cmds.push(Command::DeleteLines(n));
        }
    }

    pub fn insert_lines(&mut self, n: u16) {
        if n > 0 {
            self.cmds.push(Command::InsertLines(n));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Queue every command into `out` and flush once.
    pub fn flush_to<W: Write>(self, out: &mut W) -> Result<()> {
        for cmd in self.cmds {
            match cmd {
                Command::MoveTo(x, y) => {
                    queue!(out, MoveTo(x, y))?;
                }
                Command::ClearToEol => {
                    queue!(out, Clear(ClearType::UntilNewLine))?;
                }
                Command::ClearAll => {
                    queue!(out, Clear(ClearType::All))?;
                }
                Command::Print(s) => {
                    queue!(out, Print(s))?;
                }
                Command::DeleteLines(n) => {
                    write!(out, "\x1b[{n}M")?;
                }
                Command::InsertLines(n) => {
                    write!(out, "\x1b[{n}L")?;
                }
            }
        }
        out.flush()?;
        Ok(())
    }

    pub fn flush(self) -> Result<()> {
        self.flush_to(&mut stdout())
    }
}
