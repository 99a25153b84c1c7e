//! canopy entrypoint: load a JSON document, enter the terminal, and run the
//! event loop until quit.
//!
//! Startup failures (bad arguments, unreadable file, malformed JSON) are
//! reported on stderr before the terminal is touched, so the shell never
//! sees a half-entered alternate screen. Once interactive, the RAII guard
//! plus a panic hook guarantee the terminal is restored on every exit path.

use std::io::{Read, Stdout, stdout};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{
    Event as CEvent, EventStream, KeyCode as CKeyCode, KeyEvent as CKeyEvent, KeyEventKind,
    KeyModifiers as CMods, MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use tokio::signal::unix::{SignalKind, signal};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use core_doc::{Adapter, Document};
use core_keymap::{BrowserCmd, Key, Keymap, NamedKey, Resolution, default_bindings};
use core_prompt::{Prompt, PromptEvent};
use core_style::Palette;
use core_term::{CrosstermBackend, TerminalBackend};
use core_tree::ViewTree;
use core_view::{ViewSnapshot, Viewport};

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "canopy", version, about = "Interactive terminal browser for JSON trees")]
struct Args {
    /// JSON file to browse; standard input when omitted.
    pub path: Option<PathBuf>,
    /// Append structured logs to this file (filtered by RUST_LOG).
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}

fn configure_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    let Some(path) = &args.log_file else {
        return Ok(None);
    };
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
    let file = path.file_name().context("--log-file needs a file name")?;
    let appender = tracing_appender::rolling::never(dir.unwrap_or(std::path::Path::new(".")), file);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        core_term::emergency_restore();
        eprintln!("{info}");
        if cfg!(debug_assertions) {
            eprintln!("{}", std::backtrace::Backtrace::force_capture());
        }
        default_hook(info);
    }));
}

fn read_input(args: &Args) -> Result<String> {
    match &args.path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read standard input")?;
            Ok(buf)
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    Browse,
    Prompt,
}

struct App {
    viewport: Viewport<Stdout>,
    keymap: Keymap,
    pending: Vec<Key>,
    mode: Mode,
    prompt: Option<Prompt>,
    saved: Option<ViewSnapshot>,
    history: Vec<String>,
    quit: bool,
}

impl App {
    fn new(tree: ViewTree, cols: usize, rows: usize) -> Self {
        Self {
            viewport: Viewport::new(tree, cols, rows, stdout()),
            keymap: Keymap::build(default_bindings()),
            pending: Vec::new(),
            mode: Mode::Browse,
            prompt: None,
            saved: None,
            history: Vec::new(),
            quit: false,
        }
    }

    async fn run(&mut self) -> Result<()> {
        let mut events = EventStream::new();
        let mut sigterm = signal(SignalKind::terminate())?;
        while !self.quit {
            tokio::select! {
                maybe = events.next() => match maybe {
                    Some(Ok(event)) => self.handle_event(event)?,
                    Some(Err(err)) => warn!(target: "input", ?err, "event stream error"),
                    None => break,
                },
                _ = sigterm.recv() => {
                    info!(target: "runtime", "sigterm");
                    self.quit = true;
                }
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: CEvent) -> Result<()> {
        match event {
            CEvent::Key(key) => {
                if let Some(key) = translate_key(key) {
                    match self.mode {
                        Mode::Browse => self.on_browse_key(key)?,
                        Mode::Prompt => self.on_prompt_key(key)?,
                    }
                }
            }
            CEvent::Mouse(mouse) => self.on_mouse(mouse)?,
            CEvent::Resize(cols, rows) => {
                self.viewport.resize(cols as usize, rows as usize)?;
                if self.mode == Mode::Prompt {
                    self.paint_prompt()?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_browse_key(&mut self, key: Key) -> Result<()> {
        if let Key::Char(c) = key
            && c.is_ascii_digit()
            && self.pending.is_empty()
            && !(c == '0' && self.viewport.pending_count().is_empty())
        {
            return self.viewport.push_count_digit(c);
        }
        self.pending.push(key);
        match self.keymap.resolve(&self.pending) {
            Resolution::Matched { consumed, command } => {
                self.pending.drain(..consumed);
                self.exec(command)
            }
            Resolution::NeedMore => Ok(()),
            Resolution::Unmapped => {
                debug!(target: "input.dispatch", ?key, "unmapped");
                self.pending.clear();
                self.viewport.reset_count()
            }
        }
    }

    fn exec(&mut self, command: BrowserCmd) -> Result<()> {
        use BrowserCmd::*;
        let count = self.viewport.take_count();
        let page = self.viewport.height() as isize;
        debug!(target: "input.dispatch", ?command, count, "exec");
        match command {
            SelectNext => self.viewport.select_next(count)?,
            SelectPrev => self.viewport.select_prev(count)?,
            SelectNextSibling => self.viewport.select_next_sibling(count)?,
            SelectPrevSibling => self.viewport.select_prev_sibling(count)?,
            SelectParent => self.viewport.select_parent(count)?,
            SelectFirst => self.viewport.select_first()?,
            SelectLast => self.viewport.select_last()?,
            SelectTop => self.viewport.select_top()?,
            SelectMiddle => self.viewport.select_middle()?,
            SelectBottom => self.viewport.select_bottom()?,
            ScrollDown => self.viewport.scroll(count as isize)?,
            ScrollUp => self.viewport.scroll(-(count as isize))?,
            PageDown => self.viewport.scroll(count as isize * page)?,
            PageUp => self.viewport.scroll(-(count as isize * page))?,
            HalfPageDown => self.viewport.scroll(count as isize * (page / 2).max(1))?,
            HalfPageUp => self.viewport.scroll(-(count as isize * (page / 2).max(1)))?,
            CentreSelection => self.viewport.centre()?,
            ToggleSelection => self.viewport.toggle_sel()?,
            ExpandRecursive => self.viewport.expand_sel_recursive()?,
            Edit => {} // reserved
            SearchForward => self.open_prompt(false)?,
            SearchBackward => self.open_prompt(true)?,
            SearchNext => self.viewport.search_next(count as isize)?,
            SearchPrev => self.viewport.search_next(-(count as isize))?,
            ClearQuery => self.viewport.set_query(None)?,
            Redraw => self.viewport.refresh()?,
            Quit => self.quit = true,
        }
        if !self.quit {
            self.viewport.draw_status()?;
        }
        Ok(())
    }

    fn on_mouse(&mut self, mouse: MouseEvent) -> Result<()> {
        if self.mode == Mode::Prompt {
            return Ok(());
        }
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.viewport.click(mouse.row as usize, Instant::now())
            }
            MouseEventKind::ScrollDown => self.viewport.scroll(1),
            MouseEventKind::ScrollUp => self.viewport.scroll(-1),
            _ => Ok(()),
        }
    }

    // ----- prompt ---------------------------------------------------------

    fn open_prompt(&mut self, backward: bool) -> Result<()> {
        self.saved = Some(self.viewport.snapshot());
        self.viewport.set_search_back(backward);
        self.prompt = Some(Prompt::new(
            if backward { '?' } else { '/' },
            self.history.clone(),
        ));
        self.mode = Mode::Prompt;
        self.paint_prompt()
    }

    fn paint_prompt(&mut self) -> Result<()> {
        let Some(prompt) = &self.prompt else {
            return Ok(());
        };
        let (line, cursor) = prompt.render(self.viewport.width());
        self.viewport.paint_status_text(&line)?;
        execute!(
            stdout(),
            MoveTo(cursor as u16, self.viewport.height() as u16),
            Show
        )?;
        Ok(())
    }

    fn close_prompt(&mut self) -> Result<()> {
        self.prompt = None;
        self.mode = Mode::Browse;
        execute!(stdout(), Hide)?;
        Ok(())
    }

    fn on_prompt_key(&mut self, key: Key) -> Result<()> {
        let Some(prompt) = &mut self.prompt else {
            self.mode = Mode::Browse;
            return Ok(());
        };
        match prompt.handle_key(key) {
            PromptEvent::Changed => {
                let text = prompt.text().to_string();
                let query = (!text.is_empty()).then_some(text);
                self.viewport.set_query(query)?;
                self.paint_prompt()
            }
            PromptEvent::Moved => self.paint_prompt(),
            PromptEvent::Accepted(text) => {
                self.close_prompt()?;
                self.saved = None;
                if text.is_empty() {
                    self.viewport.set_query(None)?;
                    return self.viewport.draw_status();
                }
                if self.history.last() != Some(&text) {
                    self.history.push(text.clone());
                }
                self.viewport.set_query(Some(text))?;
                self.viewport.search_next(1)?;
                self.viewport.draw_status()
            }
            PromptEvent::Cancelled => {
                self.close_prompt()?;
                if let Some(snap) = self.saved.take() {
                    self.viewport.restore(snap)?;
                }
                Ok(())
            }
            PromptEvent::Unhandled => Ok(()),
        }
    }
}

fn translate_key(key: CKeyEvent) -> Option<Key> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let ctrl = key.modifiers.contains(CMods::CONTROL);
    let token = match key.code {
        CKeyCode::Char(c) if ctrl => Key::Ctrl(c.to_ascii_lowercase()),
        CKeyCode::Char(c) => Key::Char(c),
        CKeyCode::Enter => Key::Named(NamedKey::Enter),
        CKeyCode::Esc => Key::Named(NamedKey::Esc),
        CKeyCode::Backspace => Key::Named(NamedKey::Backspace),
        CKeyCode::Delete => Key::Named(NamedKey::Delete),
        CKeyCode::Up => Key::Named(NamedKey::Up),
        CKeyCode::Down => Key::Named(NamedKey::Down),
        CKeyCode::Left => Key::Named(NamedKey::Left),
        CKeyCode::Right => Key::Named(NamedKey::Right),
        CKeyCode::Home => Key::Named(NamedKey::Home),
        CKeyCode::End => Key::Named(NamedKey::End),
        CKeyCode::PageUp => Key::Named(NamedKey::PageUp),
        CKeyCode::PageDown => Key::Named(NamedKey::PageDown),
        _ => return None,
    };
    Some(token)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = configure_logging(&args)?;
    // Everything that can fail at startup happens before the terminal is
    // entered, so errors land on a usable screen.
    let input = read_input(&args)?;
    let value: serde_json::Value =
        serde_json::from_str(&input).context("input is not valid JSON")?;
    let doc = Document::from_json(&value);
    info!(target: "runtime", nodes = doc.len(), "document loaded");

    install_panic_hook();
    let mut backend = CrosstermBackend::new();
    let (cols, rows) = backend.size().context("cannot query terminal size")?;
    let guard = backend.enter_guard()?;

    let tree = ViewTree::new(doc, Adapter::new(Palette::default()), cols as usize);
    let mut app = App::new(tree, cols as usize, rows as usize);
    app.viewport.refresh()?;
    app.run().await?;

    drop(guard);
    info!(target: "runtime", "clean exit");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: CKeyCode, mods: CMods) -> CKeyEvent {
        let mut ev = CKeyEvent::new(code, mods);
        ev.kind = KeyEventKind::Press;
        ev
    }

    #[test]
    fn printable_keys_pass_through() {
        assert_eq!(
            translate_key(press(CKeyCode::Char('j'), CMods::NONE)),
            Some(Key::Char('j'))
        );
        // Shifted letters arrive pre-uppercased.
        assert_eq!(
            translate_key(press(CKeyCode::Char('G'), CMods::SHIFT)),
            Some(Key::Char('G'))
        );
    }

    #[test]
    fn control_chords_normalize_to_lowercase() {
        assert_eq!(
            translate_key(press(CKeyCode::Char('E'), CMods::CONTROL)),
            Some(Key::Ctrl('e'))
        );
    }

    #[test]
    fn releases_are_dropped() {
        let mut ev = CKeyEvent::new(CKeyCode::Char('j'), CMods::NONE);
        ev.kind = KeyEventKind::Release;
        assert_eq!(translate_key(ev), None);
    }

    #[test]
    fn named_keys_translate() {
        assert_eq!(
            translate_key(press(CKeyCode::PageDown, CMods::NONE)),
            Some(Key::Named(NamedKey::PageDown))
        );
        assert_eq!(
            translate_key(press(CKeyCode::Esc, CMods::NONE)),
            Some(Key::Named(NamedKey::Esc))
        );
    }
}
