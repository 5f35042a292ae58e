use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, ClearType},
    tty::IsTty,
};

// ── Raw-mode sentinel ─────────────────────────────────────────────────────────

/// `true` while the line editor holds the terminal in raw mode.
///
/// The `ctrlc` handler in `main.rs` reads this flag to suppress the spurious
/// newline it would otherwise print on platforms where SIGINT can still be
/// delivered during raw mode.
pub static EDITOR_ACTIVE: AtomicBool = AtomicBool::new(false);

// ── Raw-mode guard ────────────────────────────────────────────────────────────

/// RAII guard: enables terminal raw mode on construction and restores it on
/// drop — even on panic — so the terminal is never left in a broken state.
struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        EDITOR_ACTIVE.store(true, Ordering::Relaxed);
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        EDITOR_ACTIVE.store(false, Ordering::Relaxed);
    }
}

// ── Line editor ───────────────────────────────────────────────────────────────

/// A line editor with cursor movement, Emacs keybindings, history navigation
/// and first-word tab completion.
///
/// The editor owns no history of its own: each [`read_line`] call borrows
/// the shell's list, so entries recorded by the REPL or loaded by
/// `history -r` are immediately navigable.
///
/// [`read_line`]: LineEditor::read_line
#[derive(Default)]
pub struct LineEditor {
    /// Current line content, stored as `char`s for Unicode-safe cursor indexing.
    buffer: Vec<char>,
    /// Cursor position within `buffer` (0 = before the first char).
    cursor: usize,
    /// Index into the history during navigation; equals its length otherwise.
    history_idx: usize,
    /// Snapshot of the in-progress line taken the first time the user presses
    /// Up. Restored when the user presses Down past the end of the list.
    saved_buffer: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one line of input, displaying `prompt` to the left.
    ///
    /// `history` backs Up/Down navigation; `complete` supplies candidates for
    /// Tab completion of the line's first word.
    ///
    /// Returns:
    /// - `Ok(Some(line))` — the user submitted a line (may be empty)
    /// - `Ok(None)` — EOF (Ctrl-D on an empty buffer, or stdin was closed)
    /// - `Err(_)` — I/O error
    ///
    /// When stdin is not a TTY (e.g. integration tests that pipe stdin) the
    /// method falls back to a plain buffered read so tests work without
    /// modification.
    pub fn read_line(
        &mut self,
        prompt: &str,
        history: &[String],
        complete: &dyn Fn(&str) -> Vec<String>,
    ) -> io::Result<Option<String>> {
        // Gate on stdin, not stdout: interactive editing requires a keyboard
        // on the *input* side. `printf 'cmd\n' | coquille` can have stdout on
        // a terminal but stdin on a pipe — entering raw mode there would hand
        // event::read() a non-keyboard stream.
        if !io::stdin().is_tty() {
            return self.read_line_fallback(prompt);
        }

        self.reset_state(history.len());
        let _guard = RawModeGuard::enter()?;

        // Raw mode disables echo; we must display the prompt ourselves.
        print!("{prompt}");
        io::stdout().flush()?;

        loop {
            let ev = match event::read() {
                Ok(ev) => ev,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            let Event::Key(key) = ev else {
                continue; // ignore mouse, resize, paste, etc.
            };

            // Filter out key-release events that Windows may generate.
            if key.kind != KeyEventKind::Press && key.kind != KeyEventKind::Repeat {
                continue;
            }

            if key.code == KeyCode::Tab {
                self.handle_tab(prompt, complete)?;
                continue;
            }

            match self.handle_key(key, prompt, history)? {
                KeyAction::Submit(line) => return Ok(Some(line)),
                KeyAction::Eof => return Ok(None),
                KeyAction::Continue => {}
            }
        }
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn reset_state(&mut self, history_len: usize) {
        self.buffer.clear();
        self.cursor = 0;
        self.history_idx = history_len;
        self.saved_buffer.clear();
    }

    /// Non-TTY path: print prompt and delegate to `BufRead::read_line`,
    /// stripping the trailing newline.
    fn read_line_fallback(&mut self, prompt: &str) -> io::Result<Option<String>> {
        print!("{prompt}");
        io::stdout().flush()?;
        let stdin = io::stdin();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => Ok(None),
            Ok(_) => {
                while line.ends_with('\n') || line.ends_with('\r') {
                    line.pop();
                }
                Ok(Some(line))
            }
            Err(e) => Err(e),
        }
    }

    fn handle_key(
        &mut self,
        key: crossterm::event::KeyEvent,
        prompt: &str,
        history: &[String],
    ) -> io::Result<KeyAction> {
        use KeyCode::*;
        use KeyModifiers as Mod;

        match (key.code, key.modifiers) {
            // ── Submit ────────────────────────────────────────────────────────
            (Enter, _) => {
                // Raw mode suppresses the terminal's automatic newline on Enter.
                print!("\r\n");
                io::stdout().flush()?;
                let line: String = self.buffer.iter().collect();
                return Ok(KeyAction::Submit(line));
            }

            // ── Ctrl-D: EOF or delete-at-cursor ───────────────────────────────
            (Char('d'), Mod::CONTROL) => {
                if self.buffer.is_empty() {
                    print!("\r\n");
                    io::stdout().flush()?;
                    return Ok(KeyAction::Eof);
                }
                self.delete_at_cursor();
                self.redraw(prompt)?;
            }

            // ── Ctrl-C: clear buffer, re-show prompt ──────────────────────────
            // In raw mode on Unix, ISIG is off so Ctrl-C arrives as a key event
            // rather than SIGINT — the ctrlc crate handler does not fire here.
            (Char('c'), Mod::CONTROL) => {
                print!("^C\r\n{prompt}");
                io::stdout().flush()?;
                self.buffer.clear();
                self.cursor = 0;
                self.history_idx = history.len();
                self.saved_buffer.clear();
            }

            // ── Ctrl-L: clear screen ──────────────────────────────────────────
            (Char('l'), Mod::CONTROL) => {
                execute!(
                    io::stdout(),
                    terminal::Clear(ClearType::All),
                    cursor::MoveTo(0, 0),
                )?;
                self.redraw(prompt)?;
            }

            // ── Ctrl-A / Home: jump to start of line ──────────────────────────
            (Char('a'), Mod::CONTROL) | (Home, _) => {
                self.cursor = 0;
                self.sync_cursor(prompt)?;
            }

            // ── Ctrl-E / End: jump to end of line ─────────────────────────────
            (Char('e'), Mod::CONTROL) | (End, _) => {
                self.cursor = self.buffer.len();
                self.sync_cursor(prompt)?;
            }

            // ── Ctrl-K: kill from cursor to end of line ───────────────────────
            (Char('k'), Mod::CONTROL) => {
                self.buffer.truncate(self.cursor);
                self.redraw(prompt)?;
            }

            // ── Ctrl-U: kill from start of line to cursor ─────────────────────
            (Char('u'), Mod::CONTROL) => {
                self.buffer.drain(..self.cursor);
                self.cursor = 0;
                self.redraw(prompt)?;
            }

            // ── Ctrl-W: delete previous word ──────────────────────────────────
            (Char('w'), Mod::CONTROL) => {
                self.delete_word_before_cursor();
                self.redraw(prompt)?;
            }

            // ── Arrow keys ────────────────────────────────────────────────────
            (Left, _) => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.sync_cursor(prompt)?;
                }
            }
            (Right, _) => {
                if self.cursor < self.buffer.len() {
                    self.cursor += 1;
                    self.sync_cursor(prompt)?;
                }
            }

            // ── History navigation ────────────────────────────────────────────
            (Up, _) => {
                self.history_prev(history);
                self.redraw(prompt)?;
            }
            (Down, _) => {
                self.history_next(history);
                self.redraw(prompt)?;
            }

            // ── Backspace / Delete ────────────────────────────────────────────
            (Backspace, _) => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.buffer.remove(self.cursor);
                    self.redraw(prompt)?;
                }
            }
            (Delete, _) => {
                self.delete_at_cursor();
                self.redraw(prompt)?;
            }

            // ── Printable characters ──────────────────────────────────────────
            (Char(c), Mod::NONE) | (Char(c), Mod::SHIFT) => {
                self.buffer.insert(self.cursor, c);
                self.cursor += 1;
                self.redraw(prompt)?;
            }

            // ── Everything else: ignore ───────────────────────────────────────
            _ => {}
        }

        Ok(KeyAction::Continue)
    }

    /// Attempt completion for the word under the cursor. Only a word that
    /// starts at column 0 completes; the candidates come from the caller.
    fn handle_tab(&mut self, prompt: &str, complete: &dyn Fn(&str) -> Vec<String>) -> io::Result<()> {
        if self.buffer[..self.cursor].contains(&' ') {
            return Ok(());
        }

        let prefix: String = self.buffer[..self.cursor].iter().collect();
        let candidates = complete(&prefix);
        if candidates.is_empty() {
            return Ok(());
        }

        if candidates.len() == 1 {
            self.replace_prefix(&format!("{} ", candidates[0]));
            return self.redraw(prompt);
        }

        let common = longest_common_prefix(&candidates);
        if common.chars().count() > self.cursor {
            self.replace_prefix(&common);
            return self.redraw(prompt);
        }

        // No progress to make — list the candidates on their own line.
        print!("\r\n{}\r\n", candidates.join("  "));
        self.redraw(prompt)
    }

    /// Swap the text before the cursor for `replacement`, keeping the tail.
    fn replace_prefix(&mut self, replacement: &str) {
        let tail: Vec<char> = self.buffer[self.cursor..].to_vec();
        self.buffer = replacement.chars().collect();
        self.cursor = self.buffer.len();
        self.buffer.extend(tail);
    }

    /// Erase the current line and redraw prompt + buffer, then reposition cursor.
    fn redraw(&self, prompt: &str) -> io::Result<()> {
        let line: String = self.buffer.iter().collect();
        // Prompt length measured in chars (not bytes) for correct column math.
        let col = (prompt.chars().count() + self.cursor) as u16;
        execute!(
            io::stdout(),
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine),
        )?;
        print!("{prompt}{line}");
        io::stdout().flush()?;
        execute!(io::stdout(), cursor::MoveToColumn(col))?;
        Ok(())
    }

    /// Move the terminal cursor to match `self.cursor` without redrawing text.
    /// Used for pure cursor moves (Left/Right/Home/End) to avoid flicker.
    fn sync_cursor(&self, prompt: &str) -> io::Result<()> {
        let col = (prompt.chars().count() + self.cursor) as u16;
        execute!(io::stdout(), cursor::MoveToColumn(col))?;
        Ok(())
    }

    fn delete_at_cursor(&mut self) {
        if self.cursor < self.buffer.len() {
            self.buffer.remove(self.cursor);
        }
    }

    fn delete_word_before_cursor(&mut self) {
        if self.cursor == 0 {
            return;
        }
        // Skip spaces immediately before the cursor, then the non-space word.
        let mut end = self.cursor;
        while end > 0 && self.buffer[end - 1] == ' ' {
            end -= 1;
        }
        let mut start = end;
        while start > 0 && self.buffer[start - 1] != ' ' {
            start -= 1;
        }
        self.buffer.drain(start..self.cursor);
        self.cursor = start;
    }

    fn history_prev(&mut self, history: &[String]) {
        if history.is_empty() {
            return;
        }
        // On the first Up press, snapshot whatever the user has been typing.
        if self.history_idx == history.len() {
            self.saved_buffer = self.buffer.iter().collect();
        }
        if self.history_idx > 0 {
            self.history_idx -= 1;
            self.buffer = history[self.history_idx].chars().collect();
            self.cursor = self.buffer.len();
        }
    }

    fn history_next(&mut self, history: &[String]) {
        if self.history_idx >= history.len() {
            return;
        }
        self.history_idx += 1;
        if self.history_idx == history.len() {
            // Restore the buffer that was in progress before the first Up.
            self.buffer = self.saved_buffer.chars().collect();
        } else {
            self.buffer = history[self.history_idx].chars().collect();
        }
        self.cursor = self.buffer.len();
    }
}

/// Longest prefix shared by every candidate.
fn longest_common_prefix(candidates: &[String]) -> String {
    let first: Vec<char> = candidates[0].chars().collect();
    let mut len = first.len();

    for candidate in &candidates[1..] {
        let chars: Vec<char> = candidate.chars().collect();
        let mut i = 0;
        while i < len && i < chars.len() && first[i] == chars[i] {
            i += 1;
        }
        len = i;
    }

    first[..len].iter().collect()
}

// ── Internal return type ──────────────────────────────────────────────────────

enum KeyAction {
    Continue,
    Submit(String),
    Eof,
}

// ── Unit tests ────────────────────────────────────────────────────────────────
