use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

/// Mutable shell-wide state, owned by the REPL and passed down explicitly.
#[derive(Debug, Default)]
pub struct ShellState {
    /// Directory the shell was in before the last successful `cd`.
    pub previous_directory: Option<PathBuf>,
    /// Every non-empty line accepted by the REPL, oldest first.
    pub history: Vec<String>,
    /// Number of history entries already flushed to disk; appends start here.
    pub history_write_cursor: usize,
}

impl ShellState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an accepted input line.
    pub fn record(&mut self, line: &str) {
        self.history.push(line.to_string());
    }

    /// Append every non-empty line of `filepath` to the history and move the
    /// write cursor past the result.
    pub fn load_history_file(&mut self, filepath: &str) -> io::Result<()> {
        let file = File::open(filepath)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            self.history.push(line);
        }
        self.history_write_cursor = self.history.len();
        Ok(())
    }

    /// Write history to `filepath`: the whole list when overwriting, or the
    /// entries past the write cursor when appending. The cursor ends at the
    /// list size either way.
    pub fn write_history_file(&mut self, filepath: &str, append: bool) -> io::Result<()> {
        let mut file = if append {
            OpenOptions::new().create(true).append(true).open(filepath)?
        } else {
            File::create(filepath)?
        };

        let start = if append { self.history_write_cursor } else { 0 };
        for entry in &self.history[start.min(self.history.len())..] {
            writeln!(file, "{entry}")?;
        }

        self.history_write_cursor = self.history.len();
        Ok(())
    }
}

/// Path of the persistent history file, if the user configured one.
pub fn histfile_path() -> Option<String> {
    std::env::var("HISTFILE").ok()
}
