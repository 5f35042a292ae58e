mod builtins;
mod editor;
mod executor;
mod parser;
mod redirect;
mod resolver;
mod state;

use std::io::{self, Write};
use std::sync::atomic::Ordering;

use editor::LineEditor;
use state::ShellState;

const PROMPT: &str = "$ ";

fn main() {
    // Keep Ctrl-C from killing the shell while a foreground child runs. In
    // raw mode the editor handles the key itself, so stay quiet then.
    ctrlc::set_handler(|| {
        if !editor::EDITOR_ACTIVE.load(Ordering::Relaxed) {
            println!();
            let _ = io::stdout().flush();
        }
    })
    .expect("Failed to set Ctrl-C handler");

    let mut state = ShellState::new();
    if let Some(histfile) = state::histfile_path() {
        let _ = state.load_history_file(&histfile);
    }

    let mut line_editor = LineEditor::new();
    loop {
        let input = match line_editor.read_line(PROMPT, &state.history, &completion_candidates) {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                eprintln!("Error reading input: {error}");
                break;
            }
        };

        if !handle_input(&input, &mut state) {
            break;
        }
    }

    if let Some(histfile) = state::histfile_path() {
        let _ = state.write_history_file(&histfile, true);
    }
}

/// Dispatch one input line. Returns false when the REPL should stop.
fn handle_input(input: &str, state: &mut ShellState) -> bool {
    if !input.is_empty() {
        state.record(input);
    }

    if parser::has_pipes(input) {
        let commands = parser::parse_pipeline(input);
        executor::execute_pipeline(&commands, state);
        return true;
    }

    let (command, command_end_pos) = parser::parse_command_and_position(input);
    if command.is_empty() {
        return true;
    }

    if command == "exit" {
        return false;
    }

    let mut args = if command_end_pos < input.len() {
        input[command_end_pos + 1..].to_string()
    } else {
        String::new()
    };
    let redirection = redirect::parse_and_strip_redirection(&mut args);

    if !executor::execute_command(&command, &args, &redirection, state) {
        println!("{command}: command not found");
        let _ = io::stdout().flush();
    }

    true
}

/// Completion candidates for the first word of a line: the advertised
/// builtins followed by the matching executables on PATH.
fn completion_candidates(prefix: &str) -> Vec<String> {
    let mut matches = Vec::new();
    for name in ["echo", "exit"] {
        if name.starts_with(prefix) {
            matches.push(name.to_string());
        }
    }
    matches.extend(resolver::matching_executables(prefix, true));
    matches
}
