use std::io::Write;
use std::path::PathBuf;

use crate::parser;
use crate::resolver;
use crate::state::ShellState;

/// The list of all builtin command names.
pub const BUILTINS: &[&str] = &["exit", "echo", "type", "pwd", "cd", "history"];

/// Returns true if the command name is a shell builtin.
pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Execute a builtin command, writing output to the provided streams.
///
/// `args` is the raw argument text with quotes preserved — each builtin
/// decides how much parsing it wants.
pub fn execute(
    program: &str,
    args: &str,
    state: &mut ShellState,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) {
    match program {
        "echo" => builtin_echo(args, stdout),
        "type" => builtin_type(args, stdout),
        "pwd" => builtin_pwd(stdout, stderr),
        "cd" => builtin_cd(args, state, stdout, stderr),
        "history" => builtin_history(args, state, stdout, stderr),
        // `exit` is intercepted by the REPL before execution; inside a
        // pipeline child it is a no-op and the child just exits 0.
        _ => {}
    }
}

fn builtin_echo(args: &str, stdout: &mut dyn Write) {
    let _ = writeln!(stdout, "{}", parser::parse_arguments(args).join(" "));
}

fn builtin_type(name: &str, stdout: &mut dyn Write) {
    if is_builtin(name) {
        let _ = writeln!(stdout, "{name} is a shell builtin");
        return;
    }

    if let Some(filepath) = resolver::find_executable(name) {
        let _ = writeln!(stdout, "{name} is {filepath}");
        return;
    }

    let _ = writeln!(stdout, "{name}: not found");
}

fn builtin_pwd(stdout: &mut dyn Write, stderr: &mut dyn Write) {
    match std::env::current_dir() {
        Ok(path) => {
            let _ = writeln!(stdout, "{}", path.display());
        }
        Err(_) => {
            let _ = writeln!(stderr, "pwd: error getting the current working directory");
        }
    }
}

fn builtin_cd(args: &str, state: &mut ShellState, stdout: &mut dyn Write, stderr: &mut dyn Write) {
    let target = if args.is_empty() || args == "~" {
        match std::env::var("HOME") {
            Ok(home) => PathBuf::from(home),
            Err(_) => {
                let _ = writeln!(stderr, "cd: HOME not set");
                return;
            }
        }
    } else if args == "-" {
        match &state.previous_directory {
            Some(previous) => previous.clone(),
            None => {
                builtin_pwd(stdout, stderr);
                return;
            }
        }
    } else {
        PathBuf::from(args)
    };

    // Without a readable current directory there is nothing to remember as
    // the previous one; give up silently.
    let Ok(current) = std::env::current_dir() else {
        return;
    };

    if std::env::set_current_dir(&target).is_err() {
        // Failure goes to stdout, and echoes the argument as typed.
        let _ = writeln!(stdout, "cd: {args}: No such file or directory");
    } else {
        state.previous_directory = Some(current);
    }
}

fn builtin_history(
    args: &str,
    state: &mut ShellState,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) {
    // Flag detection is a prefix test, with -r winning over -w and -a.
    if args.starts_with("-r") || args.starts_with("-w") || args.starts_with("-a") {
        let read_mode = args.starts_with("-r");
        let append_mode = !read_mode && args.starts_with("-a");

        let Some(filename) = parser::extract_filename(args, 2) else {
            let flag = if read_mode {
                "-r"
            } else if append_mode {
                "-a"
            } else {
                "-w"
            };
            let _ = writeln!(stderr, "history: {flag} requires a filename");
            return;
        };

        let result = if read_mode {
            state.load_history_file(&filename)
        } else {
            state.write_history_file(&filename, append_mode)
        };
        if result.is_err() {
            let _ = writeln!(stderr, "history: cannot open {filename}");
        }
        return;
    }

    let len = state.history.len() as i64;
    let mut num_entries = len;
    if !args.is_empty() {
        match args.trim().parse::<i64>() {
            Ok(n) => num_entries = n,
            Err(_) => {
                let _ = writeln!(stderr, "history: invalid argument");
                return;
            }
        }
    }

    // A count of zero or less asks for nothing; a count past the list size
    // prints everything.
    let start = if num_entries < len { len - num_entries } else { 0 };
    for i in start..len {
        let _ = writeln!(stdout, "{:5}  {}", i + 1, state.history[i as usize]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(program: &str, args: &str, state: &mut ShellState) -> (String, String) {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        execute(program, args, state, &mut stdout, &mut stderr);
        (
            String::from_utf8(stdout).unwrap(),
            String::from_utf8(stderr).unwrap(),
        )
    }

    #[test]
    fn builtin_set_membership() {
        for name in ["exit", "echo", "type", "pwd", "cd", "history"] {
            assert!(is_builtin(name), "{name} should be a builtin");
        }
        assert!(!is_builtin("ls"));
        assert!(!is_builtin(""));
    }

    #[test]
    fn echo_joins_arguments_with_single_spaces() {
        let mut state = ShellState::new();
        let (stdout, _) = run("echo", "hello   world", &mut state);
        assert_eq!(stdout, "hello world\n");
    }

    #[test]
    fn echo_preserves_quoted_whitespace() {
        let mut state = ShellState::new();
        let (stdout, _) = run("echo", r#"'a  b'  "c d""#, &mut state);
        assert_eq!(stdout, "a  b c d\n");
    }

    #[test]
    fn echo_without_arguments_prints_a_bare_newline() {
        let mut state = ShellState::new();
        let (stdout, _) = run("echo", "", &mut state);
        assert_eq!(stdout, "\n");
    }

    #[test]
    fn type_reports_builtins() {
        let mut state = ShellState::new();
        let (stdout, _) = run("type", "echo", &mut state);
        assert_eq!(stdout, "echo is a shell builtin\n");
    }

    #[test]
    fn type_reports_unknown_names_on_stdout() {
        let mut state = ShellState::new();
        let (stdout, stderr) = run("type", "no-such-command-here", &mut state);
        assert_eq!(stdout, "no-such-command-here: not found\n");
        assert!(stderr.is_empty());
    }

    #[test]
    fn pwd_prints_the_working_directory() {
        let mut state = ShellState::new();
        let (stdout, _) = run("pwd", "", &mut state);
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(stdout.trim_end(), cwd.display().to_string());
    }

    #[test]
    fn cd_failure_reports_on_stdout_with_the_original_argument() {
        let mut state = ShellState::new();
        let (stdout, stderr) = run("cd", "/definitely/not/a/path", &mut state);
        assert_eq!(
            stdout,
            "cd: /definitely/not/a/path: No such file or directory\n"
        );
        assert!(stderr.is_empty());
        assert!(state.previous_directory.is_none());
    }

    #[test]
    fn cd_dash_without_previous_directory_behaves_as_pwd() {
        let mut state = ShellState::new();
        let (stdout, _) = run("cd", "-", &mut state);
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(stdout.trim_end(), cwd.display().to_string());
    }

    #[test]
    fn history_prints_numbered_entries() {
        let mut state = ShellState::new();
        state.record("echo one");
        state.record("echo two");
        let (stdout, _) = run("history", "", &mut state);
        assert_eq!(stdout, "    1  echo one\n    2  echo two\n");
    }

    #[test]
    fn history_with_count_prints_the_tail() {
        let mut state = ShellState::new();
        for i in 1..=5 {
            state.record(&format!("cmd{i}"));
        }
        let (stdout, _) = run("history", "2", &mut state);
        assert_eq!(stdout, "    4  cmd4\n    5  cmd5\n");
    }

    #[test]
    fn history_count_larger_than_list_prints_everything() {
        let mut state = ShellState::new();
        state.record("only");
        let (stdout, _) = run("history", "10", &mut state);
        assert_eq!(stdout, "    1  only\n");
    }

    #[test]
    fn history_zero_or_negative_count_prints_nothing() {
        let mut state = ShellState::new();
        state.record("entry");
        let (stdout, _) = run("history", "0", &mut state);
        assert!(stdout.is_empty());
        let (stdout, _) = run("history", "-3", &mut state);
        assert!(stdout.is_empty());
    }

    #[test]
    fn history_rejects_non_integer_counts() {
        let mut state = ShellState::new();
        let (stdout, stderr) = run("history", "lots", &mut state);
        assert!(stdout.is_empty());
        assert_eq!(stderr, "history: invalid argument\n");
    }

    #[test]
    fn history_flags_require_a_filename() {
        let mut state = ShellState::new();
        let (_, stderr) = run("history", "-r", &mut state);
        assert_eq!(stderr, "history: -r requires a filename\n");
        let (_, stderr) = run("history", "-w  ", &mut state);
        assert_eq!(stderr, "history: -w requires a filename\n");
        let (_, stderr) = run("history", "-a", &mut state);
        assert_eq!(stderr, "history: -a requires a filename\n");
    }

    #[test]
    fn history_read_failure_reports_the_filename() {
        let mut state = ShellState::new();
        let (_, stderr) = run("history", "-r /no/such/hist", &mut state);
        assert_eq!(stderr, "history: cannot open /no/such/hist\n");
    }

    #[test]
    fn history_flag_matching_is_a_prefix_test() {
        // The filename starts right after the two flag bytes.
        let path = std::env::temp_dir().join(format!(
            "coquille_builtin_prefix_{}",
            std::process::id()
        ));
        std::fs::write(&path, "loaded\n").unwrap();

        let mut state = ShellState::new();
        let arg = format!("-r{}", path.display());
        let (_, stderr) = run("history", &arg, &mut state);
        assert!(stderr.is_empty(), "stderr: {stderr}");
        assert_eq!(state.history, vec!["loaded"]);
        assert_eq!(state.history_write_cursor, 1);

        let _ = std::fs::remove_file(&path);
    }
}
