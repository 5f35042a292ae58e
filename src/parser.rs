use crate::redirect::{self, RedirectionSpec};

/// One stage of a pipeline: the command name, the raw argument text that
/// followed it (quotes preserved, redirections stripped), and the
/// redirection plan extracted from that text.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub command: String,
    pub args: String,
    pub redirection: RedirectionSpec,
}

/// Extract the command token from the start of `input`.
///
/// Scans until the first unquoted space or tab, maintaining single- and
/// double-quote state independently. Quote characters toggle state and are
/// not appended to the token. Returns the token and the byte index of the
/// whitespace that ended it (or the input length when the token runs to the
/// end). Empty input yields `("", 0)`.
pub fn parse_command_and_position(input: &str) -> (String, usize) {
    let mut command = String::new();
    let mut in_single_quotes = false;
    let mut in_double_quotes = false;

    for (i, c) in input.char_indices() {
        if !in_double_quotes && c == '\'' {
            in_single_quotes = !in_single_quotes;
        } else if !in_single_quotes && c == '"' {
            in_double_quotes = !in_double_quotes;
        } else if !in_single_quotes && !in_double_quotes && (c == ' ' || c == '\t') {
            return (command, i);
        } else {
            command.push(c);
        }
    }

    (command, input.len())
}

/// Split a raw argument string into individual arguments.
///
/// Quote characters delimit without being emitted. Only unquoted spaces are
/// boundaries — a tab does not split an argument. Outside single quotes a
/// backslash escapes the following character; inside double quotes it only
/// escapes `"` and `\`, and is otherwise kept literally.
pub fn parse_arguments(args: &str) -> Vec<String> {
    let mut parsed_args = Vec::new();
    let mut current_arg = String::new();
    let mut in_single_quotes = false;
    let mut in_double_quotes = false;
    let mut chars = args.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '"' && !in_single_quotes {
            in_double_quotes = !in_double_quotes;
        } else if c == '\'' && !in_double_quotes {
            in_single_quotes = !in_single_quotes;
        } else if c == ' ' && !in_double_quotes && !in_single_quotes {
            if !current_arg.is_empty() {
                parsed_args.push(std::mem::take(&mut current_arg));
            }
        } else if c == '\\'
            && !in_single_quotes
            && let Some(&next) = chars.peek()
        {
            if !in_double_quotes || next == '"' || next == '\\' {
                current_arg.push(next);
                chars.next();
            } else {
                current_arg.push('\\');
            }
        } else {
            current_arg.push(c);
        }
    }

    if !current_arg.is_empty() {
        parsed_args.push(current_arg);
    }

    parsed_args
}

/// Split `input` into pipeline segments at unquoted `|` characters.
///
/// Quote characters stay in the segment text — each segment is re-scanned by
/// [`parse_command_segment`]. Empty segments (consecutive pipes, a trailing
/// pipe) are dropped.
pub fn parse_pipeline(input: &str) -> Vec<CommandSpec> {
    let mut commands = Vec::new();
    let mut current_segment = String::new();
    let mut in_single_quotes = false;
    let mut in_double_quotes = false;

    for c in input.chars() {
        if !in_double_quotes && c == '\'' {
            in_single_quotes = !in_single_quotes;
            current_segment.push(c);
        } else if !in_single_quotes && c == '"' {
            in_double_quotes = !in_double_quotes;
            current_segment.push(c);
        } else if !in_single_quotes && !in_double_quotes && c == '|' {
            if let Some(cmd) = parse_command_segment(&current_segment) {
                commands.push(cmd);
            }
            current_segment.clear();
        } else {
            current_segment.push(c);
        }
    }

    if let Some(cmd) = parse_command_segment(&current_segment) {
        commands.push(cmd);
    }

    commands
}

/// Turn one pipeline segment into a [`CommandSpec`], or `None` if the
/// segment is blank.
pub fn parse_command_segment(segment: &str) -> Option<CommandSpec> {
    let trimmed = trim_whitespace(segment);
    if trimmed.is_empty() {
        return None;
    }

    let (command, command_end_pos) = parse_command_and_position(trimmed);
    let mut args = if command_end_pos < trimmed.len() {
        trimmed[command_end_pos + 1..].to_string()
    } else {
        String::new()
    };
    let redirection = redirect::parse_and_strip_redirection(&mut args);

    Some(CommandSpec {
        command,
        args,
        redirection,
    })
}

/// True if `input` contains a pipe character outside of all quotes.
pub fn has_pipes(input: &str) -> bool {
    let mut in_single_quotes = false;
    let mut in_double_quotes = false;

    for c in input.chars() {
        if !in_double_quotes && c == '\'' {
            in_single_quotes = !in_single_quotes;
        } else if !in_single_quotes && c == '"' {
            in_double_quotes = !in_double_quotes;
        } else if !in_single_quotes && !in_double_quotes && c == '|' {
            return true;
        }
    }

    false
}

/// Take the filename that follows a flag in an argument string: skip
/// whitespace from `offset`, then the rest of the string with trailing
/// whitespace trimmed. Interior spaces are kept.
pub fn extract_filename(args: &str, offset: usize) -> Option<String> {
    let bytes = args.as_bytes();
    let mut start = offset;
    while start < bytes.len() && (bytes[start] == b' ' || bytes[start] == b'\t') {
        start += 1;
    }
    if start >= bytes.len() {
        return None;
    }

    Some(args[start..].trim_end_matches([' ', '\t']).to_string())
}

fn trim_whitespace(s: &str) -> &str {
    s.trim_matches([' ', '\t'])
}
