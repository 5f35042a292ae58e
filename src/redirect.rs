/// How a redirection target file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectionMode {
    Truncate,
    Append,
}

/// A single stream redirection: the target filename and open mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Redirection {
    pub filename: String,
    pub mode: RedirectionMode,
}

/// Per-command redirection plan for stdout and stderr.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RedirectionSpec {
    pub stdout: Option<Redirection>,
    pub stderr: Option<Redirection>,
}

/// Find redirection operators in an argument string, record their targets,
/// and truncate the string at the first operator found.
///
/// The scan is deliberately not quote-aware — an operator inside quotes is
/// still honored. Longer operators are searched before their prefixes
/// (`2>>` before `2>`, `1>>`/`>>` before `1>`/`>`), and for each class the
/// first qualifying occurrence wins. A stdout operator sitting at the very
/// end of the string aborts the whole scan without touching `args`.
pub fn parse_and_strip_redirection(args: &mut String) -> RedirectionSpec {
    let mut spec = RedirectionSpec::default();
    let mut stderr_pos: Option<usize> = None;
    let mut stdout_pos: Option<usize> = None;

    // Stderr append (2>>)
    if let Some(pos) = args.find("2>>") {
        stderr_pos = Some(pos);
        if let Some(filename) = stderr_filename_after(args, pos + 3) {
            spec.stderr = Some(Redirection {
                filename,
                mode: RedirectionMode::Append,
            });
        }
    }

    // Stderr overwrite (2>) — runs whenever no append redirection was
    // recorded, so a bare trailing `2>>` falls through to here.
    let stderr_append_recorded =
        matches!(&spec.stderr, Some(r) if r.mode == RedirectionMode::Append);
    if !stderr_append_recorded && let Some(pos) = args.find("2>") {
        stderr_pos = Some(pos);
        if let Some(filename) = stderr_filename_after(args, pos + 2) {
            spec.stderr = Some(Redirection {
                filename,
                mode: RedirectionMode::Truncate,
            });
        }
    }

    // Stdout append (1>> or >>)
    let append_op = args
        .find("1>>")
        .map(|pos| (pos, 3))
        .or_else(|| find_stdout_append(args).map(|pos| (pos, 2)));
    if let Some((pos, len)) = append_op {
        stdout_pos = Some(pos);
        match stdout_filename_after(args, pos + len) {
            None => return spec,
            Some(filename) => {
                spec.stdout = Some(Redirection {
                    filename,
                    mode: RedirectionMode::Append,
                });
            }
        }
    }

    // Stdout overwrite (1> or >)
    let stdout_append_recorded =
        matches!(&spec.stdout, Some(r) if r.mode == RedirectionMode::Append);
    if !stdout_append_recorded {
        let overwrite_op = args
            .find("1>")
            .map(|pos| (pos, 2))
            .or_else(|| find_stdout_overwrite(args).map(|pos| (pos, 1)));
        if let Some((pos, len)) = overwrite_op {
            stdout_pos = Some(pos);
            match stdout_filename_after(args, pos + len) {
                None => return spec,
                Some(filename) => {
                    spec.stdout = Some(Redirection {
                        filename,
                        mode: RedirectionMode::Truncate,
                    });
                }
            }
        }
    }

    // Cut the argument string at the earliest operator position. Both
    // positions count here even when no target was recorded for them.
    let first_redirection_pos = match (stdout_pos, stderr_pos) {
        (Some(out), Some(err)) => Some(out.min(err)),
        (out, err) => out.or(err),
    };
    if let Some(pos) = first_redirection_pos {
        args.truncate(pos);
    }

    spec
}

/// First `>>` not preceded by `2`.
fn find_stdout_append(args: &str) -> Option<usize> {
    let bytes = args.as_bytes();
    let mut from = 0;
    while let Some(found) = args[from..].find(">>") {
        let pos = from + found;
        if pos > 0 && bytes[pos - 1] == b'2' {
            from = (pos + 2).min(args.len());
            continue;
        }
        return Some(pos);
    }
    None
}

/// First `>` not preceded by `2` and not immediately followed by another `>`.
fn find_stdout_overwrite(args: &str) -> Option<usize> {
    let bytes = args.as_bytes();
    let mut from = 0;
    while let Some(found) = args[from..].find('>') {
        let pos = from + found;
        if pos > 0 && bytes[pos - 1] == b'2' {
            from = (pos + 2).min(args.len());
            continue;
        }
        if pos + 1 < args.len() && bytes[pos + 1] == b'>' {
            from = (pos + 2).min(args.len());
            continue;
        }
        return Some(pos);
    }
    None
}

/// Filename after a stderr operator. Tabs count as whitespace on both the
/// skip and the terminator side. `None` when nothing but whitespace follows.
fn stderr_filename_after(args: &str, operator_end: usize) -> Option<String> {
    let bytes = args.as_bytes();
    let mut start = operator_end;
    while start < bytes.len() && (bytes[start] == b' ' || bytes[start] == b'\t') {
        start += 1;
    }
    if start >= bytes.len() {
        return None;
    }

    let mut end = start;
    while end < bytes.len() && bytes[end] != b' ' && bytes[end] != b'\t' {
        end += 1;
    }
    Some(args[start..end].to_string())
}

/// Filename after a stdout operator. `None` only when the operator ends the
/// string. Skips spaces but not tabs and reads up to the next space, so the
/// result may be empty or carry an embedded tab.
fn stdout_filename_after(args: &str, operator_end: usize) -> Option<String> {
    if operator_end == args.len() {
        return None;
    }

    let bytes = args.as_bytes();
    let mut start = operator_end;
    while start < bytes.len() && bytes[start] == b' ' {
        start += 1;
    }

    let mut end = start;
    while end < bytes.len() && bytes[end] != b' ' {
        end += 1;
    }
    Some(args[start..end].to_string())
}
