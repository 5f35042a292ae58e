use std::ffi::CString;
use std::io::{self, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};

use os_pipe::{PipeReader, PipeWriter, pipe};

use crate::builtins;
use crate::parser::{self, CommandSpec};
use crate::redirect::{Redirection, RedirectionMode, RedirectionSpec};
use crate::resolver;
use crate::state::ShellState;

/// A prepared `execvp` call: resolved path, display name for diagnostics,
/// and the argv strings. Built in the parent so the forked child only has
/// descriptor surgery left to do.
struct ExecImage {
    path: CString,
    display: String,
    argv: Vec<CString>,
}

impl ExecImage {
    /// Replace the process image. Only returns control if `execvp` fails.
    fn exec(&self) -> ! {
        let mut argv: Vec<*const libc::c_char> =
            self.argv.iter().map(|arg| arg.as_ptr()).collect();
        argv.push(std::ptr::null());

        unsafe { libc::execvp(self.path.as_ptr(), argv.as_ptr()) };

        eprintln!("{}: command not found", self.display);
        unsafe { libc::_exit(1) }
    }
}

/// Build the exec image for a resolved path: argv[0] is the basename, the
/// rest are the quote-parsed arguments.
fn prepare_exec(path: &str, args: &str) -> Option<ExecImage> {
    let program_name = match path.rfind('/') {
        Some(pos) => &path[pos + 1..],
        None => path,
    };

    let mut argv = vec![CString::new(program_name).ok()?];
    for arg in parser::parse_arguments(args) {
        argv.push(CString::new(arg).ok()?);
    }

    Some(ExecImage {
        path: CString::new(path).ok()?,
        display: path.to_string(),
        argv,
    })
}

enum ChildCommand<'a> {
    /// Run the builtin in the child, then exit 0.
    Builtin { command: &'a str, args: &'a str },
    /// Replace the child image.
    External(&'a ExecImage),
}

/// Execute a single command. Returns false when the command cannot be
/// resolved — the caller owns that report; every other failure is reported
/// here and the REPL carries on.
pub fn execute_command(
    command: &str,
    args: &str,
    redirection: &RedirectionSpec,
    state: &mut ShellState,
) -> bool {
    let image = if builtins::is_builtin(command) {
        None
    } else {
        let Some(path) = resolver::find_executable(command) else {
            return false;
        };
        let Some(image) = prepare_exec(&path, args) else {
            return false;
        };
        Some(image)
    };

    let needs_fork =
        redirection.stdout.is_some() || redirection.stderr.is_some() || image.is_some();
    if !needs_fork {
        let mut stdout = io::stdout();
        let mut stderr = io::stderr();
        builtins::execute(command, args, state, &mut stdout, &mut stderr);
        let _ = stdout.flush();
        return true;
    }

    // The child inherits the stdout buffer; flush so nothing is emitted twice.
    let _ = io::stdout().flush();

    let pid = unsafe { libc::fork() };
    if pid == -1 {
        eprintln!("Failed to fork process");
        return false;
    }

    if pid == 0 {
        let child_command = match &image {
            Some(image) => ChildCommand::External(image),
            None => ChildCommand::Builtin { command, args },
        };
        run_child(redirection, child_command, state);
    }

    wait_for(pid);
    true
}

/// Execute a pipeline. Resolution failures are reported on stderr here;
/// length-one pipelines fall through to the single-command path unchanged.
pub fn execute_pipeline(commands: &[CommandSpec], state: &mut ShellState) -> bool {
    if commands.is_empty() {
        return false;
    }

    if commands.len() == 1 {
        let cmd = &commands[0];
        return execute_command(&cmd.command, &cmd.args, &cmd.redirection, state);
    }

    // Resolve every external segment up front: no pipe exists and nothing is
    // spawned until the whole pipeline is known to be runnable.
    let mut images: Vec<Option<ExecImage>> = Vec::with_capacity(commands.len());
    for cmd in commands {
        if builtins::is_builtin(&cmd.command) {
            images.push(None);
            continue;
        }
        let image = resolver::find_executable(&cmd.command)
            .and_then(|path| prepare_exec(&path, &cmd.args));
        match image {
            Some(image) => images.push(Some(image)),
            None => {
                eprintln!("{}: command not found", cmd.command);
                return false;
            }
        }
    }

    let mut pipes: Vec<(PipeReader, PipeWriter)> = Vec::with_capacity(commands.len() - 1);
    for _ in 0..commands.len() - 1 {
        match pipe() {
            Ok(ends) => pipes.push(ends),
            Err(_) => {
                eprintln!("Failed to create pipe");
                return false;
            }
        }
    }
    let pipe_fds: Vec<RawFd> = pipes
        .iter()
        .flat_map(|(reader, writer)| [reader.as_raw_fd(), writer.as_raw_fd()])
        .collect();

    let _ = io::stdout().flush();

    let mut pids: Vec<libc::pid_t> = Vec::with_capacity(commands.len());
    for (i, cmd) in commands.iter().enumerate() {
        let pid = unsafe { libc::fork() };
        if pid == -1 {
            eprintln!("Failed to fork process");
            // Closing the pipe ends first lets the children already running
            // see EOF and exit before they are reaped.
            drop(pipes);
            reap(&pids);
            return false;
        }

        if pid == 0 {
            if i > 0 {
                unsafe { libc::dup2(pipes[i - 1].0.as_raw_fd(), libc::STDIN_FILENO) };
            }
            if i < commands.len() - 1 {
                unsafe { libc::dup2(pipes[i].1.as_raw_fd(), libc::STDOUT_FILENO) };
            }
            // Every pipe end, both sides of every pipe, closes in the child.
            for &fd in &pipe_fds {
                unsafe { libc::close(fd) };
            }

            let child_command = match &images[i] {
                Some(image) => ChildCommand::External(image),
                None => ChildCommand::Builtin {
                    command: &cmd.command,
                    args: &cmd.args,
                },
            };
            run_child(&cmd.redirection, child_command, state);
        }

        pids.push(pid);
    }

    // The parent must close its pipe ends before waiting, or a reader never
    // sees EOF.
    drop(pipes);
    reap(&pids);
    true
}

/// Body of a forked child after any pipe wiring: apply file redirections
/// (they may override the pipe descriptors), then run the command.
/// Never returns.
fn run_child(
    redirection: &RedirectionSpec,
    command: ChildCommand<'_>,
    state: &mut ShellState,
) -> ! {
    if let Some(stdout_redirection) = &redirection.stdout
        && !redirect_stream(libc::STDOUT_FILENO, stdout_redirection)
    {
        unsafe { libc::_exit(1) }
    }

    if let Some(stderr_redirection) = &redirection.stderr
        && !redirect_stream(libc::STDERR_FILENO, stderr_redirection)
    {
        unsafe { libc::_exit(1) }
    }

    match command {
        ChildCommand::Builtin { command, args } => {
            let mut stdout = io::stdout();
            let mut stderr = io::stderr();
            builtins::execute(command, args, state, &mut stdout, &mut stderr);
            let _ = stdout.flush();
            unsafe { libc::_exit(0) }
        }
        ChildCommand::External(image) => image.exec(),
    }
}

/// Point `target_fd` at the redirection file. Runs in the forked child; the
/// opened descriptor closes when `file` drops, leaving only the duplicate.
fn redirect_stream(target_fd: RawFd, redirection: &Redirection) -> bool {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).mode(0o644);
    match redirection.mode {
        RedirectionMode::Truncate => options.truncate(true),
        RedirectionMode::Append => options.append(true),
    };

    let file = match options.open(&redirection.filename) {
        Ok(file) => file,
        Err(_) => {
            eprintln!("Failed to open file: {}", redirection.filename);
            return false;
        }
    };

    if unsafe { libc::dup2(file.as_raw_fd(), target_fd) } == -1 {
        eprintln!("Failed to redirect output");
        return false;
    }

    true
}

fn wait_for(pid: libc::pid_t) {
    let mut status: libc::c_int = 0;
    unsafe { libc::waitpid(pid, &mut status, 0) };
}

fn reap(pids: &[libc::pid_t]) {
    for &pid in pids {
        wait_for(pid);
    }
}
