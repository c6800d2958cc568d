//! Process execution: command resolution, redirection parsing, fork/exec
//! orchestration for single commands and two-stage pipelines.

use std::ffi::CString;
use std::os::fd::IntoRawFd;
use std::os::unix::io::RawFd;
use std::process;

use log::debug;
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::sys::wait::waitpid;
use nix::unistd::{access, close, dup2, execv, execvp, fork, pipe, AccessFlags, ForkResult};
use thiserror::Error;

use super::signals;
use super::state::ShellState;

/// Commands handled inside the shell process. Consulted before any
/// process-spawning path; built-ins never fork.
pub trait BuiltinHandler {
    fn is_builtin(&self, name: &str) -> bool;
    fn handle_builtin(&self, tokens: &[String]);
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("{0}: missing file after redirection operator")]
    MissingRedirectTarget(String),
    #[error("missing command")]
    MissingCommand,
    #[error("missing command on one side of the pipe")]
    MissingPipelineSide,
    #[error("invalid token: embedded NUL byte")]
    StringEncoding,
    #[error("fork: {0}")]
    Fork(nix::Error),
    #[error("pipe: {0}")]
    Pipe(nix::Error),
    #[error("waitpid: {0}")]
    Wait(nix::Error),
}

/// At most one input file and one output file, extracted from the token
/// stream before forking.
#[derive(Debug, Default, PartialEq, Eq)]
struct RedirSpec {
    input: Option<String>,
    /// (path, append)
    output: Option<(String, bool)>,
}

/// Pull `<` / `>` / `>>` specs out of a token sequence. Each operator
/// consumes the following token as its filename; a repeated operator's last
/// occurrence wins. Everything else becomes the argument vector.
fn parse_redirections(tokens: &[String]) -> Result<(Vec<String>, RedirSpec), JobError> {
    let mut redir = RedirSpec::default();
    let mut argv = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match tokens[i].as_str() {
            op @ ("<" | ">" | ">>") => {
                let target = tokens
                    .get(i + 1)
                    .ok_or_else(|| JobError::MissingRedirectTarget(op.to_string()))?
                    .clone();
                match op {
                    "<" => redir.input = Some(target),
                    ">" => redir.output = Some((target, false)),
                    _ => redir.output = Some((target, true)),
                }
                i += 2;
            }
            word => {
                argv.push(word.to_string());
                i += 1;
            }
        }
    }
    Ok((argv, redir))
}

/// Best-effort path hint: explicit paths pass through, bare names probe
/// `/bin` then `/usr/bin` for an executable candidate, and anything else
/// falls back to the bare name for a PATH search at exec time.
pub fn resolve_command_path(name: &str) -> String {
    if name.contains('/') {
        return name.to_string();
    }
    for dir in ["/bin", "/usr/bin"] {
        let candidate = format!("{}/{}", dir, name);
        if access(candidate.as_str(), AccessFlags::X_OK).is_ok() {
            return candidate;
        }
    }
    name.to_string()
}

fn cstring_argv(argv: &[String]) -> Result<Vec<CString>, JobError> {
    argv.iter()
        .map(|arg| CString::new(arg.as_str()).map_err(|_| JobError::StringEncoding))
        .collect()
}

/// Child-side: apply redirections onto stdin/stdout. Any failure ends the
/// child with status 1 after naming the operation and file.
fn apply_redirections(redir: &RedirSpec) {
    if let Some(path) = &redir.input {
        let fd = match open(path.as_str(), OFlag::O_RDONLY, Mode::empty()) {
            Ok(fd) => fd,
            Err(err) => {
                eprintln!("open {}: {}", path, err);
                process::exit(1);
            }
        };
        if let Err(err) = dup2(fd, libc::STDIN_FILENO) {
            eprintln!("dup2 {}: {}", path, err);
            process::exit(1);
        }
        let _ = close(fd);
    }
    if let Some((path, append)) = &redir.output {
        let mut flags = OFlag::O_WRONLY | OFlag::O_CREAT;
        flags |= if *append { OFlag::O_APPEND } else { OFlag::O_TRUNC };
        // 0644
        let mode = Mode::S_IRUSR | Mode::S_IWUSR | Mode::S_IRGRP | Mode::S_IROTH;
        let fd = match open(path.as_str(), flags, mode) {
            Ok(fd) => fd,
            Err(err) => {
                eprintln!("open {}: {}", path, err);
                process::exit(1);
            }
        };
        if let Err(err) = dup2(fd, libc::STDOUT_FILENO) {
            eprintln!("dup2 {}: {}", path, err);
            process::exit(1);
        }
        let _ = close(fd);
    }
}

/// Child-side: replace the process image. A resolved path with a `/` is
/// loaded exactly; a bare name goes through the PATH search. Never returns:
/// on exec failure the child reports and exits with status 1.
fn exec_command(name: &str, argv: &[CString], pipe_side: Option<&str>) -> ! {
    let path = resolve_command_path(name);
    let err = if path.contains('/') {
        match CString::new(path.as_str()) {
            Ok(cpath) => match execv(&cpath, argv) {
                Ok(_) => unreachable!(),
                Err(err) => err,
            },
            Err(_) => nix::errno::Errno::EINVAL,
        }
    } else {
        match execvp(&argv[0], argv) {
            Ok(_) => unreachable!(),
            Err(err) => err,
        }
    };
    match pipe_side {
        Some(side) => eprintln!("exec {} {}: {}", side, name, err),
        None if path.contains('/') => eprintln!("execv {}: {}", path, err),
        None => eprintln!("execvp {}: {}", name, err),
    }
    process::exit(1);
}

/// Run one command: alias resolution, builtin short-circuit, redirection
/// parse, then fork/exec. Foreground waits for the child; background prints
/// its pid and leaves it for the reaper.
pub fn execute_simple(
    state: &ShellState,
    mut tokens: Vec<String>,
    background: bool,
) -> Result<(), JobError> {
    state.resolve_alias(&mut tokens);
    if tokens.is_empty() {
        return Ok(());
    }
    if state.is_builtin(&tokens[0]) {
        state.handle_builtin(&tokens);
        return Ok(());
    }
    let (argv, redir) = parse_redirections(&tokens)?;
    if argv.is_empty() {
        return Err(JobError::MissingCommand);
    }
    let cargv = cstring_argv(&argv)?;
    debug!("spawning {:?} redir {:?} background {}", argv, redir, background);
    match unsafe { fork() }.map_err(JobError::Fork)? {
        ForkResult::Child => {
            signals::reset_sigint_default();
            apply_redirections(&redir);
            exec_command(&argv[0], &cargv, None);
        }
        ForkResult::Parent { child } => {
            if background {
                println!("[background pid {}]", child);
            } else {
                waitpid(child, None).map_err(JobError::Wait)?;
            }
            Ok(())
        }
    }
}

/// Run `left | right`: one pipe, two children, the parent closes both ends
/// on every path. Redirection operators inside either side are not
/// interpreted here; they pass through as ordinary arguments.
pub fn execute_pipeline(
    state: &ShellState,
    mut left: Vec<String>,
    mut right: Vec<String>,
    background: bool,
) -> Result<(), JobError> {
    state.resolve_alias(&mut left);
    state.resolve_alias(&mut right);
    if left.is_empty() || right.is_empty() {
        return Err(JobError::MissingPipelineSide);
    }
    let left_argv = cstring_argv(&left)?;
    let right_argv = cstring_argv(&right)?;

    let (read_end, write_end) = pipe().map_err(JobError::Pipe)?;
    let read_fd: RawFd = read_end.into_raw_fd();
    let write_fd: RawFd = write_end.into_raw_fd();
    let close_both = || {
        let _ = close(read_fd);
        let _ = close(write_fd);
    };
    debug!("pipeline {:?} | {:?} background {}", left, right, background);

    let first = match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            signals::reset_sigint_default();
            if dup2(write_fd, libc::STDOUT_FILENO).is_err() {
                process::exit(1);
            }
            let _ = close(read_fd);
            let _ = close(write_fd);
            exec_command(&left[0], &left_argv, Some("left"));
        }
        Ok(ForkResult::Parent { child }) => child,
        Err(err) => {
            close_both();
            return Err(JobError::Fork(err));
        }
    };

    let second = match unsafe { fork() } {
        Ok(ForkResult::Child) => {
            signals::reset_sigint_default();
            if dup2(read_fd, libc::STDIN_FILENO).is_err() {
                process::exit(1);
            }
            let _ = close(read_fd);
            let _ = close(write_fd);
            exec_command(&right[0], &right_argv, Some("right"));
        }
        Ok(ForkResult::Parent { child }) => child,
        Err(err) => {
            // The orphaned left child hits SIGPIPE once both ends are gone
            // and gets collected by the reaper.
            close_both();
            return Err(JobError::Fork(err));
        }
    };

    // Mandatory: a lingering parent-side write end would keep the right
    // child from ever seeing end-of-stream.
    close_both();

    if background {
        println!("[background pids {} {}]", first, second);
    } else {
        let _ = waitpid(first, None);
        let _ = waitpid(second, None);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn redirections_are_extracted_from_argv() {
        let (argv, redir) =
            parse_redirections(&toks(&["sort", "<", "in.txt", "-r", ">", "out.txt"])).unwrap();
        assert_eq!(argv, toks(&["sort", "-r"]));
        assert_eq!(redir.input.as_deref(), Some("in.txt"));
        assert_eq!(redir.output, Some(("out.txt".into(), false)));
    }

    #[test]
    fn append_operator_sets_the_flag() {
        let (argv, redir) = parse_redirections(&toks(&["echo", "hi", ">>", "log"])).unwrap();
        assert_eq!(argv, toks(&["echo", "hi"]));
        assert_eq!(redir.output, Some(("log".into(), true)));
    }

    #[test]
    fn repeated_operators_last_occurrence_wins() {
        let (_, redir) = parse_redirections(&toks(&["cmd", ">", "a", ">", "b"])).unwrap();
        assert_eq!(redir.output, Some(("b".into(), false)));
        let (_, redir) = parse_redirections(&toks(&["cmd", "<", "a", "<", "b"])).unwrap();
        assert_eq!(redir.input.as_deref(), Some("b"));
    }

    #[test]
    fn missing_redirect_target_is_rejected() {
        for op in ["<", ">", ">>"] {
            let err = parse_redirections(&toks(&["cat", op])).unwrap_err();
            match err {
                JobError::MissingRedirectTarget(found) => assert_eq!(found, op),
                other => panic!("unexpected error: {:?}", other),
            }
        }
    }

    #[test]
    fn executor_rejects_bad_redirection_before_forking() {
        // No process is spawned: the redirection scan fails first.
        let state = ShellState::new();
        let err = execute_simple(&state, toks(&["cat", "<"]), false).unwrap_err();
        assert!(matches!(err, JobError::MissingRedirectTarget(_)));
    }

    #[test]
    fn executor_rejects_redirection_only_lines() {
        let state = ShellState::new();
        let err = execute_simple(&state, toks(&[">", "out.txt"]), false).unwrap_err();
        assert!(matches!(err, JobError::MissingCommand));
    }

    #[test]
    fn pipeline_rejects_empty_sides() {
        let state = ShellState::new();
        let err = execute_pipeline(&state, vec![], toks(&["wc"]), false).unwrap_err();
        assert!(matches!(err, JobError::MissingPipelineSide));
    }

    #[test]
    fn explicit_paths_pass_through_resolution() {
        assert_eq!(resolve_command_path("/usr/local/bin/x"), "/usr/local/bin/x");
        assert_eq!(resolve_command_path("./relative"), "./relative");
    }

    #[test]
    fn known_names_resolve_into_probe_directories() {
        // /bin/sh exists on any platform these tests run on.
        assert_eq!(resolve_command_path("sh"), "/bin/sh");
    }

    #[test]
    fn unknown_names_fall_back_to_the_bare_name() {
        assert_eq!(
            resolve_command_path("definitely-no-such-command-here"),
            "definitely-no-such-command-here"
        );
    }

    #[test]
    fn nul_bytes_are_rejected_before_forking() {
        let err = cstring_argv(&vec!["bad\0arg".to_string()]).unwrap_err();
        assert!(matches!(err, JobError::StringEncoding));
    }
}
