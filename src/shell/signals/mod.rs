//! Signal bridge between asynchronous handlers and the interactive loop.
//!
//! The SIGCHLD handler only stores an atomic flag; everything that prints or
//! locks happens later in `reap_children`, called from ordinary context by
//! the dispatch loop. The SIGINT handler emits a single raw newline so an
//! interrupted prompt moves to a fresh line without tearing the loop down.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};

static CHILD_TERMINATED: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigchld(_: libc::c_int) {
    CHILD_TERMINATED.store(true, Ordering::SeqCst);
}

extern "C" fn handle_sigint(_: libc::c_int) {
    // Only async-signal-safe calls are allowed here: raw write, no buffering.
    let newline = b"\n";
    unsafe {
        let _ = libc::write(libc::STDOUT_FILENO, newline.as_ptr().cast(), newline.len());
    }
}

/// Install the shell's handlers. SA_RESTART keeps the blocking line read
/// going across both signals; SA_NOCLDSTOP limits SIGCHLD to terminations.
pub fn install() -> nix::Result<()> {
    let chld = SigAction::new(
        SigHandler::Handler(handle_sigchld),
        SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
        SigSet::empty(),
    );
    let int = SigAction::new(
        SigHandler::Handler(handle_sigint),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe {
        sigaction(Signal::SIGCHLD, &chld)?;
        sigaction(Signal::SIGINT, &int)?;
    }
    Ok(())
}

/// Restore the default SIGINT disposition. Called in every forked child
/// between fork and exec so commands stay independently interruptible.
pub fn reset_sigint_default() {
    let dfl = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    unsafe {
        let _ = sigaction(Signal::SIGINT, &dfl);
    }
}

pub fn child_terminated() -> bool {
    CHILD_TERMINATED.load(Ordering::SeqCst)
}

/// Collect every immediately-waitable child, report each one, then clear the
/// flag. Does buffered output, so it must never run inside a handler.
pub fn reap_children() {
    loop {
        match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::Exited(pid, code)) => {
                println!("[reaped pid {} exit {}]", pid, code);
            }
            Ok(WaitStatus::Signaled(pid, signal, _)) => {
                println!("[reaped pid {} signal {}]", pid, signal as libc::c_int);
            }
            Ok(WaitStatus::StillAlive) | Err(_) => break,
            Ok(_) => continue,
        }
    }
    CHILD_TERMINATED.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reap_clears_the_flag() {
        CHILD_TERMINATED.store(true, Ordering::SeqCst);
        assert!(child_terminated());
        // No children to collect: waitpid reports ECHILD, the loop stops,
        // and the flag still comes back clear.
        reap_children();
        assert!(!child_terminated());
    }
}
