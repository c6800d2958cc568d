//! The interactive shell: signal installation and the prompt/dispatch loop.

mod builtins;
mod jobs;
mod signals;
mod state;
mod syntax;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use log::debug;

use self::jobs::BuiltinHandler;
use self::state::ShellState;
use self::syntax::LineCommand;

const PROMPT: &str = "mini-shell$ ";

pub struct Shell {
    state: Arc<ShellState>,
}

impl Shell {
    pub fn new() -> Self {
        Shell {
            state: Arc::new(ShellState::new()),
        }
    }

    /// Read/dispatch until end of input. No single command's failure ends
    /// the loop; only the `exit` builtin (or EOF) does.
    pub fn run_interactive(&self) -> i32 {
        if let Err(err) = signals::install() {
            eprintln!("failed to install signal handlers: {}", err);
            return 1;
        }
        debug!("interactive loop starting");
        let stdin = io::stdin();
        let mut line = String::new();
        loop {
            if signals::child_terminated() {
                signals::reap_children();
            }
            print!("{}", PROMPT);
            let _ = io::stdout().flush();
            line.clear();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(err) => {
                    eprintln!("input error: {}", err);
                    break;
                }
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            self.state.record_history(trimmed);
            match syntax::parse_line(trimmed) {
                LineCommand::Parallel(rest) => builtins::run_parallel(&self.state, &rest),
                LineCommand::Tokens { tokens, background } => {
                    if tokens.is_empty() {
                        continue;
                    }
                    // A leading builtin claims the whole line, even one that
                    // also contains a `|` token.
                    let result = if self.state.is_builtin(&tokens[0]) {
                        self.state.handle_builtin(&tokens);
                        Ok(())
                    } else if let Some((left, right)) = syntax::split_pipeline(&tokens) {
                        jobs::execute_pipeline(&self.state, left, right, background)
                    } else {
                        jobs::execute_simple(&self.state, tokens, background)
                    };
                    if let Err(err) = result {
                        eprintln!("{}", err);
                    }
                }
            }
        }
        println!("\nexiting mini-shell");
        0
    }
}
