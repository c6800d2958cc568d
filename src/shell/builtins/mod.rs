//! Built-in command bodies and the thread-based parallel runner.

use std::env;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::thread;

use log::debug;

use super::jobs::{self, BuiltinHandler};
use super::state::ShellState;
use super::syntax;

const BUILTIN_NAMES: [&str; 8] = [
    "exit", "cd", "pwd", "help", "history", "alias", "parallel", "meminfo",
];

const PARALLEL_USAGE: &str = "usage: parallel cmd1 ;; cmd2 ;; cmd3 ...";

impl BuiltinHandler for ShellState {
    fn is_builtin(&self, name: &str) -> bool {
        BUILTIN_NAMES.contains(&name)
    }

    fn handle_builtin(&self, tokens: &[String]) {
        let cmd = match tokens.first() {
            Some(cmd) => cmd.as_str(),
            None => return,
        };
        match cmd {
            "exit" => process::exit(0),
            "pwd" => match env::current_dir() {
                Ok(dir) => println!("{}", dir.display()),
                Err(err) => eprintln!("pwd: {}", err),
            },
            "cd" => {
                let dir = match tokens.get(1) {
                    Some(dir) => dir.clone(),
                    None => env::var("HOME").unwrap_or_else(|_| String::from("/")),
                };
                if let Err(err) = env::set_current_dir(Path::new(&dir)) {
                    eprintln!("cd: {}: {}", dir, err);
                }
            }
            "help" => print_help(),
            "history" => {
                for (i, line) in self.history().iter().enumerate() {
                    println!("{:4}  {}", i + 1, line);
                }
            }
            "alias" => {
                if tokens.len() == 1 {
                    for (name, value) in self.aliases() {
                        println!("{}='{}'", name, value);
                    }
                } else if let Err(err) = self.define_alias(&tokens[1..].join(" ")) {
                    eprintln!("{}", err);
                }
            }
            "meminfo" => print_meminfo(),
            // Bare `parallel`: the dispatch loop routes the real form before
            // tokenization, so all that is left here is the usage error.
            "parallel" => eprintln!("{}", PARALLEL_USAGE),
            _ => {}
        }
    }
}

fn print_help() {
    println!("mini-shell built-ins:");
    println!("  exit                exit the shell");
    println!("  cd <dir>            change directory");
    println!("  pwd                 print the current directory");
    println!("  history             list commands run this session");
    println!("  alias name='cmd'    define a simple alias (no persistence)");
    println!("  parallel c1 ;; c2   run commands concurrently (separator ';;')");
    println!("  meminfo             show approximate memory use (VmSize, VmRSS, VmData)");
    println!("  help                this help");
}

fn print_meminfo() {
    let file = match File::open("/proc/self/status") {
        Ok(file) => file,
        Err(err) => {
            eprintln!("meminfo: /proc/self/status: {}", err);
            return;
        }
    };
    for line in BufReader::new(file).lines().map_while(Result::ok) {
        if line.starts_with("VmSize:") || line.starts_with("VmRSS:") || line.starts_with("VmData:")
        {
            println!("{}", line);
        }
    }
}

/// Run the commands in `rest` (the text after `parallel `), separated by the
/// literal `;;`, each on its own thread through the single-command executor.
/// Every worker runs its command foreground within the thread; the caller
/// blocks until all workers have joined. One failing command never cancels
/// its siblings.
pub fn run_parallel(state: &Arc<ShellState>, rest: &str) {
    let commands: Vec<String> = rest
        .split(";;")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(String::from)
        .collect();
    if commands.is_empty() {
        eprintln!("{}", PARALLEL_USAGE);
        return;
    }
    debug!("parallel: {} commands", commands.len());
    let mut workers = Vec::with_capacity(commands.len());
    for command in commands {
        let state = Arc::clone(state);
        let spawned = thread::Builder::new().spawn(move || {
            let tokens = syntax::tokenize(&command);
            if tokens.is_empty() {
                return;
            }
            if let Err(err) = jobs::execute_simple(&state, tokens, false) {
                eprintln!("{}", err);
            }
        });
        match spawned {
            Ok(handle) => workers.push(handle),
            Err(err) => eprintln!("parallel: spawn: {}", err),
        }
    }
    for worker in workers {
        let _ = worker.join();
    }
}
