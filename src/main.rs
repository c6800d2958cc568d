mod shell;

fn main() {
    env_logger::init();
    let shell = shell::Shell::new();
    std::process::exit(shell.run_interactive());
}
