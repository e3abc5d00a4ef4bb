use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use fluxar_runtime::{
    host::{Host, StdHost},
    stdlib, Interpreter,
};
use log::debug;

/// Interpreter for the Fluxar scripting language. Starts an interactive
/// prompt when no command is given.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Executes a script file
    Run { script: PathBuf },
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Some(Command::Run { script }) => run_file(&script),
        None => run_repl(),
    }
}

fn run_file(path: &Path) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read '{}': {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    let name = path.display().to_string();
    match fluxar_runtime::run(&name, &source) {
        Ok(value) => {
            debug!("{name} finished with {value}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run_repl() -> ExitCode {
    let mut interpreter = Interpreter::new(stdlib::globals());
    let mut terminal = StdHost;
    loop {
        let line = match terminal.read_line(">>> ") {
            Ok(Some(line)) => line,
            // End of input (usually Ctrl-D)
            Ok(None) => return ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Failed to read line: {e}");
                return ExitCode::FAILURE;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match interpreter.run("<stdin>", &line) {
            Ok(value) => println!("{value}"),
            Err(e) => eprintln!("{e}"),
        }
    }
}
