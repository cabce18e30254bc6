// File: src/main.rs
//
// Entry point for the ale CLI (spec §4.M): `ale run [FILE]` reads and
// evaluates a program's top-level forms against a fresh root
// namespace, `ale repl` launches the interactive shell.

use ale::{bootstrap, eval, repl};
use clap::{Parser as ClapParser, Subcommand};
use colored::Colorize;
use std::fs;
use std::io::Read as _;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(ClapParser)]
#[command(name = "ale", about = "ale: a small Lisp with a bytecode compiler and stack VM", version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program, from a file or stdin
    Run {
        /// Path to the source file; omit to read from stdin
        file: Option<PathBuf>,
    },
    /// Launch the interactive REPL
    Repl,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run { file } => run(file),
        Commands::Repl => match repl::Repl::new() {
            Ok(mut repl) => match repl.run() {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("{} {e}", "REPL error:".red().bold());
                    ExitCode::from(1)
                }
            },
            Err(e) => {
                eprintln!("{} {e}", "failed to start REPL:".red().bold());
                ExitCode::from(1)
            }
        },
    }
}

fn run(file: Option<PathBuf>) -> ExitCode {
    let source = match &file {
        Some(path) => match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("{} {}: {e}", "Error:".red().bold(), path.display());
                return ExitCode::from(1);
            }
        },
        None => {
            let mut s = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut s) {
                eprintln!("{} {e}", "Error reading stdin:".red().bold());
                return ExitCode::from(1);
            }
            s
        }
    };

    let ns = bootstrap::root();
    match eval::eval_source(&ns, &source) {
        Ok(v) => {
            println!("{}", v.print());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
