//! Thin CLI front-end for `cream_core::server::Server`.
//!
//! The argument contract is hand-parsed by `cream_core::config` rather
//! than declared with `clap`, so that the exact usage text, the
//! `"Invalid arguments"` message, and the process exit codes stay
//! byte-for-byte stable for scripts that invoke this binary directly.
//! The `run_app(args) -> i32` / `std::process::exit` split mirrors the
//! shape used elsewhere in this workspace's ancestry for testable
//! binaries: the exit-code logic is a plain function, and `main` is a
//! one-line shim around it.

use cream_core::config::{self, CliOutcome};
use cream_core::Server;

fn run_app(args: &[String]) -> i32 {
    env_logger::init();

    let prog_name = args.first().map(String::as_str).unwrap_or("cream");

    let config = match config::parse_args(args) {
        CliOutcome::Help => {
            print!("{}", config::usage(prog_name));
            return 0;
        }
        CliOutcome::Error(msg) => {
            eprintln!("{msg}");
            return 1;
        }
        CliOutcome::Run(config) => config,
    };

    log::info!("starting {config}");

    let server = match Server::new(config) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("failed to start cream: {err}");
            return 1;
        }
    };

    if let Err(err) = server.run() {
        eprintln!("cream exited with an error: {err}");
        return 1;
    }

    0
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    std::process::exit(run_app(&args));
}
