//! AeroStore CLI entry point
//!
//! Parses arguments and dispatches via `cli::run`. The JSON error envelope is
//! already on stdout when `run` fails; stderr gets a one-line summary.

use aerostore::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
