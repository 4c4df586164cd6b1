//! CLI module for AeroStore
//!
//! Every storage operation is exposed as a one-shot command that loads the
//! configuration, performs the operation and prints a JSON response.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
