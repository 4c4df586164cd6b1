//! CLI argument definitions using clap
//!
//! Commands:
//! - aerostore head <key>
//! - aerostore get <key> [--output <file>]
//! - aerostore put <key> --input <file> [--stream]
//! - aerostore upload <key> <local-path>
//! - aerostore copy <source> <dest>
//! - aerostore list [prefix]
//! - aerostore delete <key>
//! - aerostore sign <key> --base-url <url> [...]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::file_storage::UrlType;
use crate::observability::{LogFormat, Severity};

/// AeroStore - object storage on a plain filesystem
#[derive(Parser, Debug)]
#[command(name = "aerostore")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./aerostore.json")]
    pub config: PathBuf,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: Severity,

    /// Log layout on stderr
    #[arg(long, global = true, default_value = "compact")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the size of an object
    Head { key: String },

    /// Read an object
    Get {
        key: String,

        /// Write content here instead of embedding it in the response
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Create or replace an object from a local file
    Put {
        key: String,

        /// Local file to store
        #[arg(long)]
        input: PathBuf,

        /// Stream the file instead of buffering it
        #[arg(long)]
        stream: bool,
    },

    /// Copy a local file or directory tree into storage
    Upload { key: String, source: PathBuf },

    /// Copy an object or tree to another key
    Copy { source: String, dest: String },

    /// List keys under a prefix
    List {
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Delete an object or tree
    Delete { key: String },

    /// Issue a signed URL
    Sign {
        key: String,

        /// Externally visible base URL, e.g. https://files.example.com
        #[arg(long)]
        base_url: String,

        #[arg(long, value_enum, default_value = "temporary")]
        url_type: UrlType,

        /// Name presented to the downloader
        #[arg(long)]
        filename: Option<String>,

        /// Creation time in Unix milliseconds
        #[arg(long)]
        created_at: Option<i64>,

        #[arg(long)]
        shard_key: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
