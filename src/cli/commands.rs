//! CLI command implementations
//!
//! Each command loads and validates the configuration, opens the local
//! backend and runs exactly one storage operation on a fresh runtime.

use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::fs::File;

use crate::file_storage::{
    LocalBackend, ObjectBody, RequestContext, SignedUrlRequest, StorageBackend, StorageConfig,
};
use crate::observability::init_logging;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Parse arguments, run the command and report the outcome on stdout
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();

    if let Err(e) = init_logging(cli.log_level, cli.log_format) {
        eprintln!("logging disabled: {}", e);
    }

    match run_command(&cli.config, cli.command) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Run one command against the configured storage and return its response data
pub fn run_command(config_path: &Path, cmd: Command) -> CliResult<Value> {
    let config = StorageConfig::load(config_path)?;

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(open_and_execute(&config, cmd))
}

async fn open_and_execute(config: &StorageConfig, cmd: Command) -> CliResult<Value> {
    let backend = LocalBackend::open(config).await?;
    execute(&backend, cmd).await
}

async fn execute<B: StorageBackend>(backend: &B, cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Head { key } => {
            let meta = backend.head_object(&key).await?;
            Ok(json!({ "key": key, "content_length": meta.content_length }))
        }

        Command::Get { key, output: Some(output) } => {
            let mut object = backend.create_read_stream(&key).await?;
            let mut file = File::create(&output).await?;
            let copied = tokio::io::copy(&mut object.stream, &mut file).await?;
            file.sync_all().await?;

            Ok(json!({
                "key": key,
                "content_length": object.content_length,
                "written": copied,
                "output": output.display().to_string(),
            }))
        }

        Command::Get { key, output: None } => {
            let data = backend.get_object(&key).await?;
            Ok(json!({
                "key": key,
                "content_length": data.len(),
                "content_base64": STANDARD.encode(&data),
            }))
        }

        Command::Put { key, input, stream } => {
            let length = if stream {
                let file = File::open(&input).await?;
                let length = file.metadata().await?.len();
                backend
                    .put_object(&key, ObjectBody::from_reader(file), Some(length))
                    .await?;
                length
            } else {
                let data = Bytes::from(tokio::fs::read(&input).await?);
                let length = data.len() as u64;
                backend.put_object(&key, data.into(), Some(length)).await?;
                length
            };

            Ok(json!({ "key": key, "content_length": length }))
        }

        Command::Upload { key, source } => {
            backend.upload_object(&key, &source).await?;
            Ok(json!({ "key": key, "source": source.display().to_string() }))
        }

        Command::Copy { source, dest } => {
            backend.copy_object(&source, &dest).await?;
            Ok(json!({ "source": source, "dest": dest }))
        }

        Command::List { prefix } => {
            let keys = backend.list_objects(&prefix).await?;
            Ok(json!({ "prefix": prefix, "count": keys.len(), "keys": keys }))
        }

        Command::Delete { key } => {
            backend.delete_object(&key).await?;
            Ok(json!({ "key": key, "deleted": true }))
        }

        Command::Sign {
            key,
            base_url,
            url_type,
            filename,
            created_at,
            shard_key,
        } => {
            let mut request = SignedUrlRequest::new(base_url, key, url_type);
            request.filename = filename;
            request.created_at_ms = created_at;
            let ctx = RequestContext { shard_key };

            let url = backend.get_signed_url(&ctx, &request)?;
            Ok(json!({ "key": request.key, "url": url }))
        }
    }
}
