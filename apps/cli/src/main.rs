//! bigupload command-line client.

mod config;
mod monitor;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use bigupload_transfer::{HttpTransport, UploadLogger, UploadStatus, Uploader};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, parse_header};
use crate::monitor::Monitor;

/// Upload a large file as a sequence of Content-Range requests.
#[derive(Debug, Parser)]
#[command(name = "bigupload", version)]
struct Args {
    /// File to upload, or `-` to read from stdin (requires --size).
    path: PathBuf,

    /// Destination URL.
    #[arg(long)]
    url: String,

    /// HTTP method for every chunk [default: PUT].
    #[arg(long)]
    method: Option<String>,

    /// Chunk size in bytes.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Extra header, repeatable.
    #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
    headers: Vec<String>,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Per-request timeout in seconds (0 disables it).
    #[arg(long)]
    timeout: Option<u64>,

    /// Payload size in bytes when reading from stdin.
    #[arg(long)]
    size: Option<u64>,

    /// File name sent in Content-Disposition.
    #[arg(long)]
    file_name: Option<String>,

    /// Print the final status as JSON.
    #[arg(long)]
    json: bool,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Applies command-line overrides on top of `config`.
    fn merge_into(&self, mut config: Config) -> anyhow::Result<Config> {
        if let Some(method) = &self.method {
            config.method = method.clone();
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunk_size = chunk_size;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            config.set_header(&name, value);
        }
        Ok(config)
    }

    fn reads_stdin(&self) -> bool {
        self.path.as_os_str() == "-"
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.merge_into(Config::load(args.config.as_deref())?)?;
    let status = upload(&args, &config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    }

    if status.failed() {
        tracing::error!(
            transferred = status.transferred_size,
            total = status.total_size,
            "upload failed"
        );
        return Ok(ExitCode::FAILURE);
    }

    tracing::info!(bytes = status.total_size, parts = status.total_parts, "upload complete");
    Ok(ExitCode::SUCCESS)
}

fn upload(args: &Args, config: &Config) -> anyhow::Result<UploadStatus> {
    let method = config.method()?;
    let client = reqwest::blocking::Client::builder()
        .timeout(config.timeout())
        .build()
        .context("building HTTP client")?;
    let transport = Arc::new(HttpTransport::new(client));

    let uploader = if args.reads_stdin() {
        let Some(size) = args.size else {
            bail!("reading from stdin requires --size");
        };
        Uploader::from_reader(method, &args.url, std::io::stdin(), size, transport)
    } else {
        Uploader::from_file(method, &args.url, &args.path, transport)
    };

    let mut uploader = uploader
        .with_chunk_size(config.chunk_size)
        .with_headers(config.headers.clone())
        .with_logger(UploadLogger::silent());
    if let Some(name) = &args.file_name {
        uploader = uploader.with_file_name(name);
    }

    tracing::info!(
        session = uploader.session_id(),
        url = %args.url,
        chunk_size = uploader.chunk_size(),
        "starting upload"
    );

    let monitor = Monitor::spawn(uploader.status_handle());
    let result = uploader.init();
    monitor.finish();

    result.with_context(|| format!("cannot start upload of {}", args.path.display()))?;
    Ok(uploader.status())
}
