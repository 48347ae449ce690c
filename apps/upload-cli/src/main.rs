//! Roost upload client entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "roost-upload", version, about = "Resumable chunked media uploads")]
struct Cli {
    /// Configuration file (defaults to the per-user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides the backend base URL from the configuration file.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Upload a file in a new session.
    Upload { file: PathBuf },
    /// Continue an interrupted session.
    Resume { session_id: String, file: PathBuf },
    /// Print progress of one or all persisted sessions as JSON.
    Status { session_id: Option<String> },
    /// Delete a persisted session.
    Discard { session_id: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "starting roost-upload");

    let mut config = match &cli.config {
        Some(path) => config::Config::load_from(path)?,
        None => config::Config::load()?,
    };
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    tracing::debug!(base_url = %config.base_url, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(config, cli.command))
}
