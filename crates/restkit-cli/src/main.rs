//! Command-line client for poking at a REST API through the restkit core.
//!
//! Usage:
//! ```bash
//! restkit get https://api.example.com /issues/1 -q expand=comments
//! restkit batch https://api.example.com /issues/1 /issues/2 /issues/3
//! restkit config                   # Show the resolved configuration
//! ```
//!
//! Logs go to stderr (`RUST_LOG` filters them); command output goes to stdout
//! as JSON so it can be piped.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod settings;

#[derive(Debug, Parser)]
#[command(name = "restkit", author, version, about)]
struct Cli {
    /// Config file to use instead of the resolution search path.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Issue one GET request with retries
    Get(commands::get::GetArgs),

    /// GET several paths concurrently and report per-path outcomes
    Batch(commands::batch::BatchArgs),

    /// Print the resolved configuration
    Config(commands::config::ConfigArgs),
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("info".parse().context("failed to parse log directive")?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let loaded = settings::load_config(cli.config.as_deref())?;

    match &cli.command {
        Command::Get(args) => commands::get::run(args, &loaded.config).await,
        Command::Batch(args) => commands::batch::run(args, &loaded.config).await,
        Command::Config(args) => commands::config::run(args, &loaded),
    }
}
