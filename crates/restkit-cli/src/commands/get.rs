//! `restkit get` command implementation.

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use restkit_core::Config;
use serde_json::Value as JsonValue;

use crate::settings;

/// Arguments for the `get` command.
#[derive(Debug, Args)]
pub struct GetArgs {
    /// API base URL (e.g., "https://api.example.com").
    pub base_url: String,

    /// Path relative to the base URL.
    pub path: String,

    /// Query parameter as `key=value`. Can be specified multiple times.
    #[arg(short, long = "query", value_parser = settings::parse_query_pair)]
    pub query: Vec<(String, String)>,

    /// Bearer token. Falls back to `RESTKIT_TOKEN`.
    #[arg(long)]
    pub token: Option<String>,
}

pub async fn run(args: &GetArgs, config: &Config) -> Result<()> {
    eprintln!(
        "{} GET {}{}",
        style("→").cyan(),
        args.base_url.trim_end_matches('/'),
        style(&args.path).bold()
    );

    let body = execute(args, config).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&body).context("failed to render response")?
    );
    Ok(())
}

pub async fn execute(args: &GetArgs, config: &Config) -> Result<JsonValue> {
    let token = settings::resolve_token(args.token.as_deref());
    let transport = settings::build_transport(&args.base_url, token, config)?;

    let query = args
        .query
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect::<Vec<_>>();

    transport
        .get::<JsonValue>(&args.path, &query)
        .await
        .with_context(|| format!("GET {} failed", args.path))
}
