//! AniList client CLI application.

use anilist_client::AniListClient;
use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::future::join_all;
use serde_json::Value;
use shared::{Config, LogConfig};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// GraphQL query text
    #[arg(short, long, conflicts_with = "query_file", required_unless_present = "query_file")]
    query: Option<String>,

    /// Read the GraphQL query from a file
    #[arg(long)]
    query_file: Option<PathBuf>,

    /// Query variables as a JSON object
    #[arg(long)]
    variables: Option<String>,

    /// Send the query this many times concurrently
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    repeat: u32,

    /// Bypass the request rate limiter
    #[arg(long)]
    no_rate_limit: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    shared::logging::init(LogConfig::from_settings(
        &config.logging,
        "anilist-client",
        args.verbose,
    )?)?;

    info!(config_file = %args.config.display(), "Loaded configuration");

    if args.no_rate_limit {
        config.anilist.rate_limit.enabled = false;
    }

    let query = match (&args.query, &args.query_file) {
        (Some(query), _) => query.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read query file: {}", path.display()))?,
        (None, None) => bail!("Either --query or --query-file is required"),
    };

    let variables = args
        .variables
        .as_deref()
        .map(parse_variables)
        .transpose()?;

    let client =
        AniListClient::from_config(&config.anilist).context("Failed to create AniList client")?;

    info!(repeat = args.repeat, "Running query");
    let started = Instant::now();

    let results = join_all(
        (0..args.repeat).map(|_| client.raw_query::<Value>(&query, variables.clone())),
    )
    .await;

    let mut failed = 0;
    for (index, result) in results.iter().enumerate() {
        match result {
            Ok(data) => {
                let rendered =
                    serde_json::to_string_pretty(data).context("Failed to render response")?;
                println!("{}", rendered);
            }
            Err(e) => {
                failed += 1;
                error!(request = index + 1, error = %e, "Query failed");
            }
        }
    }

    info!(
        succeeded = results.len() - failed,
        failed = failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Queries finished"
    );

    if failed > 0 {
        bail!("{} of {} queries failed", failed, results.len());
    }

    Ok(())
}

/// Parse `--variables`, which must be a JSON object
fn parse_variables(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("Failed to parse --variables as JSON")?;
    if !value.is_object() {
        bail!("--variables must be a JSON object");
    }
    Ok(value)
}
