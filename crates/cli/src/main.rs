//! revrest command-line entry point.
//!
//! Loads configuration, wires the REST helper and prints fetched JSON on
//! stdout. Logging goes to stderr so stdout carries only command output.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use reqwest::Method;
use revrest_client::{EventBus, QueryParams, RestApiHelper, RestRequest};
use revrest_core::AppConfig;
use serde_json::Value;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "revrest")]
#[command(about = "Query a code-review REST API through a deduplicating, caching client")]
#[command(version)]
struct Args {
    /// Canonical path of the site, e.g. "/gerrit" (overrides REVREST_CANONICAL_PATH)
    #[arg(long, global = true)]
    site: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch JSON from a path below the site
    Get {
        path: String,

        /// Query parameter as key=value; repeat a key to send several values
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, String)>,

        /// Query parameter without a value
        #[arg(long = "flag")]
        flags: Vec<String>,

        /// Bypass the result cache and in-flight deduplication
        #[arg(long)]
        no_cache: bool,

        /// Issue the request this many times concurrently
        #[arg(long, default_value_t = 1)]
        repeat: usize,
    },

    /// Send a write request and print the status and payload
    Send {
        #[arg(value_parser = parse_method)]
        method: Method,

        path: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse();

    let mut config = AppConfig::load().context("failed to load configuration")?;
    if let Some(site) = args.site {
        config.canonical_path = site;
        config.validate().context("invalid --site")?;
    }

    let helper = RestApiHelper::from_config(&config, Arc::new(EventBus::default()))?;
    tracing::debug!(base_url = %helper.base_url(), "revrest ready");

    match args.command {
        Command::Get { path, params, flags, no_cache, repeat } => {
            let req = RestRequest::get(path).with_params(query_params(params, flags));
            get(&helper, &req, no_cache, repeat.max(1)).await
        }
        Command::Send { method, path, body } => send(&helper, method, path, body).await,
    }
}

async fn get(helper: &RestApiHelper, req: &RestRequest, no_cache: bool, repeat: usize) -> Result<()> {
    let results = join_all((0..repeat).map(|_| async {
        if no_cache { helper.fetch_json(req, false).await } else { helper.fetch_cache_json(req).await }
    }))
    .await;

    let mut values = Vec::with_capacity(results.len());
    for result in results {
        values.push(result?);
    }
    if values.windows(2).any(|pair| pair[0] != pair[1]) {
        tracing::warn!(repeat, "concurrent requests returned different payloads");
    }

    match values.into_iter().next().flatten() {
        Some(value) => {
            println!("{}", serde_json::to_string_pretty(&value)?);
            Ok(())
        }
        None => bail!("server returned an error status for {}", req.url),
    }
}

async fn send(helper: &RestApiHelper, method: Method, path: String, body: Option<String>) -> Result<()> {
    let mut req = RestRequest::new(method, path);
    if let Some(body) = body {
        let value: Value = serde_json::from_str(&body).context("--body must be valid JSON")?;
        req = req.with_json(&value)?;
    }

    let response = helper.send(&req).await?;
    println!("{}", response.status);

    let payload = helper.read_response_payload(&response);
    match payload.parsed {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None if !payload.raw.is_empty() => println!("{}", payload.raw),
        None => {}
    }

    if !response.ok() {
        bail!("request failed with status {}", response.status);
    }
    Ok(())
}

/// Group repeated keys into multi-valued parameters, keeping first-seen order.
fn query_params(params: Vec<(String, String)>, flags: Vec<String>) -> QueryParams {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in params {
        match grouped.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value),
            None => grouped.push((key, vec![value])),
        }
    }

    let query = grouped.into_iter().fold(QueryParams::new(), |query, (key, mut values)| {
        if values.len() == 1 { query.param(key, values.remove(0)) } else { query.params(key, values) }
    });
    flags.into_iter().fold(query, |query, flag| query.flag(flag))
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

fn parse_method(raw: &str) -> Result<Method, String> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes()).map_err(|e| e.to_string())
}
