//! Client Pool
//!
//! Fetches URLs through a pool of rate-limited HTTP clients, backing off
//! clients that get throttled or rejected.

use anyhow::{Context, Result};
use clap::Parser;
use client_pool::{
    config::{Environment, Settings},
    logging::init_tracing,
    ClientPool, Fetcher,
};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;

/// Client Pool
///
/// Fetch URLs through a pool of rate-limited HTTP clients.
#[derive(Parser, Debug)]
#[command(name = "client-pool")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URLs to fetch
    #[arg(required = true)]
    urls: Vec<String>,

    /// JSON file listing the pooled clients (overrides CLIENT_POOL_CONFIG env var)
    #[arg(short, long)]
    clients: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Environment: dev, staging, prod (overrides ENVIRONMENT env var)
    #[arg(short, long)]
    env: Option<Environment>,

    /// Retries per URL, each on a freshly selected client (overrides FETCH_MAX_RETRIES)
    #[arg(long)]
    retries: Option<u32>,

    /// Number of URLs fetched concurrently
    #[arg(long, default_value_t = 4)]
    concurrency: usize,

    /// Log file path for JSON logs (enables file logging with 10MB rotation)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;

    // Override settings with CLI arguments
    if let Some(clients) = args.clients {
        settings.clients_file = clients;
    }
    if let Some(log_level) = args.log_level {
        settings.log_level = log_level;
    }
    if let Some(env) = args.env {
        settings.environment = env;
    }
    if let Some(retries) = args.retries {
        settings.fetch.max_retries = retries;
    }

    init_tracing(&settings.log_level, args.log_file.as_deref())?;

    if settings.is_production() && settings.fetch.max_retries == 0 {
        tracing::warn!("Running in production without fetch retries");
    }

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        environment = %settings.environment,
        clients_file = %settings.clients_file.display(),
        "Starting client pool"
    );

    let pool = ClientPool::from_json_file(
        &settings.clients_file,
        &settings.transport_options(),
        None,
    )
    .await
    .with_context(|| format!("Failed to build pool from {}", settings.clients_file.display()))?
    .with_backoff(settings.backoff());
    let pool = Arc::new(pool);

    let fetcher = Fetcher::new(pool.clone(), settings.retry_config());

    let results: Vec<_> = stream::iter(&args.urls)
        .map(|url| {
            let fetcher = &fetcher;
            async move { (url, fetcher.fetch(url).await) }
        })
        .buffer_unordered(args.concurrency.max(1))
        .collect()
        .await;

    let mut failed = 0;
    for (url, result) in results {
        match result {
            Ok(response) => println!(
                "{}\t{}\t{} bytes\tvia {} after {} attempt(s)",
                url,
                response.status,
                response.body.len(),
                response.client,
                response.attempts
            ),
            Err(err) => {
                failed += 1;
                println!("{}\tERROR\t{}", url, err);
            }
        }
    }

    let stats = pool.stats();
    tracing::info!(
        total = stats.total,
        available = stats.available,
        backed_off = stats.backed_off,
        "Fetching finished"
    );

    pool.close().await;
    tracing::info!("Client pool closed");

    if failed > 0 {
        anyhow::bail!("{} of {} URLs failed", failed, args.urls.len());
    }

    Ok(())
}
