//! # Feed Handlers
//!
//! Per-site handlers that turn news sites into normalized JSON Feed items.
//!
//! ## Features
//!
//! - WordPress REST API, Next.js (`_next/data`), Semafor/Sanity, Arc XP
//!   Fusion, Drupal and RSS/Atom sources
//! - Block-structured bodies (Fusion ANS, Portable Text, Drupal paragraphs)
//!   rendered into one HTML dialect with proxied images and video
//! - Rotating site identifiers (Next.js build ids, Fusion deployments)
//!   refreshed on demand and persisted to the site registry
//!
//! ## Usage
//!
//! ```sh
//! feed_handlers content https://www.example.com/2024/01/01/hello/
//! feed_handlers feed https://www.example.com/category/news/ --max 10
//! ```
//!
//! ## Architecture
//!
//! 1. **Lookup**: find the site record for the URL's domain in `sites.json`
//! 2. **Dispatch**: hand the request to the site's handler module
//! 3. **Fetch**: the handler talks to the site's API with retries
//! 4. **Output**: print the item or feed as JSON, or write it to a file

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod blocks;
mod cli;
mod config;
mod error;
mod feed;
mod fetch;
mod handlers;
mod html;
mod models;
mod next_data;
mod outputs;
mod sites;
#[cfg(test)]
mod test_utils;
mod utils;

use cli::{Cli, Command};
use config::Settings;
use fetch::{HttpFetcher, RetryFetch};
use handlers::Context;
use outputs::json;
use sites::JsonFileRegistry;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let cli = Cli::parse();
    let url = cli.command.url().to_string();
    debug!(command = ?cli.command, "Parsed CLI arguments");

    // ---- Settings ----
    let mut settings = Settings::load(cli.config.as_deref().unwrap_or("config.yaml"))?;
    if let Some(server) = &cli.server {
        settings.server = server.clone();
    }
    if let Some(sites) = &cli.sites {
        settings.sites_path = sites.clone();
    }

    if let Some(dir) = &cli.output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "Output directory is not writable");
            return Err(e);
        }
    }

    // ---- Site lookup ----
    let registry = JsonFileRegistry::open(&settings.sites_path)?;
    let Some((site_key, mut site)) = registry.site_for_url(&url) else {
        error!(%url, "No site record for this URL");
        return Err(format!("no site record for {url}").into());
    };
    info!(site = %site_key, module = %site.module, "Resolved site");

    let fetcher = RetryFetch::new(
        HttpFetcher::new(&settings)?,
        settings.retries,
        Duration::from_millis(settings.retry_base_ms),
    );
    let ctx = Context {
        fetcher: &fetcher,
        registry: &registry,
        settings: &settings,
        site_key: &site_key,
        save_debug: cli.debug,
    };
    let args = cli.options.to_args();

    // ---- Dispatch ----
    let result = match &cli.command {
        Command::Content { url } => handlers::get_content(url, &args, &mut site, &ctx)
            .await
            .map(|item| serde_json::to_value(item))
            .transpose()?,
        Command::Feed { url } => handlers::get_feed(url, &args, &mut site, &ctx)
            .await
            .map(|feed| serde_json::to_value(feed))
            .transpose()?,
    };
    let Some(result) = result else {
        error!(%url, "Handler produced nothing");
        return Err(format!("nothing produced for {url}").into());
    };

    // ---- Output ----
    match &cli.output_dir {
        Some(dir) => {
            let path = json::write_result(&result, &url, dir).await?;
            info!(%path, "Wrote result");
        }
        None => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, millis = elapsed.as_millis() as u64, "Execution complete");
    Ok(())
}
