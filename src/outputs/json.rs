//! JSON output for produced items and feeds.
//!
//! Results are printed to stdout unless an output directory is given, in
//! which case they land in `{output_dir}/{slug}.json` where the slug is
//! derived from the requested URL.

use crate::utils::slugify_title;
use serde::Serialize;
use std::error::Error;
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize `value` and write it under `output_dir`, named after `url`.
///
/// # Returns
///
/// The path written, or an error if directory creation or writing fails.
#[instrument(level = "info", skip_all, fields(output_dir = %output_dir))]
pub async fn write_result<T: Serialize>(value: &T, url: &str, output_dir: &str) -> Result<String, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(value)?;

    info!("Ensuring output directory exists");
    if let Err(e) = fs::create_dir_all(output_dir).await {
        error!(error = %e, "Failed to create output dir");
        return Err(e.into());
    }

    let output_filename = format!("{}/{}.json", output_dir.trim_end_matches('/'), file_stem(url));
    fs::write(&output_filename, json).await?;
    info!(path = %output_filename, "Wrote JSON result");

    Ok(output_filename)
}

fn file_stem(url: &str) -> String {
    let stripped = url.trim_start_matches("https://").trim_start_matches("http://");
    let slug = slugify_title(stripped);
    if slug.is_empty() { "result".to_string() } else { slug }
}
