//! Utility functions shared by every handler.
//!
//! This module provides helper functions used throughout the application:
//! - Name and tag normalization (`join_names`, `dedupe_case_insensitive`)
//! - Date parsing, timezone coercion and display formatting
//! - HTML text extraction
//! - Feed-level filtering (`filter_item`, `check_age`)
//! - URL helpers (`clean_url`, `get_redirect_url`, `get_youtube_id`,
//!   `image_from_srcset`, `site_key`)
//! - File system helpers for debug dumps and output directories

use crate::config::Args;
use crate::models::Item;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde_json::Value;
use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

const NAIVE_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

static YOUTUBE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:youtube(?:-nocookie)?\.com/(?:embed/|shorts/|live/|v/|watch\?(?:.*&)?v=)|youtu\.be/)([A-Za-z0-9_-]{11})")
        .expect("youtube id regex")
});

/// Join names as "A, B and C". Only the final separator changes.
pub fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [one] => one.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

/// De-duplicate strings case-insensitively, keeping the first spelling seen.
pub fn dedupe_case_insensitive<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    values.into_iter().unique_by(|v| v.to_lowercase()).collect()
}

/// Parse a timestamp in any of the formats upstream APIs use.
///
/// Offset-less values are interpreted in `tz` (UTC when `None`). The result
/// is always coerced to UTC.
pub fn parse_date(date_str: &str, tz: Option<FixedOffset>) -> Option<DateTime<Utc>> {
    let date_str = date_str.trim();
    if date_str.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(date_str) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(date_str) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(date_str, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(parsed.with_timezone(&Utc));
    }

    let tz = match tz {
        Some(tz) => tz,
        None => FixedOffset::east_opt(0)?,
    };
    for fmt in NAIVE_DATE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(date_str, fmt) {
            return naive_to_utc(naive, tz);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return naive_to_utc(date.and_hms_opt(0, 0, 0)?, tz);
    }
    if let Ok(secs) = date_str.parse::<f64>() {
        return epoch_to_utc(secs);
    }

    debug!(%date_str, "Unrecognized date format");
    None
}

fn naive_to_utc(naive: NaiveDateTime, tz: FixedOffset) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert epoch seconds (or milliseconds, when implausibly large) to UTC.
pub fn epoch_to_utc(value: f64) -> Option<DateTime<Utc>> {
    let secs = if value > 1e11 { value / 1000.0 } else { value };
    DateTime::from_timestamp(secs.trunc() as i64, ((secs.fract()) * 1e9) as u32)
}

/// Parse a timezone offset such as `-05:00`. `UTC`/`Z` map to zero.
pub fn parse_offset(tz: &str) -> Option<FixedOffset> {
    match tz.trim() {
        "" => None,
        "UTC" | "utc" | "Z" | "GMT" => FixedOffset::east_opt(0),
        other => other.parse::<FixedOffset>().ok(),
    }
}

/// Human date used inside rendered content, e.g. "January 1, 2024".
pub fn format_display_date(dt: &DateTime<Utc>) -> String {
    dt.format("%B %-d, %Y").to_string()
}

/// "1 hr, 5 min" style durations for audio and video captions.
pub fn calc_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours} hr"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes} min"));
    }
    if hours == 0 && (secs > 0 || parts.is_empty()) {
        parts.push(format!("{secs} sec"));
    }
    parts.join(", ")
}

/// Extract the text of an HTML fragment, decoding entities.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment
        .root_element()
        .text()
        .collect::<String>()
        .split_whitespace()
        .join(" ")
}

/// Check the item against `args.age` (hours). Items without a date pass.
pub fn check_age(item: &Item, args: &Args) -> bool {
    let (Some(age), Some(ts)) = (args.age, item.timestamp) else {
        return true;
    };
    let now = Utc::now().timestamp() as f64;
    now - ts <= age * 3600.0
}

/// Feed-level inclusion predicate: age, then keyword include/exclude.
pub fn filter_item(item: &Item, args: &Args) -> bool {
    if !check_age(item, args) {
        debug!(url = %item.url, "Filtered out by age");
        return false;
    }
    if args.keywords.is_empty() && args.exclude.is_empty() {
        return true;
    }

    let mut haystack = String::new();
    for part in [item.title.as_deref(), item.summary.as_deref()].into_iter().flatten() {
        haystack.push_str(part);
        haystack.push('\n');
    }
    for tag in item.tags().unwrap_or_default() {
        haystack.push_str(tag);
        haystack.push('\n');
    }
    let haystack = haystack.to_lowercase();

    if args.exclude.iter().any(|k| haystack.contains(&k.to_lowercase())) {
        debug!(url = %item.url, "Filtered out by exclude keyword");
        return false;
    }
    if !args.keywords.is_empty() && !args.keywords.iter().any(|k| haystack.contains(&k.to_lowercase())) {
        debug!(url = %item.url, "Filtered out by keywords");
        return false;
    }
    true
}

/// Drop query and fragment from a URL.
pub fn clean_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    }
}

/// Resolve an affiliate or tracking redirect to its target URL.
///
/// Returns `None` when the URL does not carry a recognizable target.
pub fn get_redirect_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    for key in ["url", "u", "murl", "ued", "dest", "destination"] {
        if let Some((_, value)) = parsed.query_pairs().find(|(k, _)| k == key) {
            if value.starts_with("http") {
                return Some(value.into_owned());
            }
        }
    }
    None
}

pub fn get_youtube_id(url: &str) -> Option<String> {
    YOUTUBE_ID.captures(url).map(|c| c[1].to_string())
}

/// Pick the widest candidate from a `srcset` attribute.
pub fn image_from_srcset(srcset: &str, target_width: Option<u32>) -> Option<String> {
    let mut candidates: Vec<(u32, String)> = srcset
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?.to_string();
            let width = parts
                .next()
                .and_then(|w| w.trim_end_matches(['w', 'x']).parse::<f32>().ok())
                .map(|w| w as u32)
                .unwrap_or(0);
            Some((width, url))
        })
        .collect();
    if candidates.is_empty() {
        return None;
    }
    match target_width {
        Some(target) => candidates
            .into_iter()
            .min_by_key(|(w, _)| w.abs_diff(target))
            .map(|(_, url)| url),
        None => {
            candidates.sort_by_key(|(w, _)| *w);
            candidates.pop().map(|(_, url)| url)
        }
    }
}

/// From a list of JSON objects, pick the one whose numeric `key` is closest
/// to `target`.
pub fn closest_dict<'a>(list: &'a [Value], key: &str, target: i64) -> Option<&'a Value> {
    list.iter()
        .filter_map(|v| {
            let n = v.get(key).and_then(|n| n.as_i64().or_else(|| n.as_str()?.parse().ok()))?;
            Some((n.abs_diff(target), v))
        })
        .min_by_key(|(diff, _)| *diff)
        .map(|(_, v)| v)
}

/// Registry key for a URL: the host without a leading `www.`.
pub fn site_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.trim_start_matches("www.").to_string())
}

/// `scheme://host[:port]` of a URL.
pub fn origin(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    Some(parsed.origin().ascii_serialization())
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to roughly `max` bytes (on a char boundary)
/// with `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}

/// Convert a title or URL path to a file-name friendly slug.
pub fn slugify_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-', " ")
        .split_whitespace()
        .join("-")
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
