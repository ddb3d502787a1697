//! Feed aggregation.
//!
//! Every handler's `get_feed` lists candidates (API listing, RSS entries or
//! links scraped from an index page) and hands them to [`collect_feed`],
//! which fetches items one at a time, drops failures and filtered items,
//! stops at `args.max` and sorts newest first.

use crate::config::Args;
use crate::models::{Feed, Item};
use crate::utils::filter_item;
use itertools::Itertools;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

/// Fetch candidates sequentially into `feed`.
///
/// A candidate whose item comes back `None` is skipped; it never aborts the
/// feed. Items rejected by [`filter_item`] don't count toward `args.max`.
pub async fn collect_feed<C>(
    candidates: impl IntoIterator<Item = C>,
    args: &Args,
    mut feed: Feed,
    mut get_item: impl AsyncFnMut(C) -> Option<Item>,
) -> Feed {
    let mut skipped = 0usize;
    for candidate in candidates {
        if args.max.is_some_and(|max| feed.items.len() >= max) {
            debug!(max = ?args.max, "Reached max items");
            break;
        }
        let Some(item) = get_item(candidate).await else {
            skipped += 1;
            continue;
        };
        if !filter_item(&item, args) {
            continue;
        }
        if item.timestamp.is_none() {
            warn!(url = %item.url, "Feed item has no timestamp; it will sort last");
        }
        feed.items.push(item);
    }
    feed.sort_items();
    info!(count = feed.items.len(), skipped, "Collected feed items");
    feed
}

/// Collect article links from an index page.
///
/// Links are resolved against `base`, must match `pattern` when given, and
/// are de-duplicated (ignoring fragments) in page order.
pub fn links_from_html(html: &str, base: &str, selector: &str, pattern: Option<&Regex>) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        warn!(%selector, "Invalid feed link selector");
        return Vec::new();
    };
    let Ok(base) = Url::parse(base) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .map(|mut url| {
            url.set_fragment(None);
            url.to_string()
        })
        .filter(|url| pattern.is_none_or(|re| re.is_match(url)))
        .unique()
        .collect()
}
