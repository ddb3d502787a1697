//! Next.js data fetching with build-id refresh.
//!
//! Next.js sites serve page data at
//! `/_next/data/<buildId>/<path>.json`. The build id rotates on every
//! deploy, so a cached id eventually 404s. [`get_next_data`] then falls back
//! to the rendered page, reads the embedded `__NEXT_DATA__` (or just the
//! build id), persists the new id and carries on. Callers always get the
//! `props` shape (`{"pageProps": ...}`) whichever path produced it.

use crate::fetch::{Fetch, FetchOptions, get_url_html, get_url_json};
use crate::handlers::Context;
use crate::sites::{SiteConfig, SiteRegistry, update_sites};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use url::Url;

static NEXT_DATA: Lazy<Selector> = Lazy::new(|| Selector::parse("script#__NEXT_DATA__").expect("next data selector"));
static BUILD_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r#""buildId"\s*:\s*"([^"]+)""#).expect("build id regex"));

/// `_next/data` URL for a page. `/` maps to `/index`; the query is kept.
pub fn next_data_url(url: &str, build_id: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let path = parsed.path().trim_end_matches('/');
    let path = if path.is_empty() { "/index" } else { path };
    let mut data_url = format!(
        "{}/_next/data/{}{}.json",
        parsed.origin().ascii_serialization(),
        build_id,
        path
    );
    if let Some(query) = parsed.query() {
        data_url.push('?');
        data_url.push_str(query);
    }
    Some(data_url)
}

/// Parse the `__NEXT_DATA__` script of a rendered page.
pub fn extract_next_data(html: &str) -> Option<Value> {
    let document = Html::parse_document(html);
    let script = document.select(&NEXT_DATA).next()?;
    let raw = script.text().collect::<String>();
    match serde_json::from_str(&raw) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "__NEXT_DATA__ is not valid JSON");
            None
        }
    }
}

/// Find a build id in raw HTML without parsing the document.
pub fn find_build_id(html: &str) -> Option<String> {
    BUILD_ID.captures(html).map(|c| c[1].to_string())
}

/// Record `new_id` if it differs from the cached one. Returns whether it changed.
fn refresh_build_id<F, R: SiteRegistry>(site: &mut SiteConfig, new_id: &str, ctx: &Context<'_, F, R>) -> bool {
    if site.build_id.as_deref() == Some(new_id) {
        return false;
    }
    info!(old = ?site.build_id, new = %new_id, site = %ctx.site_key, "Next.js build id rotated");
    site.build_id = Some(new_id.to_string());
    update_sites(ctx.registry, ctx.site_key, site);
    true
}

/// Fetch a page's Next.js data, refreshing a stale build id on the way.
///
/// The `_next/data` request gets one retry. On failure the page itself is
/// fetched once; if that fails too the result is `None`.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn get_next_data<F: Fetch, R: SiteRegistry>(
    url: &str,
    site: &mut SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Value> {
    if let Some(data_url) = site.build_id.as_deref().and_then(|id| next_data_url(url, id)) {
        debug!(%data_url, "Fetching Next.js data");
        if let Some(json) = get_url_json(ctx.fetcher, &data_url, &FetchOptions::with_retries(1)).await {
            ctx.debug_json("next.json", &json).await;
            return Some(json);
        }
    }

    info!("Next.js data unavailable; falling back to page");
    let html = get_url_html(ctx.fetcher, url, &FetchOptions::default()).await?;
    ctx.debug_html("debug.html", &html).await;

    if let Some(next_data) = extract_next_data(&html) {
        if let Some(new_id) = next_data.get("buildId").and_then(Value::as_str) {
            refresh_build_id(site, new_id, ctx);
        }
        ctx.debug_json("next.json", &next_data).await;
        return match next_data.get("props") {
            Some(props) => Some(props.clone()),
            None => {
                warn!("__NEXT_DATA__ has no props");
                None
            }
        };
    }

    let new_id = find_build_id(&html)?;
    if !refresh_build_id(site, &new_id, ctx) {
        warn!(build_id = %new_id, "Build id unchanged and data unavailable");
        return None;
    }
    let data_url = next_data_url(url, &new_id)?;
    let json = get_url_json(ctx.fetcher, &data_url, &FetchOptions::with_retries(1)).await?;
    ctx.debug_json("next.json", &json).await;
    Some(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryRegistry, StaticFetcher, context, test_settings};
    use serde_json::json;

    fn page_with_next_data(build_id: &str, props: Value) -> String {
        let data = json!({"buildId": build_id, "props": props, "page": "/[slug]"});
        format!(r#"<html><head></head><body><div id="__next"></div><script id="__NEXT_DATA__" type="application/json">{data}</script></body></html>"#)
    }

    #[test]
    fn test_next_data_url() {
        assert_eq!(
            next_data_url("https://x.test/news/story-1?ref=home", "abc").as_deref(),
            Some("https://x.test/_next/data/abc/news/story-1.json?ref=home")
        );
        assert_eq!(next_data_url("https://x.test/", "abc").as_deref(), Some("https://x.test/_next/data/abc/index.json"));
        assert_eq!(next_data_url("https://x.test/a/", "abc").as_deref(), Some("https://x.test/_next/data/abc/a.json"));
    }

    #[test]
    fn test_find_build_id() {
        assert_eq!(find_build_id(r#"{"page":"/","buildId": "xyz-1"}"#).as_deref(), Some("xyz-1"));
        assert!(find_build_id("<html></html>").is_none());
    }

    #[tokio::test]
    async fn test_cached_build_id_hits_data_url() {
        let fetcher = StaticFetcher::new().json(
            "https://x.test/_next/data/cur/story.json",
            json!({"pageProps": {"title": "T"}}),
        );
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);
        let mut site = SiteConfig::new("nextjs");
        site.build_id = Some("cur".into());

        let props = get_next_data("https://x.test/story", &mut site, &ctx).await.unwrap();
        assert_eq!(props["pageProps"]["title"], "T");
        assert_eq!(fetcher.requested("https://x.test/story"), 0);
        assert!(registry.writes.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_stale_build_id_refreshes_once_and_returns_props() {
        let fetcher = StaticFetcher::new().route(
            "https://x.test/story",
            page_with_next_data("new", json!({"pageProps": {"post": {"id": 7}}})),
        );
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);
        let mut site = SiteConfig::new("nextjs");
        site.build_id = Some("old".into());

        let props = get_next_data("https://x.test/story", &mut site, &ctx).await.unwrap();
        assert_eq!(props["pageProps"]["post"]["id"], 7);
        assert_eq!(site.build_id.as_deref(), Some("new"));
        assert_eq!(*registry.writes.borrow(), ["x.test"]);
        assert_eq!(registry.get_site("x.test").unwrap().build_id.as_deref(), Some("new"));
        assert_eq!(fetcher.requested("https://x.test/_next/data/old/story.json"), 1);
    }

    #[tokio::test]
    async fn test_regex_build_id_retries_data_url() {
        let fetcher = StaticFetcher::new()
            .route("https://x.test/story", r#"<script>self.__BUILD={"buildId":"new"}</script>"#)
            .json("https://x.test/_next/data/new/story.json", json!({"pageProps": {"ok": true}}));
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);
        let mut site = SiteConfig::new("nextjs");
        site.build_id = Some("old".into());

        let props = get_next_data("https://x.test/story", &mut site, &ctx).await.unwrap();
        assert_eq!(props["pageProps"]["ok"], true);
        assert_eq!(registry.writes.borrow().len(), 1);
    }

    #[tokio::test]
    async fn test_unchanged_id_does_not_write() {
        let fetcher = StaticFetcher::new().route(
            "https://x.test/story",
            page_with_next_data("same", json!({"pageProps": {}})),
        );
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);
        let mut site = SiteConfig::new("nextjs");
        site.build_id = Some("same".into());

        assert!(get_next_data("https://x.test/story", &mut site, &ctx).await.is_some());
        assert!(registry.writes.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_both_paths_failing_is_none() {
        let fetcher = StaticFetcher::new();
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);
        let mut site = SiteConfig::new("nextjs");
        site.build_id = Some("old".into());

        assert!(get_next_data("https://x.test/story", &mut site, &ctx).await.is_none());
        assert!(registry.writes.borrow().is_empty());
    }
}
