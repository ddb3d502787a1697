//! Per-site feed handlers.
//!
//! Every handler exposes the same two operations:
//!
//! - `get_content(url, args, site, ctx) -> Option<Item>`
//! - `get_feed(url, args, site, ctx) -> Option<Feed>`
//!
//! `None` means "could not be produced"; the reason has already been logged.
//! The site record is passed mutably because handlers may refresh rotating
//! identifiers (Next.js build ids, Fusion deployments) and persist them via
//! the registry in [`Context`].
//!
//! # Supported Modules
//!
//! | Module | Source | Notes |
//! |--------|--------|-------|
//! | [`wp_posts`] | WordPress REST API | HAL link traversal for authors, tags, media |
//! | [`nextjs`] | Next.js `_next/data` | Generic `pageProps` post/article shapes |
//! | [`semafor`] | Next.js + Portable Text | Sanity block content |
//! | [`fusion`] | Arc XP content API | ANS `content_elements` |
//! | [`drupal`] | Drupal `?_format=json` | Body plus paragraph entities |
//! | [`rss`] | RSS 2.0 / Atom | Entries mapped directly; multi-feed merge |

pub mod drupal;
pub mod fusion;
pub mod nextjs;
pub mod rss;
pub mod semafor;
pub mod wp_content;
pub mod wp_posts;

use crate::blocks::{ImageBlock, str_at};
use crate::config::{Args, Settings};
use crate::feed::links_from_html;
use crate::html::first_img_src;
use crate::fetch::{Fetch, FetchOptions, get_url_html};
use crate::models::{Feed, Item};
use crate::outputs::debug::{write_debug_file, write_debug_json};
use crate::sites::{SiteConfig, SiteRegistry};
use crate::utils::{epoch_to_utc, origin, parse_date};
use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument, warn};
use url::Url;

const DEFAULT_LINK_SELECTOR: &str = "h2 a[href], h3 a[href], article a[href]";

/// Collaborators shared by every handler call.
pub struct Context<'a, F, R> {
    pub fetcher: &'a F,
    pub registry: &'a R,
    pub settings: &'a Settings,
    /// Registry key of the site being served.
    pub site_key: &'a str,
    /// Dump intermediate payloads into `settings.debug_dir`.
    pub save_debug: bool,
}

impl<F, R> Context<'_, F, R> {
    pub async fn debug_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) {
        if self.save_debug {
            write_debug_json(&self.settings.debug_dir, name, value).await;
        }
    }

    pub async fn debug_html(&self, name: &str, html: &str) {
        if self.save_debug {
            write_debug_file(&self.settings.debug_dir, name, html).await;
        }
    }
}

/// First non-blank string found at any of the `/`-separated `paths`.
pub(crate) fn first_str<'v>(value: &'v Value, paths: &[&str]) -> Option<&'v str> {
    paths.iter().find_map(|p| str_at(value, p))
}

/// First date found at any of `paths`: a string in any format
/// [`parse_date`] knows (offset-less values in `tz`) or epoch seconds/ms.
pub(crate) fn date_at(value: &Value, paths: &[&str], tz: Option<FixedOffset>) -> Option<DateTime<Utc>> {
    paths.iter().find_map(|p| match value.pointer(&format!("/{p}"))? {
        Value::String(s) => parse_date(s, tz),
        Value::Number(n) => epoch_to_utc(n.as_f64()?),
        _ => None,
    })
}

fn name_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(_) => first_str(value, &["name", "title", "label", "displayName", "node/name"]),
        _ => None,
    }
}

/// Names (authors, tags) from the first of `paths` that has any. Accepts a
/// single string, an object with a name, or an array of either.
pub(crate) fn names_at(value: &Value, paths: &[&str]) -> Vec<String> {
    for path in paths {
        let names: Vec<String> = match value.pointer(&format!("/{path}")) {
            Some(Value::Array(list)) => list.iter().filter_map(name_of).map(str::to_string).collect(),
            Some(other) => name_of(other).map(str::to_string).into_iter().collect(),
            None => Vec::new(),
        };
        let names: Vec<String> = names.into_iter().filter(|n| !n.trim().is_empty()).collect();
        if !names.is_empty() {
            return names;
        }
    }
    Vec::new()
}

/// Lede figure for the top of an item body.
pub(crate) fn lede_figure(image: &ImageBlock, args: &Args) -> String {
    if args.no_lede_caption {
        ImageBlock {
            caption: None,
            credit: None,
            ..image.clone()
        }
        .to_html()
    } else {
        image.to_html()
    }
}

/// Whether a rendered body opens with an image.
pub(crate) fn starts_with_image(html: &str) -> bool {
    let html = html.trim_start();
    ["<figure", "<img", "<p><img"].iter().any(|p| html.starts_with(p))
        || html.starts_with("<p><a") && html.split("</p>").next().is_some_and(|p| p.contains("<img"))
}

/// Article links scraped from an index page.
///
/// Uses the site's `feed_link_selector`/`feed_link_pattern` and keeps only
/// links on the index page's own origin.
pub(crate) async fn index_links<F: Fetch, R>(url: &str, site: &SiteConfig, ctx: &Context<'_, F, R>) -> Option<Vec<String>> {
    let html = get_url_html(ctx.fetcher, url, &FetchOptions::default()).await?;
    ctx.debug_html("debug.html", &html).await;
    let pattern = match site.feed_link_pattern.as_deref().map(Regex::new) {
        Some(Ok(re)) => Some(re),
        Some(Err(e)) => {
            warn!(error = %e, "Invalid feed_link_pattern; ignoring it");
            None
        }
        None => None,
    };
    let selector = site.feed_link_selector.as_deref().unwrap_or(DEFAULT_LINK_SELECTOR);
    let home = origin(url);
    let links: Vec<String> = links_from_html(&html, url, selector, pattern.as_ref())
        .into_iter()
        .filter(|link| origin(link) == home && link.trim_end_matches('/') != url.trim_end_matches('/'))
        .collect();
    if links.is_empty() {
        warn!(%selector, "No article links on index page");
    }
    Some(links)
}

/// Fields read from the article page itself via the site's selectors.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct PageFields {
    pub authors: Vec<String>,
    pub lede: Option<String>,
}

fn parse_selector(selector: Option<&str>) -> Option<Selector> {
    let selector = selector?;
    match Selector::parse(selector) {
        Ok(sel) => Some(sel),
        Err(e) => {
            warn!(%selector, error = ?e, "Invalid site selector; ignoring it");
            None
        }
    }
}

fn element_image(el: ElementRef<'_>) -> Option<String> {
    match el.value().name() {
        "meta" => el.value().attr("content").map(str::to_string),
        _ => first_img_src(el),
    }
}

/// Scrape authors and the lede image from an article page.
///
/// Returns `None` when the site configures neither `author_selector` nor
/// `lede_selector`, or when the page cannot be fetched.
pub(crate) async fn scrape_page<F: Fetch, R>(url: &str, site: &SiteConfig, ctx: &Context<'_, F, R>) -> Option<PageFields> {
    let author_sel = parse_selector(site.author_selector.as_deref());
    let lede_sel = parse_selector(site.lede_selector.as_deref());
    if author_sel.is_none() && lede_sel.is_none() {
        return None;
    }
    let html = get_url_html(ctx.fetcher, url, &FetchOptions::default()).await?;
    let doc = Html::parse_document(&html);

    let mut fields = PageFields::default();
    if let Some(sel) = &author_sel {
        for el in doc.select(sel) {
            let name = el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ");
            if !name.is_empty() && !fields.authors.contains(&name) {
                fields.authors.push(name);
            }
        }
    }
    if let Some(sel) = &lede_sel {
        fields.lede = doc
            .select(sel)
            .find_map(element_image)
            .and_then(|src| Url::parse(url).ok()?.join(&src).ok())
            .map(String::from);
    }
    info!(authors = fields.authors.len(), lede = fields.lede.is_some(), "Scraped article page");
    Some(fields)
}

/// The handler module serving a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    WpPosts,
    NextJs,
    Semafor,
    Fusion,
    Drupal,
    Rss,
}

impl Handler {
    pub fn from_module(module: &str) -> Option<Self> {
        match module {
            "wp_posts" | "wp" | "wordpress" => Some(Handler::WpPosts),
            "nextjs" | "next" => Some(Handler::NextJs),
            "semafor" | "sanity" => Some(Handler::Semafor),
            "fusion" | "arc" => Some(Handler::Fusion),
            "drupal" => Some(Handler::Drupal),
            "rss" | "atom" => Some(Handler::Rss),
            _ => None,
        }
    }
}

/// Fetch and normalize a single item with the site's handler.
///
/// `args.embed` swaps the rendered body for a preview card.
#[instrument(level = "info", skip_all, fields(%url, module = %site.module))]
pub async fn get_content<F: Fetch, R: SiteRegistry>(
    url: &str,
    args: &Args,
    site: &mut SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Item> {
    let Some(handler) = Handler::from_module(&site.module) else {
        warn!("No handler for site module");
        return None;
    };
    let mut item = match handler {
        Handler::WpPosts => wp_posts::get_content(url, args, site, ctx).await,
        Handler::NextJs => nextjs::get_content(url, args, site, ctx).await,
        Handler::Semafor => semafor::get_content(url, args, site, ctx).await,
        Handler::Fusion => fusion::get_content(url, args, site, ctx).await,
        Handler::Drupal => drupal::get_content(url, args, site, ctx).await,
        Handler::Rss => rss::get_content(url, args, site, ctx).await,
    }?;
    if args.embed {
        item.content_html = Some(item.preview_card());
    }
    info!(id = %item.id, "Produced item");
    Some(item)
}

/// Build a feed with the site's handler.
#[instrument(level = "info", skip_all, fields(%url, module = %site.module))]
pub async fn get_feed<F: Fetch, R: SiteRegistry>(
    url: &str,
    args: &Args,
    site: &mut SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Feed> {
    let Some(handler) = Handler::from_module(&site.module) else {
        warn!("No handler for site module");
        return None;
    };
    let feed = match handler {
        Handler::WpPosts => wp_posts::get_feed(url, args, site, ctx).await,
        Handler::NextJs => nextjs::get_feed(url, args, site, ctx).await,
        Handler::Semafor => semafor::get_feed(url, args, site, ctx).await,
        Handler::Fusion => fusion::get_feed(url, args, site, ctx).await,
        Handler::Drupal => drupal::get_feed(url, args, site, ctx).await,
        Handler::Rss => rss::get_feed(url, args, site, ctx).await,
    }?;
    info!(count = feed.items.len(), "Produced feed");
    Some(feed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryRegistry, StaticFetcher, context, test_settings};

    #[test]
    fn test_names_and_dates() {
        let v = serde_json::json!({
            "authors": [{"name": "A"}, "B", {"node": {"name": "C"}}, {"id": 1}],
            "tags": "solo",
            "published": 1704067200000u64,
            "updated": "2024-01-01T00:00:00"
        });
        assert_eq!(names_at(&v, &["byline", "authors"]), ["A", "B", "C"]);
        assert_eq!(names_at(&v, &["tags"]), ["solo"]);
        assert!(names_at(&v, &["missing"]).is_empty());
        assert_eq!(date_at(&v, &["published"], None).unwrap().timestamp(), 1704067200);
        let tz = FixedOffset::east_opt(3600);
        assert_eq!(date_at(&v, &["nope", "updated"], tz).unwrap().timestamp(), 1704067200 - 3600);
    }

    #[tokio::test]
    async fn test_scrape_page_reads_meta_and_lazy_images() {
        let page = r#"<html><head><meta property="og:image" content="/og.jpg"></head>
            <body><p class="by">Ann</p><p class="by">Ann</p><p class="by">Bo</p></body></html>"#;
        let fetcher = StaticFetcher::new().route("https://x.test/a", page);
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);

        let mut site = SiteConfig::new("wp_posts");
        assert!(scrape_page("https://x.test/a", &site, &ctx).await.is_none());
        assert_eq!(fetcher.requested("https://x.test/a"), 0);

        site.author_selector = Some("p.by".into());
        site.lede_selector = Some(r#"meta[property="og:image"]"#.into());
        let fields = scrape_page("https://x.test/a", &site, &ctx).await.unwrap();
        assert_eq!(fields.authors, ["Ann", "Bo"]);
        assert_eq!(fields.lede.as_deref(), Some("https://x.test/og.jpg"));

        let lazy = Html::parse_fragment(r#"<div><img src="data:image/gif;base64,xx" data-src="/lazy.jpg"></div>"#);
        let div = lazy.select(&Selector::parse("div").unwrap()).next().unwrap();
        assert_eq!(element_image(div).as_deref(), Some("/lazy.jpg"));
    }

    #[test]
    fn test_starts_with_image() {
        assert!(starts_with_image(r#" <figure data-fh="image"></figure><p>x</p>"#));
        assert!(starts_with_image(r#"<p><a href="/a"><img src="a.jpg"></a></p>"#));
        assert!(!starts_with_image("<p>Text</p><figure></figure>"));
    }

    #[test]
    fn test_lede_caption_toggle() {
        let mut image = ImageBlock::new("https://x.test/a.jpg");
        image.caption = Some("Harbor".into());
        assert!(lede_figure(&image, &Args::default()).contains("Harbor"));
        let args = Args {
            no_lede_caption: true,
            ..Args::default()
        };
        assert!(!lede_figure(&image, &args).contains("Harbor"));
    }

    #[test]
    fn test_module_names() {
        assert_eq!(Handler::from_module("wp_posts"), Some(Handler::WpPosts));
        assert_eq!(Handler::from_module("arc"), Some(Handler::Fusion));
        assert_eq!(Handler::from_module("myspace"), None);
    }

    #[tokio::test]
    async fn test_unknown_module_yields_none() {
        let fetcher = StaticFetcher::new();
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);
        let mut site = SiteConfig::new("myspace");
        assert!(get_content("https://x.test/a", &Args::default(), &mut site, &ctx).await.is_none());
        assert!(get_feed("https://x.test/", &Args::default(), &mut site, &ctx).await.is_none());
        assert!(fetcher.requests.borrow().is_empty());
    }
}
