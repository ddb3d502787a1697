//! Drupal handler.
//!
//! Nodes are read from the core REST serialization (`<url>?_format=json`).
//! The `body` field is HTML and goes through the same cleanup as WordPress
//! content; sites built on Paragraphs also carry `field_paragraphs`
//! entities, rendered with [`crate::blocks::drupal`]. Feeds are index pages
//! scraped for article links.

use super::wp_content::format_content;
use super::{Context, index_links, lede_figure, names_at, starts_with_image};
use crate::blocks::drupal::{field, to_blocks};
use crate::blocks::{self, ImageBlock, RenderContext};
use crate::config::{Args, Settings};
use crate::feed::collect_feed;
use crate::fetch::{Fetch, FetchOptions, get_url_json};
use crate::models::{Feed, Item};
use crate::sites::{SiteConfig, SiteRegistry};
use crate::utils::{parse_date, strip_html};
use htmlescape::encode_minimal as esc;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

/// `url` with `_format=json` added to its query.
pub fn json_url(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_fragment(None);
    parsed.query_pairs_mut().append_pair("_format", "json");
    Some(parsed.to_string())
}

fn lede(node: &Value) -> Option<ImageBlock> {
    let url = field(node, "field_image").or_else(|| field(node, "field_media_image"))?;
    Some(ImageBlock {
        url: url.to_string(),
        caption: field(node, "field_image_caption")
            .or_else(|| node.pointer("/field_image/0/alt").and_then(Value::as_str))
            .map(str::to_string)
            .filter(|c| !c.trim().is_empty()),
        credit: field(node, "field_image_credit").map(str::to_string),
        link: None,
    })
}

/// Map a Drupal node entity to an [`Item`].
pub fn node_item(node: &Value, url: &str, args: &Args, site: &SiteConfig, settings: &Settings) -> Item {
    let id = field(node, "uuid").unwrap_or(url);
    let mut item = Item::new(id, url);

    item.title = field(node, "title").map(strip_html).filter(|t| !t.is_empty());
    let tz = site.tz();
    match field(node, "created").and_then(|d| parse_date(d, tz)) {
        Some(dt) => item.set_published(dt),
        None => warn!(%url, "Drupal node has no created date"),
    }
    item.date_modified = field(node, "changed").and_then(|d| parse_date(d, tz));
    item.summary = node
        .pointer("/body/0/summary")
        .and_then(Value::as_str)
        .or_else(|| field(node, "field_summary"))
        .or_else(|| field(node, "field_subtitle"))
        .map(strip_html)
        .filter(|s| !s.is_empty());

    let mut authors = names_at(node, &["field_authors", "field_author", "field_byline"]);
    if authors.is_empty() {
        authors.extend(site.author.clone());
    }
    item.set_authors(authors);
    item.set_tags(names_at(node, &["field_tags", "field_category", "field_section"]));

    let mut body = field(node, "body")
        .map(|html| format_content(html, settings))
        .unwrap_or_default();
    if let Some(paragraphs) = node.get("field_paragraphs") {
        let blocks = to_blocks(paragraphs);
        let mut rctx = RenderContext::new(url, &settings.server);
        let rendered = blocks::render_document(&blocks, &mut rctx);
        body.push_str(&format_content(&rendered, settings));
    }

    let lede = lede(node);
    item.image = lede.as_ref().map(|l| l.url.clone());

    let mut content = String::new();
    if args.add_subtitle {
        if let Some(subtitle) = field(node, "field_subtitle") {
            content.push_str(&format!("<p><strong>{}</strong></p>", esc(&strip_html(subtitle))));
        }
    }
    if let Some(lede) = &lede {
        if args.nolead {
            debug!("Lede image disabled");
        } else if (starts_with_image(&body) || body.contains(&lede.url)) && !args.add_lede_img {
            debug!("Body already shows the lede image");
        } else {
            content.push_str(&lede_figure(lede, args));
        }
    }
    content.push_str(&body);
    if !content.is_empty() {
        item.content_html = Some(content);
    }
    item
}

#[instrument(level = "info", skip_all, fields(%url))]
pub async fn get_content<F: Fetch, R: SiteRegistry>(
    url: &str,
    args: &Args,
    site: &mut SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Item> {
    let api_url = json_url(url)?;
    let node = get_url_json(ctx.fetcher, &api_url, &FetchOptions::default()).await?;
    if !node.is_object() {
        warn!("Drupal response is not an entity");
        return None;
    }
    ctx.debug_json("debug.json", &node).await;
    Some(node_item(&node, url, args, site, ctx.settings))
}

#[instrument(level = "info", skip_all, fields(%url))]
pub async fn get_feed<F: Fetch, R: SiteRegistry>(
    url: &str,
    args: &Args,
    site: &mut SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Feed> {
    let links = index_links(url, site, ctx).await?;
    let mut feed = Feed::new();
    feed.title = site.title.clone();
    feed.home_page_url = Some(url.to_string());
    Some(collect_feed(links, args, feed, async |link: String| get_content(&link, args, site, ctx).await).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryRegistry, StaticFetcher, context, test_settings};
    use serde_json::json;

    fn node(uuid: &str, created: &str) -> Value {
        json!({
            "uuid": [{"value": uuid}],
            "title": [{"value": format!("Node {uuid}")}],
            "created": [{"value": created}],
            "body": [{"processed": "<p>Body</p><script>track()</script>", "summary": "Short"}],
            "field_image": [{"url": "https://x.test/lede.jpg", "alt": "Alt text"}],
            "field_paragraphs": [
                {"type": "paragraph--pull_quote", "field_quote": "Quoted", "field_attribution": "Di"}
            ]
        })
    }

    #[test]
    fn test_json_url() {
        assert_eq!(json_url("https://x.test/news/a").as_deref(), Some("https://x.test/news/a?_format=json"));
        assert_eq!(json_url("https://x.test/a?x=1#c").as_deref(), Some("https://x.test/a?x=1&_format=json"));
    }

    #[test]
    fn test_node_item() {
        let settings = test_settings();
        let item = node_item(&node("u1", "2024-01-01T00:00:00+00:00"), "https://x.test/a", &Args::default(), &SiteConfig::new("drupal"), &settings);
        assert_eq!(item.id, "u1");
        assert_eq!(item.summary.as_deref(), Some("Short"));
        assert_eq!(item.timestamp, Some(1704067200.0));
        let content = item.content_html.unwrap();
        assert!(content.starts_with("<figure"));
        assert!(content.contains("Alt text"));
        assert!(content.contains("<p>Body</p>"));
        assert!(!content.contains("track()"));
        assert!(content.contains(r#"data-fh="pullquote""#));
    }

    #[tokio::test]
    async fn test_feed_from_index_page() {
        let index = r#"<main>
            <h2><a href="/news/a">A</a></h2>
            <h2><a href="/news/b">B</a></h2>
            <h2><a href="https://elsewhere.test/c">C</a></h2>
        </main>"#;
        let fetcher = StaticFetcher::new()
            .route("https://x.test/news", index)
            .json("https://x.test/news/a?_format=json", node("a", "2024-01-01T00:00:00+00:00"))
            .json("https://x.test/news/b?_format=json", node("b", "1706745600"));
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);

        let feed = get_feed("https://x.test/news", &Args::default(), &mut SiteConfig::new("drupal"), &ctx)
            .await
            .unwrap();
        let ids: Vec<&str> = feed.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(fetcher.requested("https://elsewhere.test/c?_format=json"), 0);
    }
}
