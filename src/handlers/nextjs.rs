//! Generic Next.js handler.
//!
//! Works off `pageProps` from [`get_next_data`]. Headless-CMS front ends
//! put the story under one of a handful of keys (`post`, `article`,
//! `story`, ...) with similar field names; this module reads the common
//! ones. Bodies may be HTML strings or block arrays (Portable Text or
//! ANS-style `{type, ...}` elements).
//!
//! Lede handling:
//! - default: add the lede unless `nolead` or the body already opens with
//!   an image
//! - `addledeimage`: always add it
//! - `removeimage`: never add it, and drop a leading image from the body

use super::wp_content::format_content;
use super::{Context, date_at, first_str, index_links, lede_figure, names_at, starts_with_image};
use crate::blocks::portable::PortableOptions;
use crate::blocks::{self, Block, ImageBlock, RenderContext};
use crate::config::{Args, Settings};
use crate::feed::collect_feed;
use crate::fetch::Fetch;
use crate::models::{Feed, Item};
use crate::next_data::get_next_data;
use crate::sites::{SiteConfig, SiteRegistry};
use crate::utils::strip_html;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

const ARTICLE_PATHS: &[&str] = &["post", "article", "story", "data/post", "data/article", "content", "page"];
const LIST_PATHS: &[&str] = &[
    "posts",
    "articles",
    "stories",
    "items",
    "latestArticles",
    "data/posts",
    "data/articles",
    "feed",
];
const BODY_PATHS: &[&str] = &["content", "body", "html", "contentHtml", "content/rendered", "body/html", "blocks"];
const IMAGE_PATHS: &[&str] = &["image", "featuredImage", "leadImage", "mainImage", "heroImage", "thumbnail"];

fn at<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    value.pointer(&format!("/{path}")).filter(|v| !v.is_null())
}

/// The story object inside `pageProps`.
pub fn find_article(page_props: &Value) -> Option<&Value> {
    ARTICLE_PATHS
        .iter()
        .filter_map(|p| at(page_props, p))
        .find(|v| v.is_object())
}

fn resolve(base: &str, link: &str) -> Option<String> {
    Url::parse(base).ok()?.join(link).ok().map(String::from)
}

fn article_id(article: &Value) -> Option<String> {
    ["id", "_id", "uuid", "slug"].iter().find_map(|k| match at(article, k)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(o) => o.get("current").and_then(Value::as_str).map(str::to_string),
        _ => None,
    })
}

fn lede_image(article: &Value) -> Option<ImageBlock> {
    IMAGE_PATHS.iter().filter_map(|p| at(article, p)).find_map(|image| match image {
        Value::String(url) if !url.is_empty() => Some(ImageBlock::new(url.clone())),
        Value::Object(_) => {
            let url = first_str(image, &["url", "src", "sourceUrl", "source_url", "node/sourceUrl", "asset/url"])?;
            Some(ImageBlock {
                url: url.to_string(),
                caption: first_str(image, &["caption", "node/caption"]).map(strip_html).filter(|c| !c.is_empty()),
                credit: first_str(image, &["credit", "node/credit"]).map(str::to_string),
                link: None,
            })
        }
        _ => None,
    })
}

/// Render a body value: HTML string, or a block array in either dialect.
fn render_body(body: &Value, url: &str, settings: &Settings) -> String {
    match body {
        Value::String(html) => format_content(html, settings),
        Value::Array(list) => {
            let blocks: Vec<Block> = if list.iter().any(|b| b.get("_type").is_some()) {
                blocks::portable::to_blocks(body, &PortableOptions::default())
            } else {
                blocks::fusion::to_blocks(body)
            };
            let mut rctx = RenderContext::new(url, &settings.server);
            blocks::render_document(&blocks, &mut rctx)
        }
        _ => {
            warn!(%url, "Unrecognized body shape");
            String::new()
        }
    }
}

/// Drop an image that opens the body.
fn strip_leading_image(html: &str) -> String {
    let trimmed = html.trim_start();
    if !starts_with_image(trimmed) {
        return html.to_string();
    }
    let end = if trimmed.starts_with("<figure") {
        trimmed.find("</figure>").map(|i| i + "</figure>".len())
    } else if trimmed.starts_with("<img") {
        trimmed.find('>').map(|i| i + 1)
    } else {
        trimmed.find("</p>").map(|i| i + "</p>".len())
    };
    match end {
        Some(end) => trimmed[end..].to_string(),
        None => html.to_string(),
    }
}

/// Map a generic article object to an [`Item`].
pub fn article_item(article: &Value, page_url: &str, args: &Args, site: &SiteConfig, settings: &Settings) -> Item {
    let url = first_str(article, &["url", "link", "canonicalUrl", "canonical_url"])
        .and_then(|u| resolve(page_url, u))
        .unwrap_or_else(|| page_url.to_string());
    let mut item = Item::new(article_id(article).unwrap_or_else(|| url.clone()), url);

    item.title = first_str(article, &["title", "headline", "title/rendered", "seo/title"])
        .map(strip_html)
        .filter(|t| !t.is_empty());
    let tz = site.tz();
    match date_at(
        article,
        &["publishedAt", "datePublished", "published_at", "firstPublishedAt", "date", "createdAt"],
        tz,
    ) {
        Some(dt) => item.set_published(dt),
        None => warn!(url = %item.url, "Article has no publish date"),
    }
    item.date_modified = date_at(article, &["updatedAt", "dateModified", "modified", "updated_at", "lastModified"], tz);
    item.summary = first_str(article, &["description", "excerpt", "dek", "subtitle", "summary", "subheadline"])
        .map(strip_html)
        .filter(|s| !s.is_empty());

    let mut authors = names_at(article, &["authors", "author", "byline", "contributors"]);
    if authors.is_empty() {
        authors.extend(site.author.clone());
    }
    item.set_authors(authors);
    item.set_tags(names_at(article, &["tags", "categories", "keywords", "topics"]));

    let lede = lede_image(article);
    item.image = lede.as_ref().map(|l| l.url.clone());

    let mut body = BODY_PATHS
        .iter()
        .filter_map(|p| at(article, p))
        .map(|b| render_body(b, &item.url, settings))
        .find(|html| !html.is_empty())
        .unwrap_or_default();
    if args.removeimage {
        body = strip_leading_image(&body);
    }

    let mut content = String::new();
    if let Some(lede) = &lede {
        let add = if args.removeimage {
            false
        } else if args.addledeimage {
            true
        } else {
            !args.nolead && !starts_with_image(&body) && !body.contains(&lede.url)
        };
        if add {
            content.push_str(&lede_figure(lede, args));
        } else {
            debug!(image = %lede.url, "Skipping lede image");
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
    let props = get_next_data(url, site, ctx).await?;
    let Some(article) = props.get("pageProps").and_then(find_article) else {
        warn!("No article in pageProps");
        return None;
    };
    ctx.debug_json("debug.json", article).await;
    Some(article_item(article, url, args, site, ctx.settings))
}

/// Article URLs from a listing page's `pageProps`.
pub(crate) fn listing_links(page_props: &Value, base: &str) -> Vec<String> {
    let Some(entries) = LIST_PATHS
        .iter()
        .filter_map(|p| at(page_props, p))
        .find_map(Value::as_array)
    else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let entry = entry.get("node").unwrap_or(entry);
            let link = first_str(entry, &["url", "link", "href", "canonicalUrl", "path", "uri", "slug/current", "slug"])?;
            resolve(base, link)
        })
        .collect()
}

#[instrument(level = "info", skip_all, fields(%url))]
pub async fn get_feed<F: Fetch, R: SiteRegistry>(
    url: &str,
    args: &Args,
    site: &mut SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Feed> {
    let mut links = match get_next_data(url, site, ctx).await {
        Some(props) => {
            ctx.debug_json("feed.json", &props).await;
            props.get("pageProps").map(|p| listing_links(p, url)).unwrap_or_default()
        }
        None => Vec::new(),
    };
    if links.is_empty() {
        debug!("No listing in pageProps; scraping index page");
        links = index_links(url, site, ctx).await?;
    }

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

    fn story(body: &str) -> Value {
        json!({"pageProps": {"post": {
            "id": 5,
            "title": "Tide &amp; Time",
            "publishedAt": "2024-01-01T00:00:00Z",
            "authors": [{"name": "A"}, {"name": "B"}],
            "tags": ["x", "X", "y"],
            "image": {"url": "https://x.test/lede.jpg", "caption": "Cap"},
            "content": body
        }}})
    }

    fn site() -> SiteConfig {
        let mut site = SiteConfig::new("nextjs");
        site.build_id = Some("cur".into());
        site
    }

    #[tokio::test]
    async fn test_article_from_page_props() {
        let fetcher = StaticFetcher::new().json("https://x.test/_next/data/cur/s.json", story("<p>Body</p>"));
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);

        let item = get_content("https://x.test/s", &Args::default(), &mut site(), &ctx).await.unwrap();
        assert_eq!(item.id, "5");
        assert_eq!(item.title.as_deref(), Some("Tide & Time"));
        assert_eq!(item.author.as_ref().unwrap().name, "A and B");
        assert_eq!(item.tags().unwrap(), ["x", "y"]);
        assert_eq!(item.timestamp, Some(1704067200.0));
        let content = item.content_html.unwrap();
        assert!(content.starts_with("<figure"));
        assert!(content.contains("Cap"));
        assert!(content.ends_with("<p>Body</p>"));
    }

    #[test]
    fn test_lede_flags() {
        let settings = test_settings();
        let body = r#"<figure class="wp-block-image"><img src="https://x.test/inline.jpg"></figure><p>Body</p>"#;
        let props = story(body);
        let article = find_article(&props["pageProps"]).unwrap();
        let site = site();

        let item = article_item(article, "https://x.test/s", &Args::default(), &site, &settings);
        assert_eq!(item.content_html.unwrap().matches("<figure").count(), 1);

        let args = Args {
            addledeimage: true,
            ..Args::default()
        };
        let content = article_item(article, "https://x.test/s", &args, &site, &settings).content_html.unwrap();
        assert_eq!(content.matches("<figure").count(), 2);
        assert!(content.starts_with(r#"<figure data-fh="image""#));

        let args = Args {
            removeimage: true,
            ..Args::default()
        };
        let content = article_item(article, "https://x.test/s", &args, &site, &settings).content_html.unwrap();
        assert_eq!(content, "<p>Body</p>");
    }

    #[test]
    fn test_block_array_body() {
        let settings = test_settings();
        let props = json!({"pageProps": {"article": {
            "headline": "Blocks",
            "body": [
                {"type": "text", "content": "First"},
                {"type": "mystery_widget"}
            ]
        }}});
        let article = find_article(&props["pageProps"]).unwrap();
        let item = article_item(article, "https://x.test/b", &Args::default(), &SiteConfig::new("nextjs"), &settings);
        assert_eq!(item.id, "https://x.test/b");
        assert_eq!(item.content_html.as_deref(), Some("<p>First</p>"));
    }

    #[tokio::test]
    async fn test_feed_from_listing() {
        let mut newer = story("<p>New</p>");
        newer["pageProps"]["post"]["id"] = json!("new");
        newer["pageProps"]["post"]["publishedAt"] = json!("2024-02-01T00:00:00Z");
        let fetcher = StaticFetcher::new()
            .json(
                "https://x.test/_next/data/cur/news.json",
                json!({"pageProps": {"posts": [{"url": "/a"}, {"slug": "missing"}, {"node": {"uri": "/b"}}]}}),
            )
            .json("https://x.test/_next/data/cur/a.json", story("<p>Old</p>"))
            .json("https://x.test/_next/data/cur/b.json", newer);
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);

        let feed = get_feed("https://x.test/news", &Args::default(), &mut site(), &ctx).await.unwrap();
        let ids: Vec<&str> = feed.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["new", "5"]);
    }
}
