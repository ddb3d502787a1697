//! WordPress REST API handler.
//!
//! Posts come from `<origin><wpjson_path>/posts`. A post carries most of
//! what an [`Item`] needs directly; authors, tags and the lead image are
//! resolved through a chain of sources (Yoast SEO head, Parse.ly metadata,
//! plugin fields) before falling back to HAL `_links`, which cost one
//! request per link.

use super::{Context, scrape_page};
use super::wp_content::format_content;
use crate::blocks::str_at;
use crate::config::Args;
use crate::feed::collect_feed;
use crate::fetch::{Fetch, FetchOptions, get_url_json};
use crate::html::snippets::add_image;
use crate::models::{Feed, Item};
use crate::sites::{SiteConfig, SiteRegistry};
use crate::utils::{clean_url, closest_dict, origin, parse_date, strip_html};
use htmlescape::encode_minimal as esc;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

const DEFAULT_WPJSON_PATH: &str = "/wp-json/wp/v2";
const LEDE_WIDTH: i64 = 1200;

/// `<origin><wpjson_path>`, without a trailing slash.
fn api_base(url: &str, site: &SiteConfig) -> Option<String> {
    let origin = origin(url)?;
    let path = site.wpjson_path.as_deref().unwrap_or(DEFAULT_WPJSON_PATH);
    Some(format!("{}/{}", origin, path.trim_matches('/')))
}

fn posts_path(site: &SiteConfig) -> &str {
    site.posts_path.as_deref().map(|p| p.trim_matches('/')).unwrap_or("posts")
}

/// Last meaningful path segment of an article URL.
fn slug_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(segment.trim_end_matches(".html").to_string())
}

/// Strings from a value that may be a string, a comma list or an array.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s.split(',').map(|s| s.trim().to_string()).collect(),
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(|v| v.as_str().or_else(|| v.get("name").and_then(Value::as_str)))
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn yoast_graph(post: &Value) -> &[Value] {
    post.pointer("/yoast_head_json/schema/@graph")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn has_type(node: &Value, kind: &str) -> bool {
    match node.get("@type") {
        Some(Value::String(t)) => t == kind,
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some(kind)),
        _ => false,
    }
}

/// Fetch every `href` of a HAL link list and collect the `name` fields.
async fn hal_names<F: Fetch, R>(links: &[Value], ctx: &Context<'_, F, R>) -> Vec<String> {
    let mut names = Vec::new();
    for link in links {
        let Some(href) = link.get("href").and_then(Value::as_str) else {
            continue;
        };
        let Some(json) = get_url_json(ctx.fetcher, href, &FetchOptions::default()).await else {
            continue;
        };
        match &json {
            Value::Array(_) => names.extend(string_list(Some(&json))),
            other => names.extend(other.get("name").and_then(Value::as_str).map(str::to_string)),
        }
    }
    names
}

async fn get_authors<F: Fetch, R>(post: &Value, ctx: &Context<'_, F, R>) -> Vec<String> {
    let people: Vec<String> = yoast_graph(post)
        .iter()
        .filter(|node| has_type(node, "Person"))
        .filter_map(|node| node.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    if !people.is_empty() {
        return people;
    }
    if let Some(written_by) = post.pointer("/yoast_head_json/twitter_misc/Written by").and_then(Value::as_str) {
        return vec![written_by.to_string()];
    }

    for pointer in ["/parsely/meta/creator", "/parsely/meta/author"] {
        let names = string_list(post.pointer(pointer));
        if !names.is_empty() {
            return names;
        }
    }

    if let Some(list) = post.get("authors").and_then(Value::as_array) {
        let names: Vec<String> = list
            .iter()
            .filter_map(|a| {
                a.get("display_name")
                    .or_else(|| a.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect();
        if !names.is_empty() {
            return names;
        }
    }

    let embedded = string_list(post.pointer("/_embedded/author"));
    if !embedded.is_empty() {
        return embedded;
    }
    if let Some(links) = post.pointer("/_links/author").and_then(Value::as_array) {
        return hal_names(links, ctx).await;
    }
    Vec::new()
}

async fn get_tags<F: Fetch, R>(post: &Value, ctx: &Context<'_, F, R>) -> Vec<String> {
    let mut tags = Vec::new();
    for node in yoast_graph(post).iter().filter(|n| has_type(n, "Article") || has_type(n, "NewsArticle")) {
        tags.extend(string_list(node.get("keywords")));
        tags.extend(string_list(node.get("articleSection")));
    }
    if !tags.is_empty() {
        return tags;
    }

    tags = string_list(post.pointer("/parsely/meta/keywords"));
    if !tags.is_empty() {
        return tags;
    }

    if let Some(groups) = post.pointer("/_embedded/wp:term").and_then(Value::as_array) {
        for group in groups {
            tags.extend(string_list(Some(group)));
        }
        if !tags.is_empty() {
            return tags;
        }
    }
    if let Some(links) = post.pointer("/_links/wp:term").and_then(Value::as_array) {
        let links: Vec<Value> = links
            .iter()
            .filter(|l| matches!(l.get("taxonomy").and_then(Value::as_str), Some("category" | "post_tag") | None))
            .cloned()
            .collect();
        tags = hal_names(&links, ctx).await;
    }
    tags
}

/// A lead image and its caption.
#[derive(Debug, Default, PartialEq)]
struct Lede {
    url: String,
    caption: Option<String>,
}

/// Image URL and caption of a `wp/v2/media` object.
fn media_lede(media: &Value) -> Option<Lede> {
    let sizes: Vec<Value> = media
        .pointer("/media_details/sizes")
        .and_then(Value::as_object)
        .map(|sizes| sizes.values().cloned().collect())
        .unwrap_or_default();
    let url = closest_dict(&sizes, "width", LEDE_WIDTH)
        .and_then(|s| s.get("source_url"))
        .or_else(|| media.get("source_url"))
        .and_then(Value::as_str)?;

    let parts: Vec<String> = ["caption/rendered", "description/rendered"]
        .iter()
        .filter_map(|p| str_at(media, p))
        .map(strip_html)
        .filter(|s| !s.is_empty())
        .fold(Vec::new(), |mut acc, s| {
            if !acc.contains(&s) {
                acc.push(s);
            }
            acc
        });
    Some(Lede {
        url: url.to_string(),
        caption: if parts.is_empty() { None } else { Some(parts.join(" | ")) },
    })
}

async fn get_lede<F: Fetch, R>(post: &Value, ctx: &Context<'_, F, R>) -> Option<Lede> {
    if let Some(url) = str_at(post, "yoast_head_json/og_image/0/url") {
        return Some(Lede {
            url: url.to_string(),
            caption: None,
        });
    }
    if let Some(node) = yoast_graph(post).iter().find(|n| has_type(n, "ImageObject")) {
        if let Some(url) = node.get("contentUrl").or_else(|| node.get("url")).and_then(Value::as_str) {
            return Some(Lede {
                url: url.to_string(),
                caption: node.get("caption").and_then(Value::as_str).map(strip_html).filter(|c| !c.is_empty()),
            });
        }
    }

    if let Some(lede) = post.pointer("/_embedded/wp:featuredmedia/0").and_then(media_lede) {
        return Some(lede);
    }
    if let Some(href) = str_at(post, "_links/wp:featuredmedia/0/href") {
        if let Some(lede) = get_url_json(ctx.fetcher, href, &FetchOptions::default())
            .await
            .as_ref()
            .and_then(media_lede)
        {
            return Some(lede);
        }
    }

    ["jetpack_featured_media_url", "acf/image", "acf/image/url", "acf/featured_image", "acf/featured_image/url"]
        .iter()
        .find_map(|p| str_at(post, p))
        .map(|url| Lede {
            url: url.to_string(),
            caption: None,
        })
}

/// Whether the body already shows the image, possibly as a resized variant.
fn image_in_body(body: &str, image: &str) -> bool {
    if body.contains(&clean_url(image)) {
        return true;
    }
    let Some(file) = Url::parse(image).ok().and_then(|u| u.path_segments()?.last().map(str::to_string)) else {
        return false;
    };
    let stem = file.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(&file);
    !stem.is_empty() && (body.contains(&format!("/{stem}.")) || body.contains(&format!("/{stem}-")))
}

fn subtitle(post: &Value, args: &Args) -> Option<String> {
    let meta = ["meta/subtitle", "meta/dek", "acf/subtitle", "acf/dek", "subtitle"]
        .iter()
        .find_map(|p| str_at(post, p))
        .map(strip_html);
    match meta {
        Some(s) if !s.is_empty() => Some(s),
        _ if args.add_subtitle => str_at(post, "excerpt/rendered").map(strip_html).filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// Normalize one WordPress post object into an [`Item`].
#[instrument(level = "debug", skip_all)]
pub async fn get_post_item<F: Fetch, R: SiteRegistry>(
    post: &Value,
    args: &Args,
    site: &SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Item> {
    let Some(link) = post.get("link").and_then(Value::as_str) else {
        warn!(id = ?post.get("id"), "WordPress post has no link");
        return None;
    };
    let id = str_at(post, "guid/rendered").map(str::to_string).or_else(|| match post.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    });
    let mut item = Item::new(id.unwrap_or_else(|| link.to_string()), link);

    item.title = str_at(post, "title/rendered").map(strip_html).filter(|t| !t.is_empty());

    let tz = site.tz();
    let published = post
        .get("date_gmt")
        .and_then(Value::as_str)
        .and_then(|d| parse_date(d, None))
        .or_else(|| post.get("date").and_then(Value::as_str).and_then(|d| parse_date(d, tz)));
    match published {
        Some(dt) => item.set_published(dt),
        None => warn!(url = %link, "WordPress post has no usable date"),
    }
    item.date_modified = post
        .get("modified_gmt")
        .and_then(Value::as_str)
        .and_then(|d| parse_date(d, None))
        .or_else(|| post.get("modified").and_then(Value::as_str).and_then(|d| parse_date(d, tz)));

    item.summary = str_at(post, "excerpt/rendered")
        .or_else(|| str_at(post, "yoast_head_json/description"))
        .map(strip_html)
        .filter(|s| !s.is_empty());

    let mut authors = get_authors(post, ctx).await;
    item.set_tags(get_tags(post, ctx).await);
    let mut lede = get_lede(post, ctx).await;

    if authors.is_empty() || lede.is_none() {
        if let Some(page) = scrape_page(link, site, ctx).await {
            if authors.is_empty() {
                authors = page.authors;
            }
            if lede.is_none() {
                lede = page.lede.map(|url| Lede { url, caption: None });
            }
        }
    }
    if authors.is_empty() {
        authors.extend(site.author.clone());
    }
    item.set_authors(authors);

    item.image = lede.as_ref().map(|l| l.url.clone());

    let body = str_at(post, "content/rendered")
        .map(|html| format_content(html, ctx.settings))
        .unwrap_or_default();
    let mut content = String::new();
    if let Some(subtitle) = subtitle(post, args) {
        content.push_str(&format!("<p><strong>{}</strong></p>", esc(&subtitle)));
    }
    if let Some(lede) = &lede {
        if args.nolead {
            debug!("Lede image disabled");
        } else if image_in_body(&body, &lede.url) {
            debug!(image = %lede.url, "Lede image already in body");
        } else {
            let caption = if args.no_lede_caption { None } else { lede.caption.as_deref().map(esc) };
            content.push_str(&add_image(&lede.url, caption.as_deref(), None));
        }
    }
    content.push_str(&body);
    if !content.is_empty() {
        item.content_html = Some(content);
    }

    Some(item)
}

#[instrument(level = "info", skip_all, fields(%url))]
pub async fn get_content<F: Fetch, R: SiteRegistry>(
    url: &str,
    args: &Args,
    site: &mut SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Item> {
    let api = api_base(url, site)?;
    let parsed = Url::parse(url).ok()?;
    let post_id = parsed.query_pairs().find(|(k, _)| k == "p").map(|(_, v)| v.into_owned());

    let post = match post_id {
        Some(id) => {
            let api_url = format!("{}/{}/{}", api, posts_path(site), urlencoding::encode(&id));
            get_url_json(ctx.fetcher, &api_url, &FetchOptions::default()).await?
        }
        None => {
            let slug = slug_from_url(&parsed)?;
            let api_url = format!("{}/{}?slug={}", api, posts_path(site), urlencoding::encode(&slug));
            let posts = get_url_json(ctx.fetcher, &api_url, &FetchOptions::default()).await?;
            match posts.as_array().and_then(|list| list.first()) {
                Some(post) => post.clone(),
                None => {
                    warn!(%slug, "No WordPress post for slug");
                    return None;
                }
            }
        }
    };
    ctx.debug_json("debug.json", &post).await;
    get_post_item(&post, args, site, ctx).await
}

/// `categories=<id>`-style filter for category, tag and author archive URLs.
async fn archive_filter<F: Fetch, R>(url: &Url, api: &str, ctx: &Context<'_, F, R>) -> Option<(&'static str, i64)> {
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
    let (collection, param) = match segments.first().copied()? {
        "category" => ("categories", "categories"),
        "tag" => ("tags", "tags"),
        "author" => ("users", "author"),
        _ => return None,
    };
    let slug = segments.last()?;
    let lookup = format!("{}/{}?slug={}", api, collection, urlencoding::encode(slug));
    let json = get_url_json(ctx.fetcher, &lookup, &FetchOptions::default()).await?;
    let id = json.pointer("/0/id").and_then(Value::as_i64);
    if id.is_none() {
        warn!(%slug, collection, "Archive slug not found");
    }
    Some((param, id?))
}

#[instrument(level = "info", skip_all, fields(%url))]
pub async fn get_feed<F: Fetch, R: SiteRegistry>(
    url: &str,
    args: &Args,
    site: &mut SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Feed> {
    let site = &*site;
    let api = api_base(url, site)?;
    let parsed = Url::parse(url).ok()?;

    let per_page = args.max.unwrap_or(20).clamp(1, 100);
    let mut api_url = format!("{}/{}?per_page={}", api, posts_path(site), per_page);
    if let Some((param, id)) = archive_filter(&parsed, &api, ctx).await {
        api_url.push_str(&format!("&{param}={id}"));
    }

    let posts = get_url_json(ctx.fetcher, &api_url, &FetchOptions::default()).await?;
    ctx.debug_json("feed.json", &posts).await;
    let Some(posts) = posts.as_array() else {
        warn!(%api_url, "WordPress posts listing is not an array");
        return None;
    };

    let mut feed = Feed::new();
    feed.title = site.title.clone();
    feed.home_page_url = Some(url.to_string());
    Some(collect_feed(posts, args, feed, async |post| get_post_item(post, args, site, ctx).await).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::wp_content::format_content;
    use crate::test_utils::{MemoryRegistry, StaticFetcher, context, test_settings};
    use serde_json::json;

    fn hello_post() -> Value {
        json!({
            "id": "42",
            "guid": {"rendered": "https://x.test/?p=42"},
            "link": "https://x.test/article",
            "title": {"rendered": "Hello &amp; World"},
            "date_gmt": "2024-01-01T00:00:00",
            "modified_gmt": "2024-01-02T00:00:00"
        })
    }

    #[tokio::test]
    async fn test_minimal_post_end_to_end() {
        let fetcher = StaticFetcher::new();
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);
        let site = SiteConfig::new("wp_posts");

        let item = get_post_item(&hello_post(), &Args::default(), &site, &ctx).await.unwrap();
        assert_eq!(item.title.as_deref(), Some("Hello & World"));
        assert_eq!(item.id, "https://x.test/?p=42");
        assert_eq!(item.url, "https://x.test/article");
        assert_eq!(item.timestamp, Some(1704067200.0));
        assert_eq!(item.date_modified.unwrap().timestamp(), 1704153600);
        assert!(item.tags().is_none());
        assert!(item.author.is_none());
        assert!(fetcher.requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_hal_links_and_lede() {
        let fetcher = StaticFetcher::new()
            .json("https://x.test/wp-json/wp/v2/users/3", json!({"name": "Ada"}))
            .json("https://x.test/wp-json/wp/v2/users/4", json!({"name": "Grace"}))
            .json(
                "https://x.test/wp-json/wp/v2/categories?post=42",
                json!([{"name": "News"}, {"name": "news"}]),
            )
            .json("https://x.test/wp-json/wp/v2/tags?post=42", json!([{"name": "Rust"}]))
            .json(
                "https://x.test/wp-json/wp/v2/media/9",
                json!({
                    "source_url": "https://x.test/full.jpg",
                    "caption": {"rendered": "<p>A harbor</p>"},
                    "description": {"rendered": "<p>Photo: Someone</p>"},
                    "media_details": {"sizes": {
                        "medium": {"width": 300, "source_url": "https://x.test/m.jpg"},
                        "large": {"width": 1024, "source_url": "https://x.test/l.jpg"}
                    }}
                }),
            );
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);

        let mut post = hello_post();
        post["_links"] = json!({
            "author": [
                {"href": "https://x.test/wp-json/wp/v2/users/3"},
                {"href": "https://x.test/wp-json/wp/v2/users/4"}
            ],
            "wp:term": [
                {"taxonomy": "category", "href": "https://x.test/wp-json/wp/v2/categories?post=42"},
                {"taxonomy": "post_tag", "href": "https://x.test/wp-json/wp/v2/tags?post=42"}
            ],
            "wp:featuredmedia": [{"href": "https://x.test/wp-json/wp/v2/media/9"}]
        });
        post["content"] = json!({"rendered": "<p>Body</p>"});

        let item = get_post_item(&post, &Args::default(), &SiteConfig::new("wp_posts"), &ctx)
            .await
            .unwrap();
        assert_eq!(item.author.as_ref().unwrap().name, "Ada and Grace");
        assert_eq!(item.tags().unwrap(), ["News", "Rust"]);
        assert_eq!(item.image.as_deref(), Some("https://x.test/l.jpg"));
        let content = item.content_html.unwrap();
        assert!(content.contains("A harbor | Photo: Someone"));
        assert!(content.ends_with("<p>Body</p>"));
    }

    #[tokio::test]
    async fn test_yoast_sources_win_and_lede_skipped_when_in_body() {
        let fetcher = StaticFetcher::new();
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);

        let mut post = hello_post();
        post["yoast_head_json"] = json!({
            "og_image": [{"url": "https://x.test/uploads/photo.jpg"}],
            "schema": {"@graph": [
                {"@type": ["Article"], "keywords": ["Ports", "Trade"], "articleSection": "Business"},
                {"@type": "Person", "name": "Ada"}
            ]}
        });
        post["_links"] = json!({"author": [{"href": "https://x.test/never-fetched"}]});
        post["content"] = json!({"rendered": r#"<figure class="wp-block-image"><img src="https://x.test/uploads/photo-1024x683.jpg"></figure>"#});

        let item = get_post_item(&post, &Args::default(), &SiteConfig::new("wp_posts"), &ctx)
            .await
            .unwrap();
        assert_eq!(item.author.as_ref().unwrap().name, "Ada");
        assert_eq!(item.tags().unwrap(), ["Ports", "Trade", "Business"]);
        assert_eq!(item.content_html.unwrap().matches("<figure").count(), 1);
        assert!(fetcher.requests.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_site_timezone_and_default_author() {
        let fetcher = StaticFetcher::new();
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);
        let mut site = SiteConfig::new("wp_posts");
        site.timezone = Some("-05:00".into());
        site.author = Some("Staff".into());

        let post = json!({"id": 7, "link": "https://x.test/b", "date": "2024-01-01T00:00:00"});
        let item = get_post_item(&post, &Args::default(), &site, &ctx).await.unwrap();
        assert_eq!(item.id, "7");
        assert_eq!(item.timestamp, Some(1704085200.0));
        assert_eq!(item.author.unwrap().name, "Staff");
    }

    #[tokio::test]
    async fn test_page_selectors_fill_missing_author_and_lede() {
        let page = r#"<html><body>
            <span class="byline"><a>Ada  Lovelace</a></span>
            <div class="hero"><img srcset="/img/s.jpg 400w, /img/l.jpg 1200w" src="/img/s.jpg"></div>
        </body></html>"#;
        let fetcher = StaticFetcher::new().route("https://x.test/article", page);
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);
        let mut site = SiteConfig::new("wp_posts");
        site.author = Some("Staff".into());
        site.author_selector = Some(".byline".into());
        site.lede_selector = Some(".hero".into());

        let item = get_post_item(&hello_post(), &Args::default(), &site, &ctx).await.unwrap();
        assert_eq!(item.author.unwrap().name, "Ada Lovelace");
        assert_eq!(item.image.as_deref(), Some("https://x.test/img/l.jpg"));
        assert!(item.content_html.unwrap().contains("https://x.test/img/l.jpg"));
    }

    #[tokio::test]
    async fn test_finished_content_is_stable_under_cleanup() {
        let fetcher = StaticFetcher::new();
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);

        let mut post = hello_post();
        post["meta"] = json!({"subtitle": "Ships & \"harbors\""});
        post["_embedded"] = json!({"wp:featuredmedia": [{
            "source_url": "https://x.test/full.jpg?w=1&h=2",
            "caption": {"rendered": "<p>Dock at dawn</p>"},
            "description": {"rendered": "<p>Photo: Bo's</p>"}
        }]});
        post["content"] = json!({"rendered": r#"
            <p>Intro</p>
            <figure class="wp-block-image"><img src="https://x.test/b.jpg" alt="B"><figcaption>Second</figcaption></figure>
            <figure class="wp-block-embed"><iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ"></iframe></figure>
            <figure class="wp-block-pullquote"><blockquote><p>Quote</p><cite>Ann</cite></blockquote></figure>
            <script>track()</script>
            <video src="https://x.test/v.mp4" poster="https://x.test/p.jpg"></video>
        "#});

        let item = get_post_item(&post, &Args::default(), &SiteConfig::new("wp_posts"), &ctx).await.unwrap();
        let content = item.content_html.unwrap();
        assert!(content.starts_with("<p><strong>Ships &amp; &quot;harbors&quot;</strong></p><figure"));
        assert!(content.contains("Dock at dawn | Photo: Bo"));
        assert_eq!(content.matches("data-fh=").count(), 5);
        assert_eq!(format_content(&content, &settings), content);
    }

    #[tokio::test]
    async fn test_get_content_by_slug_and_id() {
        let fetcher = StaticFetcher::new()
            .json("https://x.test/wp-json/wp/v2/posts?slug=article", json!([hello_post()]))
            .json("https://x.test/api/posts/42", hello_post());
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);

        let mut site = SiteConfig::new("wp_posts");
        let item = get_content("https://x.test/article/", &Args::default(), &mut site, &ctx).await.unwrap();
        assert_eq!(item.id, "https://x.test/?p=42");

        site.wpjson_path = Some("/api/".into());
        let item = get_content("https://x.test/?p=42", &Args::default(), &mut site, &ctx).await.unwrap();
        assert_eq!(item.url, "https://x.test/article");

        assert!(get_content("https://x.test/missing", &Args::default(), &mut site, &ctx).await.is_none());
    }

    #[tokio::test]
    async fn test_get_feed_for_category_archive() {
        let mut older = hello_post();
        older["link"] = json!("https://x.test/older");
        older["guid"] = json!({"rendered": "https://x.test/?p=41"});
        older["date_gmt"] = json!("2023-12-31T00:00:00");
        let fetcher = StaticFetcher::new()
            .json("https://x.test/wp-json/wp/v2/categories?slug=world", json!([{"id": 5}]))
            .json(
                "https://x.test/wp-json/wp/v2/posts?per_page=2&categories=5",
                json!([older, {"title": {"rendered": "no link"}}, hello_post()]),
            );
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);
        let args = Args {
            max: Some(2),
            ..Args::default()
        };

        let mut site = SiteConfig::new("wp_posts");
        let feed = get_feed("https://x.test/category/world/", &args, &mut site, &ctx).await.unwrap();
        let ids: Vec<&str> = feed.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["https://x.test/?p=42", "https://x.test/?p=41"]);
    }
}
