//! Semafor: Next.js pages backed by Sanity.
//!
//! The article lives at `pageProps.article` with Portable Text in
//! `semanticBody` (older stories use `body`). Image assets are references
//! like `image-<hash>-1200x800-jpg`, resolved against the site's Sanity CDN
//! base (`image_base`, or `sanity_project` + `sanity_dataset` in the site
//! record).

use super::nextjs::listing_links;
use super::{Context, date_at, first_str, index_links, lede_figure, names_at};
use crate::blocks::portable::{self, PortableOptions};
use crate::blocks::{self, RenderContext};
use crate::config::{Args, Settings};
use crate::feed::collect_feed;
use crate::fetch::Fetch;
use crate::models::{Feed, Item};
use crate::next_data::get_next_data;
use crate::sites::{SiteConfig, SiteRegistry};
use crate::utils::strip_html;
use serde_json::Value;
use tracing::{debug, instrument, warn};

const SANITY_CDN: &str = "https://cdn.sanity.io/images";

fn extra<'a>(site: &'a SiteConfig, key: &str) -> Option<&'a str> {
    site.extra.get(key).and_then(Value::as_str)
}

/// Portable Text options for a site.
fn portable_options(site: &SiteConfig) -> PortableOptions {
    let image_base = extra(site, "image_base").map(str::to_string).or_else(|| {
        let project = extra(site, "sanity_project")?;
        let dataset = extra(site, "sanity_dataset").unwrap_or("production");
        Some(format!("{SANITY_CDN}/{project}/{dataset}"))
    });
    PortableOptions { image_base }
}

/// Plain text of a Portable Text array.
fn portable_text(value: &Value) -> Option<String> {
    let text = value
        .as_array()?
        .iter()
        .map(|node| strip_html(&portable::spans_to_html(node)))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() { None } else { Some(text) }
}

/// Map a Semafor article object to an [`Item`].
pub fn article_item(article: &Value, url: &str, args: &Args, site: &SiteConfig, settings: &Settings) -> Item {
    let opts = portable_options(site);
    let id = first_str(article, &["_id", "id"]).unwrap_or(url);
    let mut item = Item::new(id, url);

    item.title = first_str(article, &["headline", "title", "seo/title"])
        .map(strip_html)
        .filter(|t| !t.is_empty());
    let tz = site.tz();
    match date_at(article, &["publishedTimestamp", "publishedAt", "_createdAt"], tz) {
        Some(dt) => item.set_published(dt),
        None => warn!(%url, "Semafor article has no publish date"),
    }
    item.date_modified = date_at(article, &["updatedTimestamp", "updatedAt", "_updatedAt"], tz);

    let intro = article.get("intro").filter(|v| v.is_array());
    item.summary = first_str(article, &["description", "seo/description"])
        .map(str::to_string)
        .or_else(|| intro.and_then(portable_text));

    item.set_authors(names_at(article, &["authors", "author"]));
    let mut tags = names_at(article, &["vertical"]);
    tags.extend(names_at(article, &["tags", "topics"]));
    item.set_tags(tags);

    let body = ["semanticBody", "body", "content"]
        .iter()
        .find_map(|k| article.get(*k).filter(|v| v.is_array()))
        .map(|b| portable::to_blocks(b, &opts))
        .unwrap_or_default();
    let lede = ["ledePhoto", "mainImage", "image"]
        .iter()
        .filter_map(|k| article.get(*k))
        .find_map(|node| portable::image_block(node, &opts));
    item.image = lede.as_ref().map(|l| l.url.clone());

    let mut rctx = RenderContext::new(url, &settings.server);
    let mut content = String::new();
    if args.add_subtitle {
        if let Some(intro) = intro {
            content.push_str(&blocks::render(&portable::to_blocks(intro, &opts), &mut rctx));
        }
    }
    if let Some(lede) = &lede {
        if args.nolead {
            debug!("Lede image disabled");
        } else if blocks::first_is_image(&body) && !args.add_lede_img {
            debug!("Body opens with an image; skipping lede");
        } else {
            content.push_str(&lede_figure(lede, args));
        }
    }
    content.push_str(&blocks::render_document(&body, &mut rctx));
    if !rctx.unknown.is_empty() {
        debug!(unknown = ?rctx.unknown, "Unrendered Portable Text blocks");
    }
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
    let Some(article) = props
        .pointer("/pageProps/article")
        .or_else(|| props.pointer("/pageProps/post"))
        .filter(|a| a.is_object())
    else {
        warn!("No Semafor article in pageProps");
        return None;
    };
    ctx.debug_json("debug.json", article).await;
    Some(article_item(article, url, args, site, ctx.settings))
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
        links = index_links(url, site, ctx).await?;
    }

    let mut feed = Feed::new();
    feed.title = site.title.clone().or_else(|| Some("Semafor".to_string()));
    feed.home_page_url = Some(url.to_string());
    Some(collect_feed(links, args, feed, async |link: String| get_content(&link, args, site, ctx).await).await)
}
