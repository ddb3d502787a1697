//! Arc XP (Fusion) handler.
//!
//! Stories come from the Fusion content API:
//!
//! ```text
//! <origin>/pf/api/v3/content/fetch/<source>?query=<json>&d=<deployment>&_website=<site>
//! ```
//!
//! The deployment id rotates on every release, like a Next.js build id.
//! When a request fails the page is fetched, the current
//! `Fusion.deployment` is read out of it, persisted, and the request is
//! retried once.

use super::{Context, date_at, first_str, lede_figure, names_at};
use crate::blocks::{self, Block, RenderContext, fusion};
use crate::config::{Args, Settings};
use crate::feed::collect_feed;
use crate::fetch::{Fetch, FetchOptions, get_url_html, get_url_json};
use crate::models::{Feed, Item};
use crate::sites::{SiteConfig, SiteRegistry, update_sites};
use crate::utils::{origin, strip_html};
use htmlescape::encode_minimal as esc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use url::Url;

const DEFAULT_CONTENT_SOURCE: &str = "content-api";
const DEFAULT_FEED_SOURCE: &str = "story-feed-sections";

static DEPLOYMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"Fusion\.deployment\s*=\s*"?(\w+)"?"#).expect("fusion deployment regex"));

/// Content API URL for `source` and `query`.
pub fn content_url(base: &str, source: &str, query: &Value, site: &SiteConfig) -> String {
    let mut url = format!(
        "{}/pf/api/v3/content/fetch/{}?query={}",
        base.trim_end_matches('/'),
        source,
        urlencoding::encode(&query.to_string())
    );
    if let Some(deployment) = &site.deployment {
        url.push_str(&format!("&d={}", urlencoding::encode(deployment)));
    }
    if let Some(website) = &site.website {
        url.push_str(&format!("&_website={}", urlencoding::encode(website)));
    }
    url
}

pub fn find_deployment(html: &str) -> Option<String> {
    DEPLOYMENT.captures(html).map(|c| c[1].to_string())
}

/// Query the content API, refreshing a stale deployment id once.
async fn fetch_content<F: Fetch, R: SiteRegistry>(
    page_url: &str,
    source: &str,
    query: &Value,
    site: &mut SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Value> {
    let base = origin(page_url)?;
    let api_url = content_url(&base, source, query, site);
    if let Some(json) = get_url_json(ctx.fetcher, &api_url, &FetchOptions::with_retries(1)).await {
        return Some(json);
    }

    info!("Fusion content API failed; checking deployment");
    let html = get_url_html(ctx.fetcher, page_url, &FetchOptions::default()).await?;
    let Some(deployment) = find_deployment(&html) else {
        warn!("No Fusion deployment in page");
        return None;
    };
    if site.deployment.as_deref() == Some(deployment.as_str()) {
        warn!(%deployment, "Deployment unchanged and content unavailable");
        return None;
    }
    info!(old = ?site.deployment, new = %deployment, site = %ctx.site_key, "Fusion deployment rotated");
    site.deployment = Some(deployment);
    update_sites(ctx.registry, ctx.site_key, site);

    let api_url = content_url(&base, source, query, site);
    get_url_json(ctx.fetcher, &api_url, &FetchOptions::with_retries(1)).await
}

/// The lede from `promo_items.basic`, as a block.
fn promo_block(story: &Value) -> Option<Block> {
    let promo = story.pointer("/promo_items/basic")?;
    match fusion::to_block(promo) {
        block @ (Block::Image(_) | Block::Video { .. }) => Some(block),
        _ => None,
    }
}

/// Map an ANS story to an [`Item`].
pub fn story_item(story: &Value, base: &str, args: &Args, site: &SiteConfig, settings: &Settings) -> Option<Item> {
    let Some(path) = first_str(story, &["canonical_url", "website_url"]) else {
        warn!(id = ?story.get("_id"), "Story has no canonical_url");
        return None;
    };
    let url = Url::parse(base).ok()?.join(path).ok()?.to_string();
    let mut item = Item::new(first_str(story, &["_id"]).unwrap_or(&url), url.as_str());

    item.title = first_str(story, &["headlines/basic", "headlines/web"]).map(strip_html);
    let tz = site.tz();
    match date_at(story, &["display_date", "first_publish_date", "publish_date", "created_date"], tz) {
        Some(dt) => item.set_published(dt),
        None => warn!(%url, "Story has no date"),
    }
    item.date_modified = date_at(story, &["last_updated_date"], tz);
    item.summary = first_str(story, &["description/basic", "subheadlines/basic"]).map(strip_html);

    let authors: Vec<String> = story
        .pointer("/credits/by")
        .and_then(Value::as_array)
        .map(|by| {
            by.iter()
                .filter_map(|c| first_str(c, &["name", "additional_properties/original/byline"]))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    item.set_authors(if authors.is_empty() { site.author.clone().into_iter().collect() } else { authors });

    let mut tags = names_at(story, &["taxonomy/sections"]);
    tags.extend(
        story
            .pointer("/taxonomy/tags")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(|t| first_str(t, &["text", "slug"])).map(str::to_string).collect::<Vec<_>>())
            .unwrap_or_default(),
    );
    item.set_tags(tags);

    let body = fusion::to_blocks(story.get("content_elements").unwrap_or(&Value::Null));
    let promo = promo_block(story);
    item.image = match &promo {
        Some(Block::Image(image)) => Some(image.url.clone()),
        Some(Block::Video { poster, .. }) => poster.clone(),
        _ => None,
    };

    let mut rctx = RenderContext::new(&item.url, &settings.server);
    let mut content = String::new();
    if args.add_subtitle {
        if let Some(sub) = first_str(story, &["subheadlines/basic"]) {
            content.push_str(&format!("<p><strong>{}</strong></p>", esc(&strip_html(sub))));
        }
    }
    match &promo {
        Some(_) if args.nolead => debug!("Lede disabled"),
        Some(_) if blocks::first_is_image(&body) && !args.add_lede_img => debug!("Story opens with an image"),
        Some(Block::Image(image)) => content.push_str(&lede_figure(image, args)),
        Some(video) => content.push_str(&blocks::render(std::slice::from_ref(video), &mut rctx)),
        None => {}
    }
    content.push_str(&blocks::render_document(&body, &mut rctx));
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
    let parsed = Url::parse(url).ok()?;
    let source = site.content_source.clone().unwrap_or_else(|| DEFAULT_CONTENT_SOURCE.to_string());
    let query = json!({"canonical_url": parsed.path()});
    let story = fetch_content(url, &source, &query, site, ctx).await?;
    ctx.debug_json("debug.json", &story).await;
    story_item(&story, &origin(url)?, args, site, ctx.settings)
}

#[instrument(level = "info", skip_all, fields(%url))]
pub async fn get_feed<F: Fetch, R: SiteRegistry>(
    url: &str,
    args: &Args,
    site: &mut SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Feed> {
    let parsed = Url::parse(url).ok()?;
    let source = site.feed_source.clone().unwrap_or_else(|| DEFAULT_FEED_SOURCE.to_string());
    let section = match parsed.path().trim_end_matches('/') {
        "" => "/",
        path => path,
    };
    let size = args.max.unwrap_or(20).clamp(1, 100);
    let query = json!({"includeSections": section, "feedSize": size});
    let listing = fetch_content(url, &source, &query, site, ctx).await?;
    ctx.debug_json("feed.json", &listing).await;
    let Some(stories) = listing.get("content_elements").and_then(Value::as_array) else {
        warn!("Fusion feed has no content_elements");
        return None;
    };

    let base = origin(url)?;
    let site = &*site;
    let mut feed = Feed::new();
    feed.title = site.title.clone();
    feed.home_page_url = Some(url.to_string());
    Some(collect_feed(stories, args, feed, async |story| story_item(story, &base, args, site, ctx.settings)).await)
}
