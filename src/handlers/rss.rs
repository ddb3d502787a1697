//! RSS 2.0 / Atom handler.
//!
//! Sites whose records list `feeds` are served straight from their
//! syndication feeds, read with the `rss` and `atom_syndication` crates. Entries map onto items directly: enclosures become
//! attachments (the first audio or video one also drives the player card at
//! the top of the body), categories become tags and `content:encoded` (or
//! the description) goes through the shared HTML cleanup. Several feeds can
//! be merged into one.

use super::wp_content::format_content;
use super::{Context, lede_figure, starts_with_image};
use crate::blocks::ImageBlock;
use crate::config::{Args, Settings};
use crate::error::FeedParseError;
use crate::feed::collect_feed;
use crate::fetch::{Fetch, FetchOptions, get_url_html};
use crate::html::snippets::{add_audio, add_video};
use crate::models::{Attachment, Feed, Item};
use crate::sites::{SiteConfig, SiteRegistry};
use crate::utils::{parse_date, strip_html};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, instrument, warn};
use url::Url;

const FEED_ACCEPT: &str = "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8";
const OCTET_STREAM: &str = "application/octet-stream";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: String,
}

/// One `<item>` or `<entry>`, as raw strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entry {
    pub id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub authors: Vec<String>,
    pub categories: Vec<String>,
    pub enclosures: Vec<Enclosure>,
    pub image: Option<String>,
    pub duration: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    pub title: Option<String>,
    pub link: Option<String>,
    pub entries: Vec<Entry>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// `editor@x.test (Jane Doe)` → `Jane Doe`.
fn author_name(raw: &str) -> String {
    match (raw.find('('), raw.strip_suffix(')')) {
        (Some(open), Some(inner)) if open + 1 < inner.len() => inner[open + 1..].trim().to_string(),
        _ => raw.to_string(),
    }
}

/// `itunes:duration` as seconds: `345`, `5:45` or `1:05:45`.
fn parse_duration(raw: &str) -> Option<u64> {
    raw.split(':')
        .try_fold(0u64, |acc, part| Some(acc * 60 + part.trim().parse::<u64>().ok()?))
}

/// Extension elements (`media:*`) as both feed crates expose them.
trait ExtensionTag: Sized {
    fn attr(&self, key: &str) -> Option<&str>;
    fn nested(&self) -> &BTreeMap<String, Vec<Self>>;
}

macro_rules! impl_extension_tag {
    ($ty:ty) => {
        impl ExtensionTag for $ty {
            fn attr(&self, key: &str) -> Option<&str> {
                self.attrs.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
            }

            fn nested(&self) -> &BTreeMap<String, Vec<Self>> {
                &self.children
            }
        }
    };
}

impl_extension_tag!(rss::extension::Extension);
impl_extension_tag!(atom_syndication::extension::Extension);

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn apply_media<E: ExtensionTag>(extensions: &BTreeMap<String, BTreeMap<String, Vec<E>>>, entry: &mut Entry) {
    if let Some(media) = extensions.get("media") {
        for (name, tags) in media {
            apply_media_tags(local_name(name), tags, entry);
        }
    }
}

fn apply_media_tags<E: ExtensionTag>(name: &str, tags: &[E], entry: &mut Entry) {
    for tag in tags {
        match name {
            "content" => {
                let Some(url) = tag.attr("url") else { continue };
                let medium = tag.attr("medium");
                let mime_type = tag.attr("type");
                if medium == Some("image") || mime_type.is_some_and(|t| t.starts_with("image/")) {
                    entry.image.get_or_insert_with(|| url.to_string());
                } else {
                    let mime_type = match (mime_type, medium) {
                        (Some(t), _) => t.to_string(),
                        (None, Some(m)) => format!("{m}/*"),
                        (None, None) => OCTET_STREAM.to_string(),
                    };
                    entry.enclosures.push(Enclosure {
                        url: url.to_string(),
                        mime_type,
                    });
                }
            }
            "thumbnail" => {
                if let Some(url) = tag.attr("url") {
                    entry.image.get_or_insert_with(|| url.to_string());
                }
            }
            "group" => {
                for (child, nested) in tag.nested() {
                    apply_media_tags(local_name(child), nested, entry);
                }
            }
            _ => {}
        }
    }
}

impl From<&rss::Item> for Entry {
    fn from(item: &rss::Item) -> Self {
        let mut entry = Entry {
            id: non_empty(item.guid().map(|g| g.value())),
            link: non_empty(item.link()),
            title: non_empty(item.title()),
            summary: non_empty(item.description()),
            content: non_empty(item.content()),
            published: non_empty(item.pub_date()),
            ..Entry::default()
        };
        entry.authors.extend(item.author().map(author_name));
        if let Some(dc) = item.dublin_core_ext() {
            entry.authors.extend(dc.creators().iter().map(|c| author_name(c)));
            entry.categories.extend(dc.subjects().iter().cloned());
            if entry.published.is_none() {
                entry.published = non_empty(dc.dates().first().map(String::as_str));
            }
        }
        entry
            .categories
            .extend(item.categories().iter().map(|c| c.name().trim().to_string()).filter(|c| !c.is_empty()));
        if let Some(enclosure) = item.enclosure().filter(|e| !e.url().trim().is_empty()) {
            let mime_type = enclosure.mime_type().trim();
            entry.enclosures.push(Enclosure {
                url: enclosure.url().trim().to_string(),
                mime_type: if mime_type.is_empty() { OCTET_STREAM } else { mime_type }.to_string(),
            });
        }
        if let Some(itunes) = item.itunes_ext() {
            entry.duration = itunes.duration().and_then(parse_duration);
            entry.image = non_empty(itunes.image());
        }
        apply_media(item.extensions(), &mut entry);
        entry
    }
}

impl From<&atom_syndication::Entry> for Entry {
    fn from(atom: &atom_syndication::Entry) -> Self {
        // A missing <updated> comes back as the Unix epoch.
        let updated = Some(atom.updated()).filter(|d| d.timestamp() != 0);
        let mut entry = Entry {
            id: non_empty(Some(atom.id())),
            title: non_empty(Some(atom.title().value.as_str())),
            summary: non_empty(atom.summary().map(|s| s.value.as_str())),
            content: non_empty(atom.content().and_then(|c| c.value.as_deref())),
            published: atom.published().map(|d| d.to_rfc3339()),
            updated: updated.map(|d| d.to_rfc3339()),
            ..Entry::default()
        };
        for link in atom.links() {
            match link.rel() {
                "alternate" if entry.link.is_none() => entry.link = non_empty(Some(link.href())),
                "enclosure" => entry.enclosures.push(Enclosure {
                    url: link.href().to_string(),
                    mime_type: link.mime_type().unwrap_or(OCTET_STREAM).to_string(),
                }),
                _ => {}
            }
        }
        entry.authors.extend(atom.authors().iter().filter_map(|p| non_empty(Some(p.name()))));
        entry
            .categories
            .extend(atom.categories().iter().filter_map(|c| non_empty(c.label().or(Some(c.term())))));
        apply_media(atom.extensions(), &mut entry);
        entry
    }
}

impl From<&rss::Channel> for Channel {
    fn from(channel: &rss::Channel) -> Self {
        Channel {
            title: non_empty(Some(channel.title())),
            link: non_empty(Some(channel.link())),
            entries: channel.items().iter().map(Entry::from).collect(),
        }
    }
}

impl From<&atom_syndication::Feed> for Channel {
    fn from(feed: &atom_syndication::Feed) -> Self {
        Channel {
            title: non_empty(Some(feed.title().value.as_str())),
            link: feed
                .links()
                .iter()
                .find(|l| l.rel() == "alternate")
                .and_then(|l| non_empty(Some(l.href()))),
            entries: feed.entries().iter().map(Entry::from).collect(),
        }
    }
}

/// Parse an RSS 2.0, RSS 1.0 (RDF) or Atom document.
pub fn parse_feed(xml: &str) -> Result<Channel, FeedParseError> {
    match rss::Channel::read_from(xml.as_bytes()) {
        Ok(channel) => Ok(Channel::from(&channel)),
        Err(rss::Error::InvalidStartTag) => match atom_syndication::Feed::read_from(xml.as_bytes()) {
            Ok(feed) => Ok(Channel::from(&feed)),
            Err(atom_syndication::Error::InvalidStartTag) => Err(FeedParseError::NotAFeed),
            Err(e) => Err(e.into()),
        },
        Err(e) => Err(e.into()),
    }
}

fn resolve(base: &str, link: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    base.join(link.trim()).ok().map(String::from)
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim_end_matches('/') == b.trim_end_matches('/')
}

/// Map a feed entry to an [`Item`]. Entries without a usable link are
/// dropped.
pub fn entry_item(entry: &Entry, base: &str, args: &Args, site: &SiteConfig, settings: &Settings) -> Option<Item> {
    let link = entry
        .link
        .as_deref()
        .or_else(|| entry.id.as_deref().filter(|id| id.starts_with("http")));
    let Some(url) = link.and_then(|l| resolve(base, l)) else {
        warn!(title = ?entry.title, "Feed entry has no link");
        return None;
    };
    let mut item = Item::new(entry.id.clone().unwrap_or_else(|| url.clone()), url.clone());

    item.title = entry.title.as_deref().map(strip_html).filter(|t| !t.is_empty());
    let tz = site.tz();
    match entry
        .published
        .as_deref()
        .or(entry.updated.as_deref())
        .and_then(|d| parse_date(d, tz))
    {
        Some(dt) => item.set_published(dt),
        None => warn!(%url, "Feed entry has no date"),
    }
    item.date_modified = entry.updated.as_deref().and_then(|d| parse_date(d, tz));
    item.summary = entry.summary.as_deref().map(strip_html).filter(|s| !s.is_empty());

    if entry.authors.is_empty() {
        item.set_authors(site.author.clone());
    } else {
        item.set_authors(entry.authors.iter().cloned());
    }
    item.set_tags(entry.categories.iter().cloned());

    for enclosure in &entry.enclosures {
        let media = enclosure.mime_type.starts_with("audio/") || enclosure.mime_type.starts_with("video/");
        if enclosure.mime_type.starts_with("image/") {
            item.image.get_or_insert_with(|| enclosure.url.clone());
            continue;
        }
        if enclosure.mime_type.starts_with("audio/") {
            item.audio.get_or_insert_with(|| enclosure.url.clone());
        } else if enclosure.mime_type.starts_with("video/") {
            item.video.get_or_insert_with(|| enclosure.url.clone());
        }
        item.attachments.push(Attachment {
            url: enclosure.url.clone(),
            mime_type: enclosure.mime_type.clone(),
            duration_in_seconds: if media { entry.duration } else { None },
        });
    }
    if let Some(image) = &entry.image {
        item.image = Some(image.clone());
    }

    let body = entry
        .content
        .as_deref()
        .or(entry.summary.as_deref())
        .map(|html| format_content(html, settings))
        .unwrap_or_default();

    let mut content = String::new();
    if let Some(audio) = &item.audio {
        let title = item.title.as_deref().unwrap_or("Listen");
        content.push_str(&add_audio(audio, title, item.image.as_deref(), entry.duration, &settings.server));
    } else if let Some(video) = &item.video {
        let mime_type = entry
            .enclosures
            .iter()
            .find(|e| &e.url == video)
            .map(|e| e.mime_type.as_str())
            .unwrap_or("video/mp4");
        content.push_str(&add_video(video, mime_type, item.image.as_deref(), None, &settings.server));
    } else if let Some(image) = &item.image {
        if args.nolead {
            debug!("Lede image disabled");
        } else if (starts_with_image(&body) || body.contains(image.as_str())) && !args.add_lede_img {
            debug!("Body already shows the lede image");
        } else {
            content.push_str(&lede_figure(&ImageBlock::new(image.clone()), args));
        }
    }
    content.push_str(&body);
    if !content.is_empty() {
        item.content_html = Some(content);
    }
    Some(item)
}

/// Feeds backing a site: its `feeds` list resolved against `url`, or `url`
/// itself.
fn feed_urls(url: &str, site: &SiteConfig) -> Vec<String> {
    if site.feeds.is_empty() {
        return vec![url.to_string()];
    }
    site.feeds.iter().filter_map(|f| resolve(url, f)).collect()
}

async fn fetch_channel<F: Fetch, R>(url: &str, ctx: &Context<'_, F, R>) -> Option<Channel> {
    let opts = FetchOptions::default().header("Accept", FEED_ACCEPT);
    let xml = get_url_html(ctx.fetcher, url, &opts).await?;
    ctx.debug_html("feed.xml", &xml).await;
    match parse_feed(&xml) {
        Ok(channel) => {
            debug!(%url, entries = channel.entries.len(), "Parsed feed");
            Some(channel)
        }
        Err(e) => {
            warn!(%url, error = %e, "Unparseable feed");
            None
        }
    }
}

#[instrument(level = "info", skip_all, fields(%url))]
pub async fn get_content<F: Fetch, R: SiteRegistry>(
    url: &str,
    args: &Args,
    site: &mut SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Item> {
    if site.feeds.is_empty() {
        warn!("RSS site has no feeds to look the article up in");
        return None;
    }
    for source in feed_urls(url, site) {
        let Some(channel) = fetch_channel(&source, ctx).await else {
            continue;
        };
        let found = channel.entries.iter().find(|entry| {
            entry.id.as_deref().is_some_and(|id| same_url(id, url))
                || entry
                    .link
                    .as_deref()
                    .and_then(|l| resolve(&source, l))
                    .is_some_and(|l| same_url(&l, url))
        });
        if let Some(entry) = found {
            return entry_item(entry, &source, args, site, ctx.settings);
        }
    }
    warn!("Article not found in any feed");
    None
}

#[instrument(level = "info", skip_all, fields(%url))]
pub async fn get_feed<F: Fetch, R: SiteRegistry>(
    url: &str,
    args: &Args,
    site: &mut SiteConfig,
    ctx: &Context<'_, F, R>,
) -> Option<Feed> {
    let sources = feed_urls(url, site);
    let mut feed = Feed::new();
    feed.title = site.title.clone();
    if site.feeds.is_empty() {
        feed.feed_url = Some(url.to_string());
    }

    let mut fetched = 0usize;
    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for source in &sources {
        let Some(channel) = fetch_channel(source, ctx).await else {
            continue;
        };
        fetched += 1;
        if feed.title.is_none() {
            feed.title = channel.title.clone();
        }
        if feed.home_page_url.is_none() {
            feed.home_page_url = channel.link.clone();
        }
        for entry in &channel.entries {
            if let Some(item) = entry_item(entry, source, args, site, ctx.settings) {
                if seen.insert(item.id.clone()) {
                    items.push(item);
                }
            }
        }
    }
    if fetched == 0 {
        warn!(feeds = sources.len(), "No feed could be fetched");
        return None;
    }

    // Merge order is newest first so `max` keeps the newest entries.
    items.sort_by(|a, b| b.timestamp.unwrap_or(f64::MIN).total_cmp(&a.timestamp.unwrap_or(f64::MIN)));
    Some(collect_feed(items, args, feed, async |item: Item| Some(item)).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MemoryRegistry, StaticFetcher, context, test_settings};

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Harbor Radio</title>
    <link>https://x.test/</link>
    <item>
      <title>Tom &amp; Jerry</title>
      <link>https://x.test/ep/1</link>
      <guid isPermaLink="false">ep-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate>
      <dc:creator>Ann</dc:creator>
      <category>Audio</category>
      <category>audio</category>
      <description>Short &lt;b&gt;notes&lt;/b&gt;</description>
      <content:encoded><![CDATA[<p>Full notes</p><script>x()</script>]]></content:encoded>
      <enclosure url="https://cdn.x.test/ep1.mp3" type="audio/mpeg" length="1000"/>
      <itunes:duration>1:02:03</itunes:duration>
    </item>
    <item>
      <title>Second</title>
      <link>/ep/2</link>
      <pubDate>Tue, 02 Jan 2024 00:00:00 +0000</pubDate>
      <author>desk@x.test (Bo Lee)</author>
      <description>Plain</description>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Desk</title>
  <link rel="alternate" href="https://y.test/"/>
  <entry>
    <id>tag:y.test,2024:1</id>
    <title type="html">Hello</title>
    <link rel="alternate" href="https://y.test/a"/>
    <link rel="enclosure" type="image/jpeg" href="https://y.test/a.jpg"/>
    <published>2024-01-03T00:00:00Z</published>
    <updated>2024-01-04T00:00:00Z</updated>
    <author><name>Cy</name></author>
    <category term="rust" label="Rust"/>
    <content type="html">&lt;p&gt;Body&lt;/p&gt;</content>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss() {
        let channel = parse_feed(RSS).unwrap();
        assert_eq!(channel.title.as_deref(), Some("Harbor Radio"));
        assert_eq!(channel.entries.len(), 2);
        let first = &channel.entries[0];
        assert_eq!(first.title.as_deref(), Some("Tom & Jerry"));
        assert_eq!(first.id.as_deref(), Some("ep-1"));
        assert_eq!(first.summary.as_deref(), Some("Short <b>notes</b>"));
        assert_eq!(first.content.as_deref(), Some("<p>Full notes</p><script>x()</script>"));
        assert_eq!(first.duration, Some(3723));
        assert_eq!(first.enclosures[0].mime_type, "audio/mpeg");
        assert_eq!(channel.entries[1].authors, ["Bo Lee"]);
    }

    #[test]
    fn test_parse_atom() {
        let channel = parse_feed(ATOM).unwrap();
        assert_eq!(channel.link.as_deref(), Some("https://y.test/"));
        let entry = &channel.entries[0];
        assert_eq!(entry.link.as_deref(), Some("https://y.test/a"));
        assert_eq!(entry.authors, ["Cy"]);
        assert_eq!(entry.categories, ["Rust"]);
        assert_eq!(entry.content.as_deref(), Some("<p>Body</p>"));
    }

    #[test]
    fn test_atom_xhtml_content_keeps_markup() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>X</title>
  <entry>
    <id>urn:x:1</id>
    <title>Markup</title>
    <link href="https://y.test/m"/>
    <updated>2024-01-05T00:00:00Z</updated>
    <content type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml"><p>Hello <b>world</b></p></div></content>
  </entry>
</feed>"#;
        let channel = parse_feed(xml).unwrap();
        let entry = &channel.entries[0];
        let content = entry.content.as_deref().unwrap();
        assert!(content.contains("Hello"));
        assert!(content.contains("world"));
        assert_eq!(entry.published, None);

        let item = entry_item(entry, "https://y.test/atom", &Args::default(), &SiteConfig::new("rss"), &test_settings()).unwrap();
        assert_eq!(item.date_modified.unwrap().timestamp(), 1704412800);
        assert!(item.content_html.unwrap().contains("Hello"));
    }

    #[test]
    fn test_media_rss_thumbnail_and_video() {
        let xml = r#"<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>Clips</title>
    <link>https://z.test/</link>
    <item>
      <title>Clip</title>
      <link>https://z.test/c</link>
      <media:group>
        <media:content url="https://z.test/c.mp4" type="video/mp4"/>
      </media:group>
      <media:thumbnail url="https://z.test/c.jpg"/>
    </item>
  </channel>
</rss>"#;
        let entry = &parse_feed(xml).unwrap().entries[0];
        assert_eq!(entry.image.as_deref(), Some("https://z.test/c.jpg"));
        assert_eq!(
            entry.enclosures,
            [Enclosure {
                url: "https://z.test/c.mp4".into(),
                mime_type: "video/mp4".into()
            }]
        );
    }

    #[test]
    fn test_html_is_not_a_feed() {
        assert!(matches!(parse_feed("<html><body></body></html>"), Err(FeedParseError::NotAFeed)));
    }

    #[test]
    fn test_duration_formats() {
        assert_eq!(parse_duration("345"), Some(345));
        assert_eq!(parse_duration("5:45"), Some(345));
        assert_eq!(parse_duration("n/a"), None);
    }

    #[test]
    fn test_entry_item_with_audio() {
        let channel = parse_feed(RSS).unwrap();
        let settings = test_settings();
        let item = entry_item(&channel.entries[0], "https://x.test/feed", &Args::default(), &SiteConfig::new("rss"), &settings).unwrap();
        assert_eq!(item.id, "ep-1");
        assert_eq!(item.timestamp, Some(1704067200.0));
        assert_eq!(item.tags().unwrap(), ["Audio"]);
        assert_eq!(item.summary.as_deref(), Some("Short notes"));
        assert_eq!(item.attachments.len(), 1);
        assert_eq!(item.attachments[0].duration_in_seconds, Some(3723));
        assert_eq!(item.audio.as_deref(), Some("https://cdn.x.test/ep1.mp3"));
        let content = item.content_html.unwrap();
        assert!(content.starts_with(r#"<div data-fh="audio""#));
        assert!(content.contains("<p>Full notes</p>"));
        assert!(!content.contains("x()"));
    }

    #[test]
    fn test_atom_entry_gets_lede_from_image_enclosure() {
        let channel = parse_feed(ATOM).unwrap();
        let settings = test_settings();
        let item = entry_item(&channel.entries[0], "https://y.test/atom", &Args::default(), &SiteConfig::new("rss"), &settings).unwrap();
        assert_eq!(item.image.as_deref(), Some("https://y.test/a.jpg"));
        assert!(item.attachments.is_empty());
        assert_eq!(item.date_modified.unwrap().timestamp(), 1704326400);
        assert!(item.content_html.unwrap().starts_with("<figure"));
    }

    #[tokio::test]
    async fn test_feeds_are_merged_and_sorted() {
        let fetcher = StaticFetcher::new()
            .route("https://x.test/rss", RSS)
            .route("https://y.test/atom", ATOM);
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);
        let mut site = SiteConfig::new("rss");
        site.feeds = vec!["https://x.test/rss".into(), "https://y.test/atom".into(), "https://x.test/missing".into()];

        let feed = get_feed("https://x.test/", &Args::default(), &mut site, &ctx).await.unwrap();
        let titles: Vec<&str> = feed.items.iter().filter_map(|i| i.title.as_deref()).collect();
        assert_eq!(titles, ["Hello", "Second", "Tom & Jerry"]);
        assert_eq!(feed.title.as_deref(), Some("Harbor Radio"));
        assert_eq!(feed.items[1].url, "https://x.test/ep/2");

        let args = Args {
            max: Some(1),
            ..Args::default()
        };
        let feed = get_feed("https://x.test/", &args, &mut site, &ctx).await.unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].title.as_deref(), Some("Hello"));
    }

    #[tokio::test]
    async fn test_get_content_finds_entry() {
        let fetcher = StaticFetcher::new().route("https://x.test/rss", RSS);
        let registry = MemoryRegistry::default();
        let settings = test_settings();
        let ctx = context(&fetcher, &registry, &settings);
        let mut site = SiteConfig::new("rss");
        site.feeds = vec!["/rss".into()];

        let item = get_content("https://x.test/ep/2/", &Args::default(), &mut site, &ctx).await.unwrap();
        assert_eq!(item.author.unwrap().name, "Bo Lee");
        assert!(get_content("https://x.test/ep/9", &Args::default(), &mut site, &ctx).await.is_none());
    }
}
