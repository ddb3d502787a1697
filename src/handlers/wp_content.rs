//! WordPress `content.rendered` cleanup.
//!
//! Block-editor and classic-editor markup is mapped onto the normalized
//! snippets from [`crate::html::snippets`]: galleries and captioned images
//! become figures, embeds and iframes become embed cards, quotes get the
//! quote styling, media goes through the proxy player. Scripts, ad slots and
//! affiliate redirects are stripped. Output is canonical and idempotent.

use crate::config::Settings;
use crate::html::snippets::{add_audio, add_blockquote, add_button, add_embed, add_image, add_pullquote, add_video};
use crate::html::{Rewrite, class_contains, first_img_src, has_class, img_src, inner_html, rewrite_fragment, select_first, text_of};
use crate::utils::get_redirect_url;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Selector};
use url::Url;

static CAPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse("figcaption, .wp-caption-text, .gallery-caption").expect("caption selector"));
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("link selector"));
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("img selector"));
static IFRAME: Lazy<Selector> = Lazy::new(|| Selector::parse("iframe").expect("iframe selector"));
static VIDEO: Lazy<Selector> = Lazy::new(|| Selector::parse("video").expect("video selector"));
static AUDIO: Lazy<Selector> = Lazy::new(|| Selector::parse("audio").expect("audio selector"));
static SOURCE: Lazy<Selector> = Lazy::new(|| Selector::parse("source[src]").expect("source selector"));
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").expect("p selector"));
static CITE: Lazy<Selector> = Lazy::new(|| Selector::parse("cite").expect("cite selector"));

const AD_CLASSES: &[&str] = &[
    "adsbygoogle",
    "advertisement",
    "ad-container",
    "ad-slot",
    "ad-unit",
    "ad-wrapper",
    "wp-block-ad",
    "code-block",
    "sharedaddy",
    "jp-relatedposts",
];

const AFFILIATE_HOSTS: &[&str] = &[
    "redirectingat.com",
    "shareasale.com",
    "awin1.com",
    "howl.me",
    "skimresources.com",
    "linksynergy.com",
    "anrdoezrs.net",
    "dpbolvw.net",
    "jdoqocy.com",
    "tkqlhce.com",
];

/// Normalize a WordPress content fragment.
pub fn format_content(html: &str, settings: &Settings) -> String {
    rewrite_fragment(html, |el| rule(el, settings))
}

fn rule(el: ElementRef<'_>, settings: &Settings) -> Rewrite {
    let name = el.value().name();
    if matches!(name, "script" | "style" | "noscript" | "ins") || is_ad(el) {
        return Rewrite::Remove;
    }
    if has_class(el, "wp-block-gallery") || has_class(el, "gallery") || has_class(el, "tiled-gallery") {
        return gallery(el);
    }
    if class_contains(el, "pullquote") {
        return pullquote(el, settings);
    }
    if has_class(el, "wp-block-embed")
        || has_class(el, "twitter-tweet")
        || has_class(el, "instagram-media")
        || has_class(el, "tiktok-embed")
    {
        return match embed_url(el) {
            Some(url) => Rewrite::Replace(add_embed(&url)),
            None => Rewrite::Unwrap,
        };
    }
    if has_class(el, "wp-block-button") {
        return match select_first(el, &LINK) {
            Some(a) => Rewrite::Replace(add_button(a.value().attr("href").unwrap_or_default(), &text_of(a))),
            None => Rewrite::Unwrap,
        };
    }

    match name {
        "figure" => figure(el, settings),
        "div" if has_class(el, "wp-caption") => figure(el, settings),
        "iframe" => match iframe_src(el) {
            Some(src) => Rewrite::Replace(add_embed(&src)),
            None => Rewrite::Remove,
        },
        "blockquote" => Rewrite::Replace(add_blockquote(&format_content(&inner_html(el), settings))),
        "video" => video(el, None, settings),
        "audio" => audio(el, None, settings),
        "img" => image(el),
        "a" => match el.value().attr("href").and_then(affiliate_target) {
            Some(target) => {
                let attrs = el
                    .value()
                    .attrs()
                    .map(|(k, v)| if k == "href" { (k.to_string(), target.clone()) } else { (k.to_string(), v.to_string()) })
                    .collect();
                Rewrite::Attrs(attrs)
            }
            None => Rewrite::Keep,
        },
        "p" if is_blank(el) => Rewrite::Remove,
        _ => Rewrite::Keep,
    }
}

fn is_ad(el: ElementRef<'_>) -> bool {
    el.value().classes().any(|c| AD_CLASSES.contains(&c))
        || el.value().id().is_some_and(|id| id.starts_with("div-gpt-ad"))
}

fn is_blank(el: ElementRef<'_>) -> bool {
    text_of(el).is_empty() && !el.children().any(|c| c.value().is_element())
}

fn caption_of(el: ElementRef<'_>) -> Option<String> {
    select_first(el, &CAPTION)
        .map(inner_html)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Link around an image, unless it only points at a bigger copy of it.
fn image_link(el: ElementRef<'_>) -> Option<String> {
    el.select(&LINK)
        .find(|a| select_first(*a, &IMG).is_some())
        .and_then(|a| a.value().attr("href"))
        .filter(|href| !looks_like_image(href))
        .map(str::to_string)
}

fn looks_like_image(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or(href).to_lowercase();
    [".jpg", ".jpeg", ".png", ".gif", ".webp", ".avif"].iter().any(|ext| path.ends_with(ext))
}

fn figure(el: ElementRef<'_>, settings: &Settings) -> Rewrite {
    let caption = caption_of(el);
    if let Some(video_el) = select_first(el, &VIDEO) {
        return video(video_el, caption, settings);
    }
    if let Some(audio_el) = select_first(el, &AUDIO) {
        return audio(audio_el, caption, settings);
    }
    if let Some(src) = select_first(el, &IFRAME).and_then(iframe_src) {
        return Rewrite::Replace(add_embed(&src));
    }
    match first_img_src(el) {
        Some(src) => Rewrite::Replace(add_image(&src, caption.as_deref(), image_link(el).as_deref())),
        None => Rewrite::Keep,
    }
}

fn gallery(el: ElementRef<'_>) -> Rewrite {
    let mut html = String::new();
    for img in el.select(&IMG) {
        let Some(src) = img_src(img) else { continue };
        // The caption lives on the closest figure or gallery item.
        let holder = img
            .ancestors()
            .take_while(|node| node.id() != el.id())
            .filter_map(ElementRef::wrap)
            .find(|a| a.value().name() == "figure" || has_class(*a, "gallery-item"));
        let caption = holder.and_then(caption_of);
        html.push_str(&add_image(&src, caption.as_deref(), None));
    }
    if html.is_empty() { Rewrite::Remove } else { Rewrite::Replace(html) }
}

fn pullquote(el: ElementRef<'_>, settings: &Settings) -> Rewrite {
    let cite = select_first(el, &CITE).map(text_of);
    let paragraphs: String = el
        .select(&PARAGRAPH)
        .map(|p| format!("<p>{}</p>", inner_html(p)))
        .collect();
    let body = if paragraphs.is_empty() {
        htmlescape::encode_minimal(&text_of(el))
    } else {
        format_content(&paragraphs, settings)
    };
    Rewrite::Replace(add_pullquote(&body, cite.as_deref()))
}

fn embed_url(el: ElementRef<'_>) -> Option<String> {
    let value = el.value();
    if let Some(url) = value
        .attr("data-instgrm-permalink")
        .or_else(|| value.attr("cite"))
        .filter(|u| u.starts_with("http"))
    {
        return Some(url.to_string());
    }
    if let Some(src) = select_first(el, &IFRAME).and_then(iframe_src) {
        return Some(src);
    }
    if has_class(el, "twitter-tweet") {
        // The permalink is the last link of a tweet blockquote.
        return el.select(&LINK).last().and_then(|a| a.value().attr("href")).map(str::to_string);
    }
    let text = text_of(el);
    if text.starts_with("http") && !text.contains(' ') {
        return Some(text);
    }
    el.select(&LINK).next().and_then(|a| a.value().attr("href")).map(str::to_string)
}

fn iframe_src(el: ElementRef<'_>) -> Option<String> {
    let src = ["src", "data-src", "data-lazy-src"]
        .iter()
        .filter_map(|a| el.value().attr(a))
        .find(|s| !s.is_empty() && *s != "about:blank")?;
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    Some(src.to_string())
}

fn media_src(el: ElementRef<'_>) -> Option<(String, Option<String>)> {
    if let Some(src) = el.value().attr("src").filter(|s| !s.is_empty()) {
        return Some((src.to_string(), el.value().attr("type").map(str::to_string)));
    }
    let source = select_first(el, &SOURCE)?;
    Some((
        source.value().attr("src")?.to_string(),
        source.value().attr("type").map(str::to_string),
    ))
}

fn video_mime(src: &str) -> &'static str {
    let path = src.split('?').next().unwrap_or(src).to_lowercase();
    if path.ends_with(".m3u8") {
        "application/x-mpegURL"
    } else if path.ends_with(".webm") {
        "video/webm"
    } else {
        "video/mp4"
    }
}

fn video(el: ElementRef<'_>, caption: Option<String>, settings: &Settings) -> Rewrite {
    let Some((src, mime)) = media_src(el) else {
        return Rewrite::Remove;
    };
    let mime = mime.unwrap_or_else(|| video_mime(&src).to_string());
    let poster = el.value().attr("poster").filter(|p| !p.is_empty());
    Rewrite::Replace(add_video(&src, &mime, poster, caption.as_deref(), &settings.server))
}

fn audio(el: ElementRef<'_>, caption: Option<String>, settings: &Settings) -> Rewrite {
    let Some((src, _)) = media_src(el) else {
        return Rewrite::Remove;
    };
    let title = caption
        .map(|c| crate::utils::strip_html(&c))
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| "Listen".to_string());
    Rewrite::Replace(add_audio(&src, &title, None, None, &settings.server))
}

fn image(el: ElementRef<'_>) -> Rewrite {
    let Some(src) = img_src(el) else {
        return Rewrite::Remove;
    };
    let mut attrs = vec![
        ("loading".to_string(), "lazy".to_string()),
        ("src".to_string(), src),
        ("style".to_string(), "max-width:100%; height:auto;".to_string()),
    ];
    if let Some(alt) = el.value().attr("alt").filter(|a| !a.is_empty()) {
        attrs.push(("alt".to_string(), alt.to_string()));
    }
    Rewrite::Attrs(attrs)
}

/// Target of an affiliate redirect link, if `href` is one.
fn affiliate_target(href: &str) -> Option<String> {
    let url = Url::parse(href).ok()?;
    let host = url.host_str()?;
    if !AFFILIATE_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")))
    {
        return None;
    }
    get_redirect_url(href).or_else(|| {
        url.query_pairs().find(|(k, _)| k == "urllink").map(|(_, v)| {
            if v.starts_with("http") {
                v.into_owned()
            } else {
                format!("https://{v}")
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_settings;

    const SAMPLE: &str = r#"
        <p>Intro with <a href="https://go.redirectingat.com/?id=9&amp;url=https%3A%2F%2Fshop.test%2Fp">a deal</a>.</p>
        <p>&nbsp;</p>
        <figure class="wp-block-image size-large"><a href="https://x.test/attachment/1"><img src="https://x.test/a.jpg" srcset="https://x.test/a-300.jpg 300w, https://x.test/a.jpg 1200w" alt="A"></a><figcaption>Caption <em>here</em></figcaption></figure>
        <figure class="wp-block-embed is-type-video"><div class="wp-block-embed__wrapper"><iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ?feature=oembed"></iframe></div></figure>
        <blockquote class="twitter-tweet"><p>So true</p>&mdash; Someone <a href="https://twitter.com/someone/status/1">January 1, 2024</a></blockquote>
        <script async src="https://platform.twitter.com/widgets.js"></script>
        <div class="adsbygoogle">Buy things</div>
        <ins class="adsbygoogle"></ins>
        <figure class="wp-block-pullquote"><blockquote><p>Quotable line</p><cite>Speaker</cite></blockquote></figure>
        <blockquote class="wp-block-quote"><p>Plain quote</p></blockquote>
        <figure class="wp-block-gallery"><figure class="wp-block-image"><img src="https://x.test/g1.jpg"><figcaption>One</figcaption></figure><figure class="wp-block-image"><img src="https://x.test/g2.jpg"></figure></figure>
        <figure class="wp-block-video"><video controls poster="https://x.test/p.jpg"><source src="https://x.test/v.m3u8"></video><figcaption>Clip</figcaption></figure>
        <div class="wp-block-buttons"><div class="wp-block-button"><a class="wp-block-button__link" href="https://x.test/subscribe">Subscribe</a></div></div>
        <p>Inline <img src="data:image/gif;base64,xx" data-src="https://x.test/i.png"> image</p>
    "#;

    #[test]
    fn test_format_content_is_idempotent() {
        let settings = test_settings();
        let once = format_content(SAMPLE, &settings);
        let twice = format_content(&once, &settings);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_upstream_markers_do_not_bypass_cleanup() {
        let settings = test_settings();
        let html = r#"<p>a</p><div data-fh="x"><script>alert(1)</script></div><script>bad()</script><blockquote data-fh="blockquote"><p>Q</p><script>steal()</script></blockquote>"#;
        let out = format_content(html, &settings);
        assert!(!out.contains("alert(1)"));
        assert!(!out.contains("bad()"));
        assert!(!out.contains("steal()"));
        assert!(!out.contains(r#"data-fh="x""#));
        assert!(out.contains("<p>Q</p>"));
        assert_eq!(format_content(&out, &settings), out);
    }

    #[test]
    fn test_images_and_gallery() {
        let out = format_content(SAMPLE, &test_settings());
        assert!(out.contains(r#"src="https://x.test/a.jpg""#));
        assert!(out.contains("Caption <em>here</em>"));
        assert!(out.contains(r#"href="https://x.test/attachment/1""#));
        assert!(out.contains("https://x.test/g1.jpg"));
        assert!(out.contains("https://x.test/g2.jpg"));
        assert!(out.contains(r#"src="https://x.test/i.png""#));
        assert_eq!(out.matches(r#"data-fh="image""#).count(), 3);
    }

    #[test]
    fn test_embeds_and_quotes() {
        let out = format_content(SAMPLE, &test_settings());
        assert!(out.contains("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(out.contains("View post on X"));
        assert!(out.contains("https://twitter.com/someone/status/1"));
        assert!(!out.contains("<iframe"));
        assert!(out.contains(r#"data-fh="pullquote""#));
        assert!(out.contains("Speaker"));
        assert!(out.contains(r#"data-fh="blockquote""#));
        assert!(out.contains("Plain quote"));
    }

    #[test]
    fn test_media_and_buttons_use_proxy() {
        let out = format_content(SAMPLE, &test_settings());
        assert!(out.contains("https://proxy.test/videoplayer?src=https%3A%2F%2Fx.test%2Fv.m3u8&amp;type=application%2Fx-mpegURL"));
        assert!(out.contains("Clip"));
        assert!(out.contains(r#"data-fh="button""#));
        assert!(out.contains("https://x.test/subscribe"));
    }

    #[test]
    fn test_strips_scripts_ads_and_affiliates() {
        let out = format_content(SAMPLE, &test_settings());
        assert!(!out.contains("<script"));
        assert!(!out.contains("Buy things"));
        assert!(!out.contains("<ins"));
        assert!(!out.contains("redirectingat"));
        assert!(out.contains(r#"href="https://shop.test/p""#));
        assert!(!out.contains("<p></p>"));
    }

    #[test]
    fn test_affiliate_target() {
        assert_eq!(
            affiliate_target("https://shareasale.com/r.cfm?b=1&u=2&m=3&urllink=www.shop.test%2Fitem").as_deref(),
            Some("https://www.shop.test/item")
        );
        assert_eq!(
            affiliate_target("https://www.awin1.com/cread.php?awinmid=1&ued=https%3A%2F%2Fshop.test%2F").as_deref(),
            Some("https://shop.test/")
        );
        assert!(affiliate_target("https://x.test/?url=https%3A%2F%2Fshop.test").is_none());
    }
}
