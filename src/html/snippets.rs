//! Builders for normalized embed snippets.
//!
//! Every snippet root carries `data-fh="<kind>"` so a later rewrite pass
//! leaves it alone. Media that readers can't play inline (HLS video, audio)
//! links through the proxy service at `Settings::server`.

use super::SNIPPET_ATTR;
use crate::utils::{calc_duration, get_youtube_id};
use htmlescape::encode_minimal as esc;
use url::Url;

fn proxy_link(server: &str, path: &str, params: &[(&str, &str)]) -> String {
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}/{}?{}", server.trim_end_matches('/'), path, query)
}

/// An image figure with optional caption (HTML) and link.
pub fn add_image(src: &str, caption: Option<&str>, link: Option<&str>) -> String {
    let img = format!(r#"<img loading="lazy" src="{}" style="display:block; width:100%;">"#, esc(src));
    let body = match link {
        Some(link) => format!(r#"<a href="{}">{}</a>"#, esc(link), img),
        None => img,
    };
    let caption = caption
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!("<figcaption><small>{c}</small></figcaption>"))
        .unwrap_or_default();
    format!(r#"<figure {SNIPPET_ATTR}="image" style="margin:0; padding:0;">{body}{caption}</figure>"#)
}

/// A video rendered as its poster linking to the proxy video player.
pub fn add_video(
    src: &str,
    mime_type: &str,
    poster: Option<&str>,
    caption: Option<&str>,
    server: &str,
) -> String {
    let player = proxy_link(server, "videoplayer", &[("src", src), ("type", mime_type)]);
    let poster = match poster {
        Some(p) => proxy_link(server, "image", &[("url", p), ("width", "1280"), ("overlay", "video")]),
        None => proxy_link(server, "image", &[("width", "1280"), ("height", "720"), ("overlay", "video")]),
    };
    let caption = caption
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!("<figcaption><small>{c}</small></figcaption>"))
        .unwrap_or_default();
    format!(
        r#"<figure {SNIPPET_ATTR}="video" style="margin:0; padding:0;"><a href="{}"><img loading="lazy" src="{}" style="display:block; width:100%;"></a>{}</figure>"#,
        esc(&player),
        esc(&poster),
        caption
    )
}

/// An audio player card.
pub fn add_audio(src: &str, title: &str, poster: Option<&str>, duration_secs: Option<u64>, server: &str) -> String {
    let player = proxy_link(server, "audio", &[("url", src)]);
    let mut html = format!(r#"<div {SNIPPET_ATTR}="audio" style="display:flex; align-items:center; gap:8px;">"#);
    if let Some(poster) = poster {
        html.push_str(&format!(
            r#"<a href="{}"><img loading="lazy" src="{}" style="width:128px;"></a>"#,
            esc(&player),
            esc(poster)
        ));
    }
    html.push_str(&format!(r#"<div><a href="{}"><b>{}</b></a>"#, esc(&player), esc(title)));
    if let Some(secs) = duration_secs {
        html.push_str(&format!("<br><small>{}</small>", calc_duration(secs)));
    }
    html.push_str("</div></div>");
    html
}

/// Normalize an embedded URL (YouTube, X/Twitter, Instagram, others).
pub fn add_embed(url: &str) -> String {
    if let Some(id) = get_youtube_id(url) {
        let watch = format!("https://www.youtube.com/watch?v={id}");
        let thumb = format!("https://i.ytimg.com/vi/{id}/hqdefault.jpg");
        return format!(
            r#"<figure {SNIPPET_ATTR}="embed" style="margin:0; padding:0;"><a href="{}"><img loading="lazy" src="{}" style="display:block; width:100%;"></a><figcaption><small><a href="{}">Watch on YouTube</a></small></figcaption></figure>"#,
            esc(&watch),
            esc(&thumb),
            esc(&watch)
        );
    }

    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_default();
    let label = match host.as_str() {
        "twitter.com" | "x.com" => "View post on X",
        "instagram.com" => "View post on Instagram",
        "tiktok.com" => "View on TikTok",
        "facebook.com" => "View on Facebook",
        "bsky.app" => "View on Bluesky",
        "vimeo.com" | "player.vimeo.com" => "Watch on Vimeo",
        _ => "View embedded content",
    };
    format!(
        r#"<blockquote {SNIPPET_ATTR}="embed" style="border-left:3px solid #ccc; margin:1em 0; padding:0.5em 10px;"><a href="{}">{}</a><br><small>{}</small></blockquote>"#,
        esc(url),
        label,
        esc(url)
    )
}

/// A plain block quote around trusted HTML.
pub fn add_blockquote(html: &str) -> String {
    format!(
        r#"<blockquote {SNIPPET_ATTR}="blockquote" style="border-left:3px solid #ccc; margin:1.5em 10px; padding:0.5em 10px;">{html}</blockquote>"#
    )
}

/// A pull quote, optionally attributed.
pub fn add_pullquote(html: &str, author: Option<&str>) -> String {
    let cite = author
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|a| format!("<br><cite>— {}</cite>", esc(a)))
        .unwrap_or_default();
    format!(
        r#"<blockquote {SNIPPET_ATTR}="pullquote" style="font-size:1.2em; font-style:italic; margin:1.5em 10px;">{html}{cite}</blockquote>"#
    )
}

/// A centered call-to-action button.
pub fn add_button(href: &str, text: &str) -> String {
    format!(
        r#"<div {SNIPPET_ATTR}="button" style="margin:1em 0; text-align:center;"><a href="{}" style="display:inline-block; padding:0.5em 1em; border-radius:10px; background-color:#555; color:white; text-decoration:none;">{}</a></div>"#,
        esc(href),
        esc(text)
    )
}

/// A full-width bar with a label, used for section breaks and headings.
pub fn add_bar(text: &str) -> String {
    format!(
        r#"<div {SNIPPET_ATTR}="bar" style="margin:1em 0; padding:4px 8px; background-color:#555; color:white; font-weight:bold;">{}</div>"#,
        esc(text)
    )
}
