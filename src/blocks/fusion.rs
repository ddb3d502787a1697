//! Arc XP / Fusion ANS `content_elements` parser.

use super::{Block, ImageBlock, str_at};
use htmlescape::encode_minimal as esc;
use serde_json::Value;

/// Parse a `content_elements` array.
pub fn to_blocks(elements: &Value) -> Vec<Block> {
    elements
        .as_array()
        .map(|list| list.iter().map(to_block).collect())
        .unwrap_or_default()
}

/// Image element to [`ImageBlock`]. Prefers a resizer URL when present.
pub fn image_block(el: &Value) -> Option<ImageBlock> {
    let url = str_at(el, "additional_properties/fullSizeResizeUrl")
        .or_else(|| str_at(el, "additional_properties/resizeUrl"))
        .or_else(|| str_at(el, "url"))?;
    let credit = el
        .pointer("/credits/by")
        .and_then(Value::as_array)
        .map(|by| {
            by.iter()
                .filter_map(|c| str_at(c, "name").or_else(|| str_at(c, "byline")))
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|s| !s.is_empty());
    Some(ImageBlock {
        url: url.to_string(),
        caption: str_at(el, "caption").map(str::to_string),
        credit,
        link: None,
    })
}

fn best_stream(el: &Value) -> Option<(String, String)> {
    let streams = el.get("streams")?.as_array()?;
    let pick = |kind: &str| {
        streams
            .iter()
            .filter(|s| str_at(s, "stream_type") == Some(kind))
            .max_by_key(|s| s.get("height").and_then(Value::as_u64).unwrap_or(0))
            .and_then(|s| str_at(s, "url"))
            .map(str::to_string)
    };
    if let Some(url) = pick("mp4") {
        return Some((url, "video/mp4".to_string()));
    }
    pick("ts").map(|url| (url, "application/x-mpegURL".to_string()))
}

fn list_items(items: &Value) -> Vec<Block> {
    items
        .as_array()
        .map(|list| {
            list.iter()
                .map(|item| match str_at(item, "type") {
                    Some("text") => Block::Paragraph(str_at(item, "content").unwrap_or_default().to_string()),
                    _ => to_block(item),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn cells(row: &Value) -> Vec<String> {
    row.as_array()
        .map(|cells| {
            cells
                .iter()
                .map(|c| str_at(c, "content").or_else(|| c.as_str()).unwrap_or_default().to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// Parse one ANS content element.
pub fn to_block(el: &Value) -> Block {
    let kind = str_at(el, "type").unwrap_or("(missing)");
    match kind {
        "text" | "paragraph" => Block::Paragraph(str_at(el, "content").unwrap_or_default().to_string()),
        "header" => Block::Heading {
            level: el.get("level").and_then(Value::as_u64).unwrap_or(2) as u8,
            html: str_at(el, "content").unwrap_or_default().to_string(),
        },
        "image" => match image_block(el) {
            Some(image) => Block::Image(image),
            None => Block::unknown("image (no url)", el),
        },
        "gallery" => Block::Gallery {
            title: str_at(el, "headlines/basic").map(str::to_string),
            images: el
                .get("content_elements")
                .and_then(Value::as_array)
                .map(|list| list.iter().filter_map(image_block).collect())
                .unwrap_or_default(),
        },
        "video" => match best_stream(el) {
            Some((src, mime_type)) => Block::Video {
                src,
                mime_type,
                poster: str_at(el, "promo_image/url").map(str::to_string),
                caption: str_at(el, "description/basic")
                    .or_else(|| str_at(el, "headlines/basic"))
                    .map(str::to_string),
            },
            None => match str_at(el, "embed_html") {
                Some(html) => Block::RawHtml(html.to_string()),
                None => Block::unknown("video (no stream)", el),
            },
        },
        "oembed_response" | "oembed" => {
            match str_at(el, "raw_oembed/_id").or_else(|| str_at(el, "raw_oembed/url")).or_else(|| str_at(el, "referent/id")) {
                Some(url) => Block::Embed { url: url.to_string() },
                None => Block::unknown("oembed (no url)", el),
            }
        }
        "list" => Block::List {
            ordered: str_at(el, "list_type") == Some("ordered"),
            items: list_items(el.get("items").unwrap_or(&Value::Null)),
        },
        "table" => Block::Table {
            header: cells(el.get("header").unwrap_or(&Value::Null)),
            rows: el
                .get("rows")
                .and_then(Value::as_array)
                .map(|rows| rows.iter().map(cells).collect())
                .unwrap_or_default(),
        },
        "quote" => {
            let html = el
                .get("content_elements")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .filter_map(|c| str_at(c, "content"))
                        .map(|c| format!("<p>{c}</p>"))
                        .collect::<String>()
                })
                .unwrap_or_default();
            Block::Quote {
                html,
                cite: str_at(el, "citation/content").map(str::to_string),
                pull: str_at(el, "subtype") == Some("pullquote"),
            }
        }
        "raw_html" => Block::RawHtml(str_at(el, "content").unwrap_or_default().to_string()),
        "divider" => Block::Divider,
        "interstitial_link" => match (str_at(el, "url"), str_at(el, "content")) {
            (Some(url), Some(text)) => Block::Paragraph(format!(r#"<b><a href="{}">{}</a></b>"#, esc(url), text)),
            _ => Block::Container(vec![]),
        },
        "correction" => Block::Paragraph(format!(
            "<b>{}:</b> {}",
            str_at(el, "correction_type").map(capitalize).unwrap_or_else(|| "Correction".to_string()),
            str_at(el, "text").unwrap_or_default()
        )),
        "story" | "element_group" => Block::Container(to_blocks(el.get("content_elements").unwrap_or(&Value::Null))),
        other => Block::unknown(other, el),
    }
}

fn capitalize(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}
