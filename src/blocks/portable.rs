//! Sanity Portable Text parser.
//!
//! Text blocks carry `children` spans whose `marks` are either decorators
//! (`strong`, `em`, ...) or keys into the block's `markDefs` (links).
//! Consecutive list-item blocks are merged into one list.

use super::{Block, ImageBlock, str_at};
use htmlescape::encode_minimal as esc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static ASSET_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^image-([A-Za-z0-9]+)-(\d+x\d+)-([a-z]+)$").expect("sanity asset ref regex"));

/// Where Sanity image asset references resolve, e.g.
/// `https://cdn.sanity.io/images/<project>/<dataset>`.
#[derive(Debug, Clone, Default)]
pub struct PortableOptions {
    pub image_base: Option<String>,
}

/// Parse a Portable Text array, merging consecutive list items.
pub fn to_blocks(list: &Value, opts: &PortableOptions) -> Vec<Block> {
    let Some(list) = list.as_array() else {
        return Vec::new();
    };
    let mut blocks = Vec::new();
    let mut pending: Option<(bool, Vec<Block>)> = None;

    for node in list {
        let list_item = (str_at(node, "_type") == Some("block"))
            .then(|| str_at(node, "listItem"))
            .flatten();
        match list_item {
            Some(kind) => {
                let ordered = kind == "number";
                let item = Block::Paragraph(spans_to_html(node));
                if let Some((o, items)) = pending.as_mut() {
                    if *o == ordered {
                        items.push(item);
                        continue;
                    }
                }
                if let Some((ordered, items)) = pending.take() {
                    blocks.push(Block::List { ordered, items });
                }
                pending = Some((ordered, vec![item]));
            }
            None => {
                if let Some((ordered, items)) = pending.take() {
                    blocks.push(Block::List { ordered, items });
                }
                blocks.push(to_block(node, opts));
            }
        }
    }
    if let Some((ordered, items)) = pending.take() {
        blocks.push(Block::List { ordered, items });
    }
    blocks
}

/// Inline HTML of a text block's spans.
pub fn spans_to_html(node: &Value) -> String {
    let mark_defs: Vec<&Value> = node
        .get("markDefs")
        .and_then(Value::as_array)
        .map(|defs| defs.iter().collect())
        .unwrap_or_default();
    let Some(children) = node.get("children").and_then(Value::as_array) else {
        return String::new();
    };

    let mut html = String::new();
    for span in children {
        let text = span.get("text").and_then(Value::as_str).unwrap_or_default();
        let mut out = esc(text).replace('\n', "<br>");
        let marks = span.get("marks").and_then(Value::as_array).cloned().unwrap_or_default();
        for mark in marks.iter().filter_map(Value::as_str) {
            out = match mark {
                "strong" => format!("<b>{out}</b>"),
                "em" => format!("<i>{out}</i>"),
                "underline" => format!("<u>{out}</u>"),
                "code" => format!("<code>{out}</code>"),
                "strike-through" => format!("<s>{out}</s>"),
                key => match mark_defs.iter().find(|d| str_at(d, "_key") == Some(key)) {
                    Some(def) => match str_at(def, "href").or_else(|| str_at(def, "url")) {
                        Some(href) => format!(r#"<a href="{}">{out}</a>"#, esc(href)),
                        None => out,
                    },
                    None => out,
                },
            };
        }
        html.push_str(&out);
    }
    html
}

fn image_url(node: &Value, opts: &PortableOptions) -> Option<String> {
    if let Some(url) = str_at(node, "asset/url").or_else(|| str_at(node, "url")) {
        return Some(url.to_string());
    }
    let reference = str_at(node, "asset/_ref")?;
    let caps = ASSET_REF.captures(reference)?;
    let base = opts.image_base.as_deref()?;
    Some(format!("{}/{}-{}.{}", base.trim_end_matches('/'), &caps[1], &caps[2], &caps[3]))
}

/// Image node (inline or a lede photo field) to [`ImageBlock`].
pub fn image_block(node: &Value, opts: &PortableOptions) -> Option<ImageBlock> {
    Some(ImageBlock {
        url: image_url(node, opts)?,
        caption: str_at(node, "caption").map(str::to_string),
        credit: str_at(node, "credit").or_else(|| str_at(node, "attribution")).map(str::to_string),
        link: None,
    })
}

/// Parse one non-list Portable Text node.
pub fn to_block(node: &Value, opts: &PortableOptions) -> Block {
    let kind = str_at(node, "_type").unwrap_or("(missing)");
    match kind {
        "block" => {
            let html = spans_to_html(node);
            match str_at(node, "style").unwrap_or("normal") {
                "h1" => Block::Heading { level: 1, html },
                "h2" => Block::Heading { level: 2, html },
                "h3" => Block::Heading { level: 3, html },
                "h4" => Block::Heading { level: 4, html },
                "h5" | "h6" => Block::Heading { level: 5, html },
                "blockquote" => Block::Quote {
                    html: format!("<p>{html}</p>"),
                    cite: None,
                    pull: false,
                },
                _ => Block::Paragraph(html),
            }
        }
        "image" | "mainImage" | "figure" => match image_block(node, opts) {
            Some(image) => Block::Image(image),
            None => Block::unknown("image (unresolved asset)", node),
        },
        "gallery" | "imageGallery" => Block::Gallery {
            title: str_at(node, "title").map(str::to_string),
            images: node
                .get("images")
                .and_then(Value::as_array)
                .map(|imgs| imgs.iter().filter_map(|i| image_block(i, opts)).collect())
                .unwrap_or_default(),
        },
        "youtube" | "embed" | "twitter" | "tweet" | "instagram" | "tiktok" | "oembed" => {
            match str_at(node, "url").or_else(|| str_at(node, "href")) {
                Some(url) => Block::Embed { url: url.to_string() },
                None => Block::unknown(format!("{kind} (no url)"), node),
            }
        }
        "pullquote" | "pullQuote" | "quote" => {
            let text = str_at(node, "text").or_else(|| str_at(node, "quote")).unwrap_or_default();
            Block::Quote {
                html: format!("<p>{}</p>", esc(text)),
                cite: str_at(node, "attribution").or_else(|| str_at(node, "author")).map(str::to_string),
                pull: kind != "quote",
            }
        }
        "video" => match str_at(node, "url").or_else(|| str_at(node, "asset/url")) {
            Some(src) => Block::Video {
                src: src.to_string(),
                mime_type: if src.contains(".m3u8") {
                    "application/x-mpegURL".to_string()
                } else {
                    "video/mp4".to_string()
                },
                poster: str_at(node, "poster").map(str::to_string),
                caption: str_at(node, "caption").map(str::to_string),
            },
            None => Block::unknown("video (no url)", node),
        },
        "divider" | "break" | "hr" => Block::Divider,
        "html" | "rawHtml" => Block::RawHtml(str_at(node, "html").or_else(|| str_at(node, "code")).unwrap_or_default().to_string()),
        "table" => Block::Table {
            header: Vec::new(),
            rows: node
                .get("rows")
                .and_then(Value::as_array)
                .map(|rows| {
                    rows.iter()
                        .map(|r| {
                            r.get("cells")
                                .and_then(Value::as_array)
                                .map(|c| c.iter().map(|v| esc(v.as_str().unwrap_or_default())).collect())
                                .unwrap_or_default()
                        })
                        .collect()
                })
                .unwrap_or_default(),
        },
        other => Block::unknown(other, node),
    }
}
