//! Drupal paragraph entity parser.
//!
//! Drupal serializes field values in several shapes (`"x"`,
//! `{"processed": "x"}`, `{"value": "x"}`, `[{"value": "x"}]`); [`field`]
//! reads any of them.

use super::{Block, ImageBlock};
use serde_json::Value;

/// Read a Drupal field value as a string, whatever its wrapping.
pub fn field<'v>(entity: &'v Value, name: &str) -> Option<&'v str> {
    unwrap_field(entity.get(name)?)
}

fn unwrap_field(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()).filter(|s| !s.trim().is_empty()),
        Value::Array(list) => list.first().and_then(unwrap_field),
        Value::Object(map) => ["processed", "value", "url", "uri", "target_id"]
            .iter()
            .find_map(|k| map.get(*k).and_then(unwrap_field)),
        _ => None,
    }
}

fn image(entity: &Value) -> Option<ImageBlock> {
    let url = field(entity, "field_image")
        .or_else(|| field(entity, "field_media_image"))
        .or_else(|| field(entity, "url"))?;
    Some(ImageBlock {
        url: url.to_string(),
        caption: field(entity, "field_caption").map(str::to_string),
        credit: field(entity, "field_credit").map(str::to_string),
        link: None,
    })
}

/// Parse a list of paragraph entities.
pub fn to_blocks(paragraphs: &Value) -> Vec<Block> {
    paragraphs
        .as_array()
        .map(|list| list.iter().map(to_block).collect())
        .unwrap_or_default()
}

/// Parse one paragraph entity by its `type` bundle.
pub fn to_block(entity: &Value) -> Block {
    let bundle = entity
        .get("type")
        .and_then(unwrap_field)
        .unwrap_or("(missing)");
    match bundle.trim_start_matches("paragraph--") {
        "text" | "body" | "rich_text" => Block::RawHtml(
            field(entity, "field_text")
                .or_else(|| field(entity, "field_body"))
                .unwrap_or_default()
                .to_string(),
        ),
        "heading" | "subheading" => Block::Heading {
            level: 2,
            html: field(entity, "field_heading")
                .or_else(|| field(entity, "field_title"))
                .unwrap_or_default()
                .to_string(),
        },
        "image" => match image(entity) {
            Some(image) => Block::Image(image),
            None => Block::unknown("paragraph--image (no url)", entity),
        },
        "gallery" | "slideshow" => Block::Gallery {
            title: field(entity, "field_title").map(str::to_string),
            images: entity
                .get("field_images")
                .or_else(|| entity.get("field_slides"))
                .and_then(Value::as_array)
                .map(|list| list.iter().filter_map(image).collect())
                .unwrap_or_default(),
        },
        "embed" | "social_embed" | "media_embed" => {
            match field(entity, "field_url").or_else(|| field(entity, "field_embed_url")) {
                Some(url) => Block::Embed { url: url.to_string() },
                None => match field(entity, "field_embed_code") {
                    Some(code) => Block::RawHtml(code.to_string()),
                    None => Block::unknown(bundle, entity),
                },
            }
        }
        "quote" | "blockquote" | "pull_quote" | "pullquote" => Block::Quote {
            html: format!("<p>{}</p>", field(entity, "field_quote").unwrap_or_default()),
            cite: field(entity, "field_attribution")
                .or_else(|| field(entity, "field_author"))
                .map(str::to_string),
            pull: bundle.contains("pull"),
        },
        "video" => match field(entity, "field_video_url") {
            Some(src) => Block::Video {
                src: src.to_string(),
                mime_type: if src.contains(".m3u8") {
                    "application/x-mpegURL".to_string()
                } else {
                    "video/mp4".to_string()
                },
                poster: field(entity, "field_poster").map(str::to_string),
                caption: field(entity, "field_caption").map(str::to_string),
            },
            None => match field(entity, "field_video_embed") {
                Some(url) => Block::Embed { url: url.to_string() },
                None => Block::unknown(bundle, entity),
            },
        },
        "section" | "group" | "container" => {
            Block::Container(to_blocks(entity.get("field_paragraphs").unwrap_or(&Value::Null)))
        }
        "divider" | "separator" => Block::Divider,
        _ => Block::unknown(bundle, entity),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{RenderContext, render_document};
    use serde_json::json;

    #[test]
    fn test_field_shapes() {
        let e = json!({
            "a": "plain",
            "b": {"processed": "<p>p</p>", "value": "raw"},
            "c": [{"value": "listed"}],
            "d": [],
            "e": "  "
        });
        assert_eq!(field(&e, "a"), Some("plain"));
        assert_eq!(field(&e, "b"), Some("<p>p</p>"));
        assert_eq!(field(&e, "c"), Some("listed"));
        assert_eq!(field(&e, "d"), None);
        assert_eq!(field(&e, "e"), None);
    }

    #[test]
    fn test_paragraphs_render() {
        let paragraphs = json!([
            {"type": [{"target_id": "text"}], "field_text": [{"processed": "<p>Body</p>"}]},
            {"type": "paragraph--section", "field_paragraphs": [
                {"type": "paragraph--pull_quote", "field_quote": "Big words", "field_attribution": "Cy"},
                {"type": "paragraph--image", "field_image": {"url": "https://x.test/i.jpg"}, "field_caption": "Cap"}
            ]},
            {"type": "paragraph--newsletter_signup"}
        ]);
        let blocks = to_blocks(&paragraphs);
        let mut ctx = RenderContext::new("https://x.test/node/1", "https://proxy.test");
        let html = render_document(&blocks, &mut ctx);
        assert!(html.starts_with("<p>Body</p>"));
        assert!(html.contains(r#"data-fh="pullquote""#));
        assert!(html.contains("<cite>— Cy</cite>"));
        assert!(html.contains("https://x.test/i.jpg"));
        assert_eq!(ctx.unknown, ["paragraph--newsletter_signup"]);
    }
}
