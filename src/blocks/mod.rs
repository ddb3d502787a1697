//! Typed content blocks and their HTML renderer.
//!
//! Structured content (Arc ANS `content_elements`, Sanity Portable Text,
//! Drupal paragraphs) is parsed by a dialect module into [`Block`] values,
//! then rendered here in document order.
//!
//! - Containers recurse with the same [`RenderContext`].
//! - Galleries are collected during the pass and appended after a
//!   "Photo Gallery" heading by [`render_document`].
//! - [`Block::Unknown`] renders as nothing, logs one warning and is recorded
//!   in [`RenderContext::unknown`]; one unknown block never stops the rest.

pub mod drupal;
pub mod fusion;
pub mod portable;

use crate::html::snippets::{add_audio, add_bar, add_blockquote, add_embed, add_image, add_pullquote, add_video};
use htmlescape::encode_minimal as esc;
use serde_json::Value;
use tracing::warn;

/// An image with its caption parts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageBlock {
    pub url: String,
    pub caption: Option<String>,
    pub credit: Option<String>,
    pub link: Option<String>,
}

impl ImageBlock {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Caption and credit joined with `" | "`.
    pub fn caption_html(&self) -> Option<String> {
        let parts: Vec<&str> = [self.caption.as_deref(), self.credit.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() { None } else { Some(parts.join(" | ")) }
    }

    pub fn to_html(&self) -> String {
        add_image(&self.url, self.caption_html().as_deref(), self.link.as_deref())
    }
}

/// One unit of structured content.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Inline HTML of a paragraph.
    Paragraph(String),
    Heading { level: u8, html: String },
    Image(ImageBlock),
    Gallery { title: Option<String>, images: Vec<ImageBlock> },
    /// Third-party embed (YouTube, X, Instagram, ...).
    Embed { url: String },
    Video {
        src: String,
        mime_type: String,
        poster: Option<String>,
        caption: Option<String>,
    },
    Audio {
        src: String,
        title: String,
        duration_secs: Option<u64>,
    },
    List { ordered: bool, items: Vec<Block> },
    Table { header: Vec<String>, rows: Vec<Vec<String>> },
    Quote { html: String, cite: Option<String>, pull: bool },
    Divider,
    /// Section label rendered as a bar.
    Bar(String),
    RawHtml(String),
    Container(Vec<Block>),
    Unknown { kind: String, raw: Value },
}

impl Block {
    pub fn unknown(kind: impl Into<String>, raw: &Value) -> Self {
        Block::Unknown {
            kind: kind.into(),
            raw: raw.clone(),
        }
    }

    fn is_empty_container(&self) -> bool {
        matches!(self, Block::Container(children) if children.is_empty())
    }
}

/// Mutable state for one render pass.
#[derive(Debug)]
pub struct RenderContext<'a> {
    /// Source URL, for log context.
    pub url: &'a str,
    /// Proxy server base URL for video/audio snippets.
    pub server: &'a str,
    galleries: Vec<Block>,
    /// Kinds of unknown blocks met, in order.
    pub unknown: Vec<String>,
}

impl<'a> RenderContext<'a> {
    pub fn new(url: &'a str, server: &'a str) -> Self {
        Self {
            url,
            server,
            galleries: Vec::new(),
            unknown: Vec::new(),
        }
    }
}

/// Whether the first meaningful block is an image or gallery, so callers
/// know not to synthesize a separate lede image.
pub fn first_is_image(blocks: &[Block]) -> bool {
    match blocks.iter().find(|b| !b.is_empty_container()) {
        Some(Block::Image(_)) | Some(Block::Gallery { .. }) => true,
        Some(Block::Container(children)) => first_is_image(children),
        _ => false,
    }
}

/// Render blocks in order. Galleries are held back in the context.
pub fn render(blocks: &[Block], ctx: &mut RenderContext<'_>) -> String {
    blocks.iter().map(|b| render_block(b, ctx)).collect()
}

/// Render blocks, then append any deferred galleries.
pub fn render_document(blocks: &[Block], ctx: &mut RenderContext<'_>) -> String {
    let mut html = render(blocks, ctx);
    html.push_str(&render_galleries(ctx));
    html
}

/// Drain deferred galleries into a "Photo Gallery" section.
pub fn render_galleries(ctx: &mut RenderContext<'_>) -> String {
    if ctx.galleries.is_empty() {
        return String::new();
    }
    let mut html = String::from("<h2>Photo Gallery</h2>");
    for gallery in std::mem::take(&mut ctx.galleries) {
        if let Block::Gallery { title, images } = gallery {
            if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
                html.push_str(&format!("<h3>{}</h3>", esc(&title)));
            }
            for image in &images {
                html.push_str(&image.to_html());
            }
        }
    }
    html
}

fn render_block(block: &Block, ctx: &mut RenderContext<'_>) -> String {
    match block {
        Block::Paragraph(html) => {
            if html.trim().is_empty() {
                String::new()
            } else {
                format!("<p>{html}</p>")
            }
        }
        Block::Heading { level, html } => {
            let level = (*level).clamp(1, 6);
            format!("<h{level}>{html}</h{level}>")
        }
        Block::Image(image) => image.to_html(),
        Block::Gallery { images, .. } => {
            if !images.is_empty() {
                ctx.galleries.push(block.clone());
            }
            String::new()
        }
        Block::Embed { url } => add_embed(url),
        Block::Video {
            src,
            mime_type,
            poster,
            caption,
        } => add_video(src, mime_type, poster.as_deref(), caption.as_deref(), ctx.server),
        Block::Audio {
            src,
            title,
            duration_secs,
        } => add_audio(src, title, None, *duration_secs, ctx.server),
        Block::List { ordered, items } => {
            let tag = if *ordered { "ol" } else { "ul" };
            let mut html = format!("<{tag}>");
            for item in items {
                let inner = match item {
                    Block::Paragraph(html) => html.clone(),
                    other => render_block(other, ctx),
                };
                html.push_str(&format!("<li>{inner}</li>"));
            }
            html.push_str(&format!("</{tag}>"));
            html
        }
        Block::Table { header, rows } => {
            let mut html = String::from(r#"<table style="width:100%; border-collapse:collapse;">"#);
            if !header.is_empty() {
                html.push_str("<tr>");
                for cell in header {
                    html.push_str(&format!(r#"<th style="border:1px solid #ccc; padding:4px;">{cell}</th>"#));
                }
                html.push_str("</tr>");
            }
            for row in rows {
                html.push_str("<tr>");
                for cell in row {
                    html.push_str(&format!(r#"<td style="border:1px solid #ccc; padding:4px;">{cell}</td>"#));
                }
                html.push_str("</tr>");
            }
            html.push_str("</table>");
            html
        }
        Block::Quote { html, cite, pull } => {
            if *pull {
                add_pullquote(html, cite.as_deref())
            } else {
                let mut inner = html.clone();
                if let Some(cite) = cite.as_deref().filter(|c| !c.trim().is_empty()) {
                    inner.push_str(&format!("<br><cite>— {}</cite>", esc(cite)));
                }
                add_blockquote(&inner)
            }
        }
        Block::Divider => "<hr>".to_string(),
        Block::Bar(text) => add_bar(text),
        Block::RawHtml(html) => html.clone(),
        Block::Container(children) => render(children, ctx),
        Block::Unknown { kind, .. } => {
            warn!(url = %ctx.url, %kind, "Unhandled content block type");
            ctx.unknown.push(kind.clone());
            String::new()
        }
    }
}

/// Read a string at a `/`-separated path inside a JSON value.
pub(crate) fn str_at<'v>(value: &'v Value, path: &str) -> Option<&'v str> {
    let mut cur = value;
    for key in path.split('/') {
        cur = match cur {
            Value::Array(list) => list.get(key.parse::<usize>().ok()?)?,
            _ => cur.get(key)?,
        };
    }
    cur.as_str().filter(|s| !s.trim().is_empty())
}
