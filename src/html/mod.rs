//! HTML fragment rewriting.
//!
//! Content renderers parse a fragment with `scraper`, walk the element tree
//! and ask a rule what to do with each element ([`Rewrite`]). Output is
//! re-serialized in one canonical form: attributes sorted by name, values
//! double-quoted and escaped, comments dropped, void elements without a
//! closing tag.
//!
//! Elements carrying a `data-fh` attribute of a known kind are snippets this
//! crate already produced (see [`snippets`]); the walker copies them through
//! untouched as long as nothing inside them is active content. Any other
//! `data-fh` element loses the marker and goes through the rule like the
//! rest of the fragment. Together with the canonical form this makes every
//! rewrite idempotent: running the same rules over their own output changes
//! nothing.

pub mod snippets;

use once_cell::sync::Lazy;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Marker attribute on normalized snippets.
pub const SNIPPET_ATTR: &str = "data-fh";

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source", "track", "wbr",
];

/// `data-fh` values emitted by [`snippets`].
const SNIPPET_KINDS: &[&str] = &["image", "video", "audio", "embed", "blockquote", "pullquote", "button", "bar"];

/// Elements never found inside a snippet.
const ACTIVE_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "frame", "frameset", "object", "embed", "applet", "form", "base", "link",
    "meta",
];

static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("img selector"));

/// What to do with one element.
#[derive(Debug, Clone, PartialEq)]
pub enum Rewrite {
    /// Emit the element and keep walking its children.
    Keep,
    /// Drop the element and everything inside it.
    Remove,
    /// Emit the given HTML instead of the element.
    Replace(String),
    /// Drop the tags but keep walking the children.
    Unwrap,
    /// Keep the element with these attributes instead of its own.
    Attrs(Vec<(String, String)>),
}

/// Rewrite a fragment with `rule`, then canonicalize the result.
pub fn rewrite_fragment(html: &str, mut rule: impl FnMut(ElementRef<'_>) -> Rewrite) -> String {
    let first = walk(html, &mut rule);
    canonicalize(&first)
}

/// Re-serialize a fragment without changing anything but its form.
pub fn canonicalize(html: &str) -> String {
    walk(html, &mut |_| Rewrite::Keep)
}

fn walk(html: &str, rule: &mut dyn FnMut(ElementRef<'_>) -> Rewrite) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    write_children(fragment.root_element(), rule, &mut out);
    out
}

fn write_children(parent: ElementRef<'_>, rule: &mut dyn FnMut(ElementRef<'_>) -> Rewrite, out: &mut String) {
    let raw_text = matches!(parent.value().name(), "script" | "style");
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => {
                if raw_text {
                    out.push_str(text);
                } else {
                    out.push_str(&htmlescape::encode_minimal(text));
                }
            }
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    write_element(el, rule, out);
                }
            }
            _ => {}
        }
    }
}

/// Event handlers and `javascript:` URLs.
fn is_active_attr(name: &str, value: &str) -> bool {
    name.to_ascii_lowercase().starts_with("on") || value.trim_start().to_ascii_lowercase().starts_with("javascript:")
}

/// Whether `el` is a snippet built by this crate and safe to copy verbatim.
fn is_trusted_snippet(el: ElementRef<'_>) -> bool {
    let Some(kind) = el.value().attr(SNIPPET_ATTR) else {
        return false;
    };
    SNIPPET_KINDS.contains(&kind)
        && el.descendants().filter_map(ElementRef::wrap).all(|node| {
            let value = node.value();
            !ACTIVE_ELEMENTS.contains(&value.name()) && !value.attrs().any(|(k, v)| is_active_attr(k, v))
        })
}

fn write_element(el: ElementRef<'_>, rule: &mut dyn FnMut(ElementRef<'_>) -> Rewrite, out: &mut String) {
    if is_trusted_snippet(el) {
        write_tag(el, None, &mut |_| Rewrite::Keep, out);
        return;
    }
    match rule(el) {
        Rewrite::Keep => {
            let attrs = el
                .value()
                .attrs()
                .filter(|(k, v)| *k != SNIPPET_ATTR && !is_active_attr(k, v))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            write_tag(el, Some(attrs), rule, out)
        }
        Rewrite::Attrs(attrs) => {
            let attrs = attrs.into_iter().filter(|(k, v)| !is_active_attr(k, v)).collect();
            write_tag(el, Some(attrs), rule, out)
        }
        Rewrite::Remove => {}
        Rewrite::Replace(html) => out.push_str(&html),
        Rewrite::Unwrap => write_children(el, rule, out),
    }
}

fn write_tag(
    el: ElementRef<'_>,
    attrs: Option<Vec<(String, String)>>,
    rule: &mut dyn FnMut(ElementRef<'_>) -> Rewrite,
    out: &mut String,
) {
    let name = el.value().name();
    let mut attrs = attrs.unwrap_or_else(|| {
        el.value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    });
    attrs.sort_by(|a, b| a.0.cmp(&b.0));

    out.push('<');
    out.push_str(name);
    for (k, v) in &attrs {
        out.push(' ');
        out.push_str(k);
        out.push_str("=\"");
        out.push_str(&htmlescape::encode_minimal(v));
        out.push('"');
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&name) {
        return;
    }
    write_children(el, rule, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Serialize an element's children canonically.
pub fn inner_html(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    write_children(el, &mut |_| Rewrite::Keep, &mut out);
    out
}

pub fn has_class(el: ElementRef<'_>, class: &str) -> bool {
    el.value().classes().any(|c| c == class)
}

pub fn class_contains(el: ElementRef<'_>, needle: &str) -> bool {
    el.value().classes().any(|c| c.contains(needle))
}

/// Collapsed text content of an element.
pub fn text_of(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn select_first<'a>(el: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    el.select(selector).next()
}

/// Best image URL of an `<img>`: widest `srcset`/`data-srcset` candidate,
/// then lazy-load attributes, then `src`.
pub fn img_src(img: ElementRef<'_>) -> Option<String> {
    let value = img.value();
    for attr in ["srcset", "data-srcset"] {
        if let Some(src) = value.attr(attr).and_then(|s| crate::utils::image_from_srcset(s, None)) {
            return Some(src);
        }
    }
    ["data-src", "data-lazy-src", "data-orig-file", "src"]
        .iter()
        .filter_map(|a| value.attr(a))
        .find(|s| !s.is_empty() && !s.starts_with("data:"))
        .map(str::to_string)
}

/// First image URL inside an element (or the element itself).
pub fn first_img_src(el: ElementRef<'_>) -> Option<String> {
    if el.value().name() == "img" {
        return img_src(el);
    }
    select_first(el, &IMG).and_then(img_src)
}
