//! Data models for normalized items and feeds.
//!
//! This module defines the shared output schema every handler produces:
//! - [`Item`]: one normalized article, post, video or episode
//! - [`Feed`]: a JSON Feed envelope holding items sorted newest first
//! - [`Author`], [`Attachment`]: nested value types
//!
//! Fields prefixed with `_` in the JSON Feed world (`_timestamp`,
//! `_display_date`, `_audio`, `_video`) are internal and never serialized.
//! Optional fields that are empty are absent from the JSON output, and the
//! "empty tags means no tags key" rule is enforced by [`Item::set_tags`].

use crate::utils::{dedupe_case_insensitive, format_display_date, join_names};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An item author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An enclosure such as a podcast episode or a video file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_in_seconds: Option<u64>,
}

/// A normalized item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Site-local identifier, stable per source post.
    pub id: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_published: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<DateTime<Utc>>,
    /// Sort key derived from `date_published`.
    #[serde(skip)]
    pub timestamp: Option<f64>,
    #[serde(skip)]
    pub display_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(rename = "image", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(skip)]
    pub audio: Option<String>,
    #[serde(skip)]
    pub video: Option<String>,
}

impl Item {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// Set the publish date together with its derived sort key and display date.
    pub fn set_published(&mut self, dt: DateTime<Utc>) {
        self.timestamp = Some(dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_millis()) / 1000.0);
        self.display_date = Some(format_display_date(&dt));
        self.date_published = Some(dt);
    }

    /// Set the author list; the merged `author` joins names as "A, B and C".
    pub fn set_authors<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = dedupe_case_insensitive(
            names
                .into_iter()
                .map(Into::into)
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
        );
        if names.is_empty() {
            self.author = None;
            self.authors.clear();
            return;
        }
        self.author = Some(Author::new(join_names(&names)));
        self.authors = names.into_iter().map(Author::new).collect();
    }

    /// Set tags, dropping blanks and case-insensitive duplicates.
    /// An empty result leaves the item without tags.
    pub fn set_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags = dedupe_case_insensitive(
            tags.into_iter()
                .map(Into::into)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
        );
        self.tags = if tags.is_empty() { None } else { Some(tags) };
    }

    pub fn tags(&self) -> Option<&[String]> {
        self.tags.as_deref()
    }

    /// A compact preview card for `args.embed` requests.
    pub fn preview_card(&self) -> String {
        let mut html = String::from(r#"<div style="width:100%; min-width:320px; max-width:540px; margin-left:auto; margin-right:auto; padding:0; border:1px solid black; border-radius:10px;">"#);
        if let Some(image) = &self.image {
            html.push_str(&format!(
                r#"<a href="{}"><img src="{}" style="width:100%; border-top-left-radius:10px; border-top-right-radius:10px;"></a>"#,
                htmlescape::encode_minimal(&self.url),
                htmlescape::encode_minimal(image)
            ));
        }
        html.push_str(r#"<div style="margin:8px 8px 0 8px;">"#);
        if let Some(title) = &self.title {
            html.push_str(&format!(
                r#"<div style="font-size:1.2em; font-weight:bold;"><a href="{}">{}</a></div>"#,
                htmlescape::encode_minimal(&self.url),
                htmlescape::encode_minimal(title)
            ));
        }
        if let Some(author) = &self.author {
            html.push_str(&format!("<div>{}</div>", htmlescape::encode_minimal(&author.name)));
        }
        if let Some(date) = &self.display_date {
            html.push_str(&format!(r#"<div style="font-size:0.9em;">{date}</div>"#));
        }
        if let Some(summary) = &self.summary {
            html.push_str(&format!("<p>{}</p>", htmlescape::encode_minimal(summary)));
        }
        html.push_str("</div></div>");
        html
    }
}

/// A JSON Feed envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,
    pub items: Vec<Item>,
}

impl Default for Feed {
    fn default() -> Self {
        Self::new()
    }
}

impl Feed {
    /// An empty JSON Feed 1.1 envelope.
    pub fn new() -> Self {
        Self {
            version: "https://jsonfeed.org/version/1.1".to_string(),
            title: None,
            home_page_url: None,
            feed_url: None,
            items: Vec::new(),
        }
    }

    /// Sort items newest first. Items without a timestamp go last.
    pub fn sort_items(&mut self) {
        self.items.sort_by(|a, b| {
            let a = a.timestamp.unwrap_or(f64::MIN);
            let b = b.timestamp.unwrap_or(f64::MIN);
            b.total_cmp(&a)
        });
    }
}
