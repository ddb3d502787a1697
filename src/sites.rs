//! Site registry: the persisted per-domain configuration records.
//!
//! A [`SiteConfig`] holds everything a handler needs to know about one site
//! (which handler module serves it, the cached Next.js build id, API paths,
//! timezone, selectors). Records are read once per call and written back
//! through [`SiteRegistry::put_site`] when a handler learns something new,
//! typically a rotated build id.
//!
//! Writes are last-write-wins. Two processes refreshing the same domain at
//! once are not linearizable; the registry is meant for a single polling
//! reader process.

use crate::error::RegistryError;
use crate::utils::{parse_offset, site_key};
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info, instrument, warn};

/// One site's configuration record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Handler module serving this site (`wp_posts`, `nextjs`, `fusion`, ...).
    #[serde(default)]
    pub module: String,
    #[serde(rename = "buildId", default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// WordPress REST prefix, `/wp-json/wp/v2` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wpjson_path: Option<String>,
    /// WordPress post type collection, `posts` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts_path: Option<String>,
    /// Fixed UTC offset (`-05:00`) for sites publishing offset-less dates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Default author name when a post carries none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lede_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_link_selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_link_pattern: Option<String>,
    /// Arc Fusion content source for single stories.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_source: Option<String>,
    /// Arc Fusion content source for section feeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_source: Option<String>,
    /// Arc Fusion deployment id; rotates like a build id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Sub-feeds aggregated into one feed (RSS sites, podcast networks).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feeds: Vec<String>,
    /// Keys this crate doesn't model, preserved on write.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SiteConfig {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            ..Self::default()
        }
    }

    pub fn tz(&self) -> Option<FixedOffset> {
        self.timezone.as_deref().and_then(parse_offset)
    }
}

/// Repository interface over the site registry.
pub trait SiteRegistry {
    fn get_site(&self, key: &str) -> Option<SiteConfig>;

    fn put_site(&self, key: &str, site: &SiteConfig) -> Result<(), RegistryError>;
}

/// Persist a mutated record under `key`.
///
/// Failures are logged; the caller already has the fresh value in hand and
/// carries on with it.
pub fn update_sites<R: SiteRegistry>(registry: &R, key: &str, site: &SiteConfig) {
    match registry.put_site(key, site) {
        Ok(()) => info!(site = %key, "Updated site registry"),
        Err(e) => error!(site = %key, error = %e, "Failed to update site registry"),
    }
}

/// Registry backed by a `sites.json` file mapping domain to record.
#[derive(Debug)]
pub struct JsonFileRegistry {
    path: PathBuf,
    sites: Mutex<BTreeMap<String, SiteConfig>>,
}

impl JsonFileRegistry {
    /// Open the registry; a missing file starts an empty registry.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref().to_path_buf();
        let sites = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            serde_json::from_str(&raw)?
        } else {
            warn!("Site registry not found; starting empty");
            BTreeMap::new()
        };
        info!(count = sites.len(), "Loaded site registry");
        Ok(Self {
            path,
            sites: Mutex::new(sites),
        })
    }

    /// Look up the record for a URL, trying the bare domain after the host.
    pub fn site_for_url(&self, url: &str) -> Option<(String, SiteConfig)> {
        let key = site_key(url)?;
        if let Some(site) = self.get_site(&key) {
            return Some((key, site));
        }
        let parts: Vec<&str> = key.split('.').collect();
        if parts.len() > 2 {
            let domain = parts[parts.len() - 2..].join(".");
            return self.get_site(&domain).map(|site| (domain, site));
        }
        None
    }
}

impl SiteRegistry for JsonFileRegistry {
    fn get_site(&self, key: &str) -> Option<SiteConfig> {
        let sites = self.sites.lock().unwrap_or_else(|e| e.into_inner());
        sites.get(key).cloned()
    }

    fn put_site(&self, key: &str, site: &SiteConfig) -> Result<(), RegistryError> {
        let mut sites = self.sites.lock().unwrap_or_else(|e| e.into_inner());
        sites.insert(key.to_string(), site.clone());
        let json = serde_json::to_string_pretty(&*sites)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
