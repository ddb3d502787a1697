//! Runtime configuration.
//!
//! Two layers live here:
//! - [`Settings`]: process-wide settings loaded from an optional YAML file
//!   (proxy server base URL, HTTP client tuning, file locations).
//! - [`Args`]: the per-request handler options (`max`, `age`, `embed`, lede
//!   toggles, keyword filters) that every `get_content`/`get_feed` receives.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

/// Process-wide settings.
///
/// Every field has a default so a missing or partial `config.yaml` is fine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the companion image/video proxy referenced in generated HTML.
    pub server: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Default retry budget for fetches that don't ask for their own.
    pub retries: usize,
    /// Initial backoff between retries, doubled on every attempt.
    pub retry_base_ms: u64,
    /// Optional outbound proxy, used only by fetches that opt in.
    pub proxy: Option<String>,
    pub debug_dir: String,
    pub sites_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: "http://localhost:8080".to_string(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 10,
            retries: 3,
            retry_base_ms: 500,
            proxy: None,
            debug_dir: "./debug".to_string(),
            sites_path: "./sites.json".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file. A missing file yields the defaults.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file; using default settings");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&raw)?;
        info!(server = %settings.server, "Loaded settings");
        Ok(settings)
    }
}

/// Per-request handler options.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Args {
    /// Cap on the number of feed items returned. `None` collects everything.
    pub max: Option<usize>,
    /// Only keep items published within this many hours.
    pub age: Option<f64>,
    /// Return a compact preview card instead of the full content.
    pub embed: bool,
    pub nolead: bool,
    pub no_lede_caption: bool,
    pub add_lede_img: bool,
    pub add_subtitle: bool,
    pub removeimage: bool,
    pub addledeimage: bool,
    /// Keep only items mentioning one of these terms.
    pub keywords: Vec<String>,
    /// Drop items mentioning any of these terms.
    pub exclude: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let settings: Settings = serde_yaml::from_str("server: https://proxy.test\nretries: 1\n").unwrap();
        assert_eq!(settings.server, "https://proxy.test");
        assert_eq!(settings.retries, 1);
        assert_eq!(settings.timeout_secs, 10);
        assert_eq!(settings.debug_dir, "./debug");
    }

    #[test]
    fn test_missing_config_is_default() {
        let settings = Settings::load("/nonexistent/feed_handlers/config.yaml").unwrap();
        assert_eq!(settings, Settings::default());
    }
}
