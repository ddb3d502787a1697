use crate::config::Settings;
use crate::error::{FetchError, RegistryError};
use crate::fetch::{Fetch, FetchOptions, PostBody};
use crate::handlers::Context;
use crate::sites::{SiteConfig, SiteRegistry};
use reqwest::StatusCode;
use std::cell::RefCell;
use std::collections::HashMap;

/// In-memory fetcher: exact URL to body. Unrouted URLs answer 404.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    routes: HashMap<String, String>,
    pub requests: RefCell<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, body: impl Into<String>) -> Self {
        self.routes.insert(url.to_string(), body.into());
        self
    }

    pub fn json(self, url: &str, body: serde_json::Value) -> Self {
        self.route(url, body.to_string())
    }

    pub fn requested(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|u| *u == url).count()
    }
}

impl Fetch for StaticFetcher {
    async fn get(&self, url: &str, _opts: &FetchOptions) -> Result<String, FetchError> {
        self.requests.borrow_mut().push(url.to_string());
        self.routes
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status(StatusCode::NOT_FOUND, url.to_string()))
    }

    async fn post(&self, url: &str, _body: &PostBody, opts: &FetchOptions) -> Result<String, FetchError> {
        self.get(url, opts).await
    }
}

/// In-memory registry that records every write.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    pub sites: RefCell<HashMap<String, SiteConfig>>,
    pub writes: RefCell<Vec<String>>,
}

impl SiteRegistry for MemoryRegistry {
    fn get_site(&self, key: &str) -> Option<SiteConfig> {
        self.sites.borrow().get(key).cloned()
    }

    fn put_site(&self, key: &str, site: &SiteConfig) -> Result<(), RegistryError> {
        self.writes.borrow_mut().push(key.to_string());
        self.sites.borrow_mut().insert(key.to_string(), site.clone());
        Ok(())
    }
}

pub fn test_settings() -> Settings {
    Settings {
        server: "https://proxy.test".to_string(),
        debug_dir: std::env::temp_dir()
            .join("feed_handlers_debug")
            .to_string_lossy()
            .into_owned(),
        ..Settings::default()
    }
}

pub fn context<'a>(
    fetcher: &'a StaticFetcher,
    registry: &'a MemoryRegistry,
    settings: &'a Settings,
) -> Context<'a, StaticFetcher, MemoryRegistry> {
    Context {
        fetcher,
        registry,
        settings,
        site_key: "x.test",
        save_debug: false,
    }
}
