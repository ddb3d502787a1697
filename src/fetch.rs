//! Fetch layer with exponential backoff retry logic.
//!
//! Every handler talks to the network through the [`Fetch`] trait so the
//! site-specific code never touches `reqwest` directly and can be exercised
//! offline in tests.
//!
//! # Architecture
//!
//! - [`Fetch`]: core trait for GET/POST returning the response body
//! - [`HttpFetcher`]: `reqwest`-backed implementation
//! - [`RetryFetch`]: decorator that adds retry logic to any `Fetch`
//! - [`get_url_html`], [`get_url_json`], [`post_url`]: the helpers handlers
//!   call; they log failures and return `None`
//!
//! # Retry Strategy
//!
//! - Retry budget comes from [`FetchOptions::retries`], falling back to the
//!   decorator's default
//! - Exponential backoff from `base_delay`, capped at `max_delay`
//! - Random jitter (0-250ms) added when the base delay is non-zero
//! - Final client errors (404 and friends) are never retried

use crate::config::Settings;
use crate::error::FetchError;
use rand::{Rng, rng};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde_json::Value;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};
use url::Url;

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Number of retries after the first attempt; `None` uses the default.
    pub retries: Option<usize>,
    pub headers: Vec<(String, String)>,
    pub user_agent: Option<String>,
    /// Route the request through [`Settings::proxy`] when one is configured.
    pub use_proxy: bool,
}

impl FetchOptions {
    pub fn with_retries(retries: usize) -> Self {
        Self {
            retries: Some(retries),
            ..Self::default()
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Request body for [`Fetch::post`].
#[derive(Debug, Clone)]
pub enum PostBody {
    Json(Value),
    Form(Vec<(String, String)>),
}

/// Trait for fetching remote documents.
///
/// Implementors return the raw response body, or a [`FetchError`] for
/// non-success statuses and transport failures.
pub trait Fetch {
    async fn get(&self, url: &str, opts: &FetchOptions) -> Result<String, FetchError>;

    async fn post(&self, url: &str, body: &PostBody, opts: &FetchOptions) -> Result<String, FetchError>;
}

/// `reqwest`-backed [`Fetch`] implementation.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    proxied: Option<reqwest::Client>,
}

impl HttpFetcher {
    pub fn new(settings: &Settings) -> Result<Self, FetchError> {
        let timeout = StdDuration::from_secs(settings.timeout_secs);
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(timeout)
            .build()?;
        let proxied = match &settings.proxy {
            Some(proxy) => Some(
                reqwest::Client::builder()
                    .user_agent(settings.user_agent.as_str())
                    .timeout(timeout)
                    .proxy(reqwest::Proxy::all(proxy)?)
                    .build()?,
            ),
            None => None,
        };
        Ok(Self { client, proxied })
    }

    fn client_for(&self, opts: &FetchOptions) -> &reqwest::Client {
        match (&self.proxied, opts.use_proxy) {
            (Some(proxied), true) => proxied,
            _ => &self.client,
        }
    }

    fn headers_for(opts: &FetchOptions) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in &opts.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(name), Ok(value)) => {
                    map.append(name, value);
                }
                _ => warn!(%name, "Skipping invalid request header"),
            }
        }
        if let Some(ua) = opts.user_agent.as_deref().and_then(|ua| HeaderValue::try_from(ua).ok()) {
            map.insert(USER_AGENT, ua);
        }
        map
    }

    async fn read_body(url: &str, resp: reqwest::Response) -> Result<String, FetchError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status, url.to_string()));
        }
        let body = resp.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::Empty(url.to_string()));
        }
        Ok(body)
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &str, opts: &FetchOptions) -> Result<String, FetchError> {
        let target = Url::parse(url)?;
        let resp = self
            .client_for(opts)
            .get(target)
            .headers(Self::headers_for(opts))
            .send()
            .await?;
        Self::read_body(url, resp).await
    }

    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn post(&self, url: &str, body: &PostBody, opts: &FetchOptions) -> Result<String, FetchError> {
        let target = Url::parse(url)?;
        let req = self.client_for(opts).post(target).headers(Self::headers_for(opts));
        let req = match body {
            PostBody::Json(json) => req.json(json),
            PostBody::Form(fields) => req.form(fields),
        };
        let resp = req.send().await?;
        Self::read_body(url, resp).await
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`Fetch`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryFetch<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: Fetch,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        if self.base_delay.is_zero() {
            return StdDuration::ZERO;
        }
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let mut delay = self.base_delay.saturating_mul(1 << shift);
        if delay > self.max_delay {
            delay = self.max_delay;
        }
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }

    async fn with_retries<Fut>(
        &self,
        url: &str,
        opts: &FetchOptions,
        mut call: impl FnMut() -> Fut,
    ) -> Result<String, FetchError>
    where
        Fut: Future<Output = Result<String, FetchError>>,
    {
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match call().await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempt += 1;
                    let total_dt = total_t0.elapsed();

                    if attempt > max_retries || !e.is_retryable() {
                        debug!(
                            %url,
                            attempt,
                            max = max_retries,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "fetch gave up"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        %url,
                        attempt,
                        max = max_retries,
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Fetch for RetryFetch<T>
where
    T: Fetch,
{
    async fn get(&self, url: &str, opts: &FetchOptions) -> Result<String, FetchError> {
        self.with_retries(url, opts, || self.inner.get(url, opts)).await
    }

    async fn post(&self, url: &str, body: &PostBody, opts: &FetchOptions) -> Result<String, FetchError> {
        self.with_retries(url, opts, || self.inner.post(url, body, opts)).await
    }
}

/// Fetch a page as text. Failures are logged and mapped to `None`.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn get_url_html<F: Fetch>(fetcher: &F, url: &str, opts: &FetchOptions) -> Option<String> {
    match fetcher.get(url, opts).await {
        Ok(body) => Some(body),
        Err(e) => {
            warn!(error = %e, "get_url_html failed");
            None
        }
    }
}

fn parse_json(body: &str) -> Result<Value, FetchError> {
    Ok(serde_json::from_str(body)?)
}

/// Fetch and parse a JSON document. Failures are logged and mapped to `None`.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn get_url_json<F: Fetch>(fetcher: &F, url: &str, opts: &FetchOptions) -> Option<Value> {
    let body = match fetcher.get(url, opts).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "get_url_json failed");
            return None;
        }
    };
    match parse_json(&body) {
        Ok(json) => Some(json),
        Err(e) => {
            error!(error = %e, preview = %crate::utils::truncate_for_log(&body, 200), "Response is not JSON");
            None
        }
    }
}

/// POST and parse the JSON response. Failures are logged and mapped to `None`.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn post_url<F: Fetch>(fetcher: &F, url: &str, body: &PostBody, opts: &FetchOptions) -> Option<Value> {
    match fetcher.post(url, body, opts).await {
        Ok(text) => match parse_json(&text) {
            Ok(json) => Some(json),
            Err(e) => {
                error!(error = %e, "POST response is not JSON");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, "post_url failed");
            None
        }
    }
}
