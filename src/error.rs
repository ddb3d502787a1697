//! Error types for the fetch layer, feed parsing, the site registry and
//! configuration.
//!
//! Handlers never surface these to their callers: the `get_url_*` helpers
//! log the error and hand back `None`, which is the contract every handler
//! is written against.

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP status {0} (url: {1})")]
    Status(StatusCode, String),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("empty response body (url: {0})")]
    Empty(String),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Client errors other than 408/429 are final, which keeps a stale
    /// Next.js build id from burning the retry budget on a 404.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status(status, _) => {
                status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
                    || *status == StatusCode::REQUEST_TIMEOUT
            }
            FetchError::Transport(_) => true,
            FetchError::Empty(_) => true,
            FetchError::Json(_) | FetchError::InvalidUrl(_) => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("site registry I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("site registry JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum FeedParseError {
    #[error("invalid RSS: {0}")]
    Rss(#[from] rss::Error),

    #[error("invalid Atom: {0}")]
    Atom(#[from] atom_syndication::Error),

    #[error("document is neither RSS nor Atom")]
    NotAFeed,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_final() {
        let e = FetchError::Status(StatusCode::NOT_FOUND, "https://x.test".into());
        assert!(!e.is_retryable());
    }

    #[test]
    fn test_server_error_is_retryable() {
        let e = FetchError::Status(StatusCode::BAD_GATEWAY, "https://x.test".into());
        assert!(e.is_retryable());
        assert!(FetchError::Empty("https://x.test".into()).is_retryable());
    }
}
