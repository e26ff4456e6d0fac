//! Static HTTP fetch for pages that need no script execution.
//!
//! The roster and the static glossary are plain MediaWiki articles; they are
//! fetched with reqwest and parsed directly. Detail pages go through the
//! render surface instead.

pub mod url;

use std::time::{Duration, Instant};

use prts_core::{AppConfig, Error};
use reqwest::{Client, header};

pub use self::url::article_url;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Wiki article prefix.
    pub base_url: String,

    /// User agent string.
    pub user_agent: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    pub fn from_app(config: &AppConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            user_agent: config.user_agent.clone(),
            timeout: config.http_timeout(),
            ..Self::default()
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        let app = AppConfig::default();
        let timeout = app.http_timeout();
        Self { base_url: app.base_url, user_agent: app.user_agent, timeout, max_redirects: 5 }
    }
}

/// HTTP client for static wiki articles.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::FetchFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Fetch an article by name and return its body as text.
    pub async fn fetch_article(&self, article: &str) -> Result<String, Error> {
        let url = article_url(&self.config.base_url, article)?;
        self.fetch_text(url.as_str()).await
    }

    /// GET `url` and return the body decoded as text.
    ///
    /// Non-success statuses become `Error::HttpError`.
    pub async fn fetch_text(&self, url: &str) -> Result<String, Error> {
        let start = Instant::now();

        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| Error::FetchFailed(format!("network error: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpError(format!("status {} for {url}", status.as_u16())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::FetchFailed(format!("failed to read response: {e}")))?;

        tracing::debug!(url, bytes = body.len(), ms = start.elapsed().as_millis() as u64, "fetched page");
        Ok(body)
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}
