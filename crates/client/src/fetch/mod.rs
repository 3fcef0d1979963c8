//! Blocking HTTP fetch of map tiles.
//!
//! [`HttpFetcher`] is the [`Fetcher`] behind a tile source: it renders the
//! tile URL from the source's template and downloads it.
//!
//! - Any non-2xx status is a transport failure, never cached.
//! - Max body bytes: 5MB (configurable)
//! - No retries; the caller's next fetch is the retry.

pub mod url;

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::blocking::Client;

use tilecache_core::{Error, Fetcher, TileKey};

use crate::source::TileSource;

pub use self::url::{UrlError, render};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string. Tile servers commonly block requests without one.
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("tilecache/", env!("CARGO_PKG_VERSION")).to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
        }
    }
}

impl FetchConfig {
    /// Fetch settings from the application configuration.
    pub fn from_app(config: &tilecache_core::config::AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), ..Default::default() }
    }
}

/// Downloads tiles of one source over HTTP.
pub struct HttpFetcher {
    http: Client,
    source: TileSource,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a fetcher for `source`.
    pub fn new(source: TileSource, config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, source, config })
    }

    pub fn source(&self) -> &TileSource {
        &self.source
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}

impl Fetcher for HttpFetcher {
    type Request = TileKey;
    type Output = Bytes;

    fn fetch(&self, key: &TileKey) -> Result<Option<Bytes>, Error> {
        let start = Instant::now();
        let url = self.source.url_for(key)?;
        tracing::info!("requesting {url}");

        let response = self
            .http
            .get(url.as_str())
            .header("Accept", "image/png,image/jpeg,image/*;q=0.9,*/*;q=0.5")
            .send()
            .map_err(|e| Error::Transport(format!("failed to download {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("failed to download {url}: status {}", status.as_u16())));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::Transport(format!("{url}: {len} bytes exceeds {}", self.config.max_bytes)));
        }

        let bytes = response
            .bytes()
            .map_err(|e| Error::Transport(format!("failed to read {url}: {e}")))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::Transport(format!(
                "{url}: {} bytes exceeds {}",
                bytes.len(),
                self.config.max_bytes
            )));
        }

        tracing::debug!("fetched {} in {}ms ({} bytes)", url, start.elapsed().as_millis(), bytes.len());

        Ok(Some(bytes))
    }
}
