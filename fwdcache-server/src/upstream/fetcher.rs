use axum::http::{HeaderMap, StatusCode};
use bytes::{Bytes, BytesMut};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Outbound fetch settings
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Whole-request timeout, body read included
    pub timeout: Duration,
    /// Reject bodies larger than this; `None` buffers without limit
    pub max_body_bytes: Option<usize>,
    pub user_agent: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_body_bytes: None,
            user_agent: None,
        }
    }
}

/// Fully buffered upstream response
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status: StatusCode,
    /// Header multimap, repeated names keep their order
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Connect, TLS, timeout or malformed-URL failure before a response arrived
    #[error("Upstream request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// Response started but the body could not be read to the end
    #[error("Failed to read upstream body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("Upstream body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

/// Issues timed GET requests and buffers the full response body.
///
/// Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct OutboundFetcher {
    client: Client,
    max_body_bytes: Option<usize>,
}

impl OutboundFetcher {
    /// Create a new fetcher
    ///
    /// # Errors
    /// Returns error if the TLS backend cannot be initialised
    pub fn new(config: FetcherConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder().timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let client = builder.build().map_err(FetchError::Client)?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    /// GET `url` and read the whole body into memory
    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(FetchError::Request)?;

        let status = response.status();
        let headers = response.headers().clone();

        if let (Some(limit), Some(declared)) = (self.max_body_bytes, response.content_length()) {
            if declared > limit as u64 {
                warn!(url, declared, limit, "upstream body larger than limit");
                return Err(FetchError::BodyTooLarge { limit });
            }
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await.map_err(FetchError::Body)? {
            if let Some(limit) = self.max_body_bytes {
                if body.len() + chunk.len() > limit {
                    warn!(url, limit, "upstream body exceeded limit while reading");
                    return Err(FetchError::BodyTooLarge { limit });
                }
            }
            body.extend_from_slice(&chunk);
        }

        debug!(url, status = status.as_u16(), bytes = body.len(), "fetched upstream");

        Ok(FetchResult {
            status,
            headers,
            body: body.freeze(),
        })
    }
}
