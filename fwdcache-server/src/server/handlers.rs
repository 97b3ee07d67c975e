use crate::config::ServerConfig;
use crate::core::error::{ProxyError, Result};
use crate::core::{ProxyMode, RecencyCache};
use crate::upstream::{FetchError, FetchResult, OutboundFetcher};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Method, Uri, header},
    response::Response,
};
use bytes::Bytes;
use tracing::{debug, error, info, warn};

use super::resolver;

/// Cache of upstream bodies keyed by inbound request URI
pub type ResponseCache = RecencyCache<String, Bytes>;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub mode: ProxyMode,
    pub cache: ResponseCache,
    pub fetcher: OutboundFetcher,
}

impl AppState {
    pub fn new(mode: ProxyMode, cache: ResponseCache, fetcher: OutboundFetcher) -> Self {
        Self {
            mode,
            cache,
            fetcher,
        }
    }

    /// Build the cache and fetcher described by `config`
    pub fn from_config(config: &ServerConfig) -> std::result::Result<Self, FetchError> {
        let fetcher = OutboundFetcher::new(config.to_fetcher_config())?;
        let cache = ResponseCache::new(config.cache.capacity);
        Ok(Self::new(config.proxy.mode, cache, fetcher))
    }
}

/// Headers that describe the upstream connection or framing rather than the
/// resource. The body is re-framed by our server, so these are not copied.
static SKIPPED_RESPONSE_HEADERS: [HeaderName; 9] = [
    header::CONNECTION,
    header::CONTENT_LENGTH,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Catch-all proxy endpoint
pub async fn proxy_request(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Result<Response> {
    info!(%method, %uri, mode = %state.mode, "proxy request");

    let target = resolver::resolve(state.mode, &uri).inspect_err(log_failure)?;

    if let Some(key) = target.cache_key.as_deref() {
        if let Some(cached) = state.cache.get(key) {
            debug!(key, bytes = cached.len(), "serving cached body");
            return Ok(Response::new(Body::from(cached)));
        }
    }

    let fetched = state
        .fetcher
        .fetch(&target.url)
        .await
        .map_err(|e| map_fetch_error(state.mode, e))
        .inspect_err(log_failure)?;

    match target.cache_key {
        // Answered like a hit: status 200, body only
        Some(key) => {
            let body = fetched.body;
            state.cache.put(key, body.clone());
            Ok(Response::new(Body::from(body)))
        }
        None => Ok(forward_response(fetched)),
    }
}

fn map_fetch_error(mode: ProxyMode, err: FetchError) -> ProxyError {
    match err {
        FetchError::Client(e) | FetchError::Request(e) => ProxyError::FetchFailure {
            mode,
            reason: e.to_string(),
        },
        FetchError::Body(e) => ProxyError::ReadFailure(e.to_string()),
        too_large @ FetchError::BodyTooLarge { .. } => {
            ProxyError::ReadFailure(too_large.to_string())
        }
    }
}

fn log_failure(err: &ProxyError) {
    let status = err.status_code();
    match err.detail() {
        Some(detail) if status.is_server_error() => {
            error!(status = status.as_u16(), detail, "{}", err)
        }
        _ => warn!(status = status.as_u16(), "{}", err),
    }
}

/// Upstream status, headers and body as a client response (embedded mode)
fn forward_response(fetched: FetchResult) -> Response {
    let mut response = Response::new(Body::from(fetched.body));
    *response.status_mut() = fetched.status;

    let headers = response.headers_mut();
    for (name, value) in fetched.headers.iter() {
        if !SKIPPED_RESPONSE_HEADERS.contains(name) {
            headers.append(name.clone(), value.clone());
        }
    }

    response
}
