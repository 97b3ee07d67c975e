//! Target resolution for inbound requests.
//!
//! - Embedded-URL mode: `GET /<percent-encoded-absolute-url>`, decoded and
//!   scheme-checked, never cached
//! - Self-URL mode: the inbound URI as received is both target and cache key

use axum::http::Uri;

use crate::core::error::{ProxyError, Result};
use crate::core::{ProxyMode, ResolvedTarget};

/// Resolve the fetch target (and cache key) for `uri` under `mode`
pub fn resolve(mode: ProxyMode, uri: &Uri) -> Result<ResolvedTarget> {
    match mode {
        ProxyMode::Embedded => resolve_embedded(uri.path()),
        ProxyMode::SelfUrl => Ok(resolve_self_url(uri)),
    }
}

/// Decode an absolute URL carried in the request path
pub fn resolve_embedded(path: &str) -> Result<ResolvedTarget> {
    let encoded = path.strip_prefix('/').unwrap_or(path);
    let target = query_unescape(encoded)?;

    if !target.starts_with("http://") && !target.starts_with("https://") {
        return Err(ProxyError::InvalidScheme);
    }

    Ok(ResolvedTarget {
        url: target,
        cache_key: None,
    })
}

/// Use the request URI verbatim; absolute-form when the client is configured
/// to use us as its forward proxy
pub fn resolve_self_url(uri: &Uri) -> ResolvedTarget {
    let url = uri.to_string();
    ResolvedTarget {
        cache_key: Some(url.clone()),
        url,
    }
}

/// Query-component unescaping: `+` becomes a space, every `%` must introduce
/// two hex digits, and the decoded bytes must be UTF-8.
fn query_unescape(input: &str) -> Result<String> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !well_formed {
                return Err(ProxyError::InvalidEncoding);
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = input.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| ProxyError::InvalidEncoding)
}
