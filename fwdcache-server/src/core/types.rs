use serde::Deserialize;
use std::fmt;

/// How the proxy derives the upstream target for an inbound request.
///
/// The two modes are mutually exclusive and selected once at startup.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyMode {
    /// `GET /<percent-encoded-absolute-url>`, validated, never cached
    Embedded,
    /// The request's own URI is both the fetch target and the cache key
    #[default]
    SelfUrl,
}

impl ProxyMode {
    /// Whether responses fetched in this mode go through the recency cache
    pub fn uses_cache(self) -> bool {
        matches!(self, Self::SelfUrl)
    }
}

impl fmt::Display for ProxyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded => write!(f, "embedded"),
            Self::SelfUrl => write!(f, "self-url"),
        }
    }
}

/// Target resolved from an inbound request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Absolute URL to fetch
    pub url: String,
    /// Cache key, present only when the active mode caches
    pub cache_key: Option<String>,
}
