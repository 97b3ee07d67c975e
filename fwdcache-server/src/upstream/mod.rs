//! Upstream Module
//!
//! Outbound HTTP fetching for cache misses and uncached (embedded-URL) requests.

pub mod fetcher;

pub use fetcher::{FetchError, FetchResult, FetcherConfig, OutboundFetcher};
