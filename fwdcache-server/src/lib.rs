pub mod config;
pub mod core;
pub mod server;
pub mod upstream;

// Re-export commonly used types
pub use config::{ConfigError, ServerConfig};
pub use core::{CacheStats, ProxyError, ProxyMode, RecencyCache, ResolvedTarget};
pub use server::{AppState, ResponseCache, create_router};
pub use upstream::{FetchError, FetchResult, FetcherConfig, OutboundFetcher};
