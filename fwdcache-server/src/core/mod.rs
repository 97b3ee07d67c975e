pub mod cache;
pub mod error;
pub mod types;

pub use cache::{CacheStats, RecencyCache};
pub use error::ProxyError;
pub use types::{ProxyMode, ResolvedTarget};
