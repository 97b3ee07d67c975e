pub mod handlers;
pub mod resolver;
pub mod router;

pub use handlers::{AppState, ResponseCache, proxy_request};
pub use router::create_router;
