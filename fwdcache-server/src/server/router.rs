use super::handlers::{self, AppState};
use axum::Router;
use tower_http::trace::TraceLayer;

/// Create the Axum router.
///
/// Every method and path reaches the proxy handler; there are no other routes
/// because any path may name an upstream resource.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .fallback(handlers::proxy_request)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
