//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Post lifecycle
        .route(
            "/api/v1/posts",
            post(handlers::create_post).get(handlers::list_posts),
        )
        .route("/api/v1/posts/ranking/{kind}", get(handlers::get_ranking))
        .route("/api/v1/posts/{id}", get(handlers::get_post))
        // Engagement endpoints
        .route(
            "/api/v1/posts/{id}/recommend",
            post(handlers::recommend_post),
        )
        .route("/api/v1/posts/{id}/report", post(handlers::report_post))
        // Health check (intentionally unauthenticated for load balancers/k8s probes)
        .route("/health", get(handlers::health_check));

    let mut router = Router::new().merge(api_routes);

    // Conditionally add metrics endpoint based on config.
    // SECURITY: When enabled, this endpoint MUST be network-restricted
    // to authorized Prometheus scraper IPs only.
    // See crate::metrics module documentation for details.
    if state.config.server.metrics_enabled {
        let metrics_routes = Router::new().route("/metrics", get(metrics_handler));
        router = router.merge(metrics_routes);
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
