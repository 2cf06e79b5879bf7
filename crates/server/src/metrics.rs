//! Prometheus metrics for the Ember server.
//!
//! Exposes metrics for post lifecycle events, engagement counters, and sweep activity.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! While metrics don't contain post-specific data (no ids or content), they do
//! expose aggregate system usage (posts created, views, sweep volumes).
//!
//! **Deployment Requirement**: The `/metrics` endpoint MUST be network-restricted
//! to authorized Prometheus scraper IPs only. This should be enforced at the
//! infrastructure level (firewall, load balancer, or reverse proxy rules).
//! Do NOT expose `/metrics` on public networks.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Post lifecycle metrics
pub static POSTS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("ember_posts_created_total", "Total number of posts created")
        .expect("metric creation failed")
});

pub static POSTS_BLINDED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ember_posts_blinded_total",
        "Total number of posts blinded after crossing the report threshold",
    )
    .expect("metric creation failed")
});

// Engagement metrics
pub static POST_VIEWS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("ember_post_views_total", "Total number of post views served")
        .expect("metric creation failed")
});

pub static RECOMMENDATIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ember_recommendations_total",
        "Total number of accepted recommendations",
    )
    .expect("metric creation failed")
});

pub static TTL_EXTENSIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ember_ttl_extensions_total",
        "Total number of lifetime extensions granted by recommendations",
    )
    .expect("metric creation failed")
});

pub static REPORTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("ember_reports_total", "Total number of reports recorded")
        .expect("metric creation failed")
});

// Sweep metrics
pub static SWEEP_RUNS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("ember_sweep_runs_total", "Total number of sweep passes run")
        .expect("metric creation failed")
});

pub static SWEEP_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ember_sweep_failures_total",
        "Total number of sweep passes that failed",
    )
    .expect("metric creation failed")
});

pub static SWEEP_PRUNED_ENTRIES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "ember_sweep_pruned_entries_total",
        "Total number of expired posts pruned from the indexes",
    )
    .expect("metric creation failed")
});

pub static SWEEP_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "ember_sweep_duration_seconds",
            "Time taken to run a single sweep pass",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// This function is idempotent - subsequent calls after the first are no-ops.
/// This allows safe use in integration tests or when embedding multiple routers.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(POSTS_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(POSTS_BLINDED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(POST_VIEWS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(RECOMMENDATIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(TTL_EXTENSIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(REPORTS.clone()))
            .expect("metric registration failed");

        // Sweep metrics
        REGISTRY
            .register(Box::new(SWEEP_RUNS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SWEEP_FAILURES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SWEEP_PRUNED_ENTRIES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SWEEP_DURATION.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // This would panic if any metric creation failed
        register_metrics();
    }
}
