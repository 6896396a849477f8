use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::docs;
use crate::handlers::{self, AppState};

/// Builds the complete application router.
///
/// Prediction routes are nested under `config.api_prefix`; service routes
/// (`/`, `/health`), the OpenAPI document and Swagger UI stay at the root.
pub fn build_router(state: Arc<AppState>) -> Router {
    let config = &state.config;

    // Analyze route: body size cap and per-IP rate limiting.
    // The cap is enforced by the body extractor so oversized bodies get the JSON 413.
    let mut analyze_routes = Router::new()
        .route(
            "/demo-analyze",
            post(handlers::demo_analyze).fallback(handlers::method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(config.max_body_bytes));

    if config.rate_limit_per_second > 0 {
        match GovernorConfigBuilder::default()
            .period(replenish_interval(config.rate_limit_per_second))
            .burst_size(config.rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
        {
            Some(governor_conf) => {
                analyze_routes = analyze_routes.layer(GovernorLayer {
                    config: Arc::new(governor_conf),
                });
            }
            None => tracing::warn!(
                "Invalid rate limit settings ({}/s, burst {}); rate limiting disabled",
                config.rate_limit_per_second,
                config.rate_limit_burst
            ),
        }
    }

    // Health checks bypass rate limiting
    let prediction_routes = Router::new()
        .route(
            "/health",
            get(handlers::prediction_health).fallback(handlers::method_not_allowed),
        )
        .merge(analyze_routes);

    Router::new()
        .route("/", get(handlers::root).fallback(handlers::method_not_allowed))
        .route(
            "/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
        .nest(&config.api_prefix, prediction_routes)
        .merge(docs::swagger_ui(config))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.request_timeout_secs,
                ))),
        )
        .layer(CorsLayer::very_permissive())
        .with_state(state.clone())
}

/// Time for one request of quota to come back at `per_second` requests per second.
pub fn replenish_interval(per_second: u64) -> Duration {
    Duration::from_nanos((1_000_000_000 / per_second.max(1)).max(1))
}
