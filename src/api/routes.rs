use crate::api::{handlers, AppState};
use crate::metrics::MetricsLayer;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    let timeout = state.request_timeout;

    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/health/live", get(handlers::liveness))
        // Model state
        .route("/v1/status", get(handlers::model_status))
        .route("/v1/admin/reload", post(handlers::reload_models))
        // Inference
        .route("/v1/classify", post(handlers::classify))
        .route("/v1/similar", post(handlers::find_similar))
        .route("/v1/sla", post(handlers::estimate_sla))
        .route("/v1/anomaly", post(handlers::detect_anomaly))
        .route("/v1/analyze", post(handlers::analyze))
        // Insights
        .route("/v1/insights/sla-features", get(handlers::sla_features))
        .route("/v1/insights/datasets", get(handlers::datasets))
        .route("/v1/insights/sla-portfolio", post(handlers::sla_portfolio))
        // Metrics
        .route("/metrics", get(handlers::metrics))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(MetricsLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
