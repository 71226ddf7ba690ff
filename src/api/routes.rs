use std::time::Duration;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers::{
    ca::get_ca,
    health::{health_check, usage},
    legacy::{legacy_method_not_allowed, legacy_pki},
    metrics::get_metrics,
    sign::{sign_certificate, sign_method_not_allowed},
};
use crate::api::middlewares::{logging_middleware, request_id_middleware};
use crate::api::types::ApiState;

/// Create router with all mock CA routes
pub fn create_router(state: ApiState, request_timeout: Duration) -> Router {
    // Health routes
    let health_routes = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/readyz", get(health_check))
        .route("/metrics", get(get_metrics));

    // Signing routes
    let sign = post(sign_certificate).fallback(sign_method_not_allowed);
    let sign_routes = Router::new()
        .route("/sign", sign.clone())
        .route("/api/v1/sign", sign.clone())
        .route("/api/v1/certificate/sign", sign)
        .route("/cgi/pki.cgi", post(legacy_pki).fallback(legacy_method_not_allowed));

    // Global middleware stack
    let middleware_stack = ServiceBuilder::new()
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout));

    Router::new()
        .route("/", get(usage))
        .route("/ca", get(get_ca))
        .merge(health_routes)
        .merge(sign_routes)
        .layer(middleware_stack)
        .with_state(state)
}
