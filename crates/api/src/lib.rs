//! HTTP gateway for the order event pipeline.
//!
//! Exposes registration, login, and order endpoints with structured
//! logging (tracing) and Prometheus metrics. Order endpoints sit
//! behind the per-operation rate limiter and bearer-token auth.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/register", post(routes::auth::register))
        .route("/token", post(routes::auth::token))
        .route("/orders", post(routes::orders::create))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/orders/{id}", patch(routes::orders::update_status))
        .route("/orders/user/{user_id}", get(routes::orders::list_for_user))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
