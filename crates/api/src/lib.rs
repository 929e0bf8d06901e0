//! HTTP API for the purchase fulfillment service.
//!
//! Exposes checkout session creation, purchase fulfillment, and order
//! reads over REST, with structured logging (tracing) and Prometheus
//! metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{InMemoryCardIssuer, InMemoryPaymentGateway, StubAutomation};
use store::{InMemoryOrderStore, InMemoryUserStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/checkout/session", post(routes::checkout::create))
        .route("/purchases", post(routes::purchases::create))
        .route("/orders", get(routes::orders::list))
        .route("/orders/{id}", get(routes::orders::get))
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

/// Creates application state backed by in-memory stores and services.
///
/// Used for local development and tests; production wiring replaces the
/// collaborators based on environment configuration.
pub fn create_default_state() -> Arc<AppState> {
    let orders = Arc::new(InMemoryOrderStore::new());
    let users = Arc::new(InMemoryUserStore::new());
    let gateway = Arc::new(InMemoryPaymentGateway::new());
    let issuer = Arc::new(InMemoryCardIssuer::new());
    let automation = Arc::new(StubAutomation::new());

    Arc::new(AppState::new(orders, users, gateway, issuer, automation))
}
