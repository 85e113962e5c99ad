//! HTTP API server with observability for the order store.
//!
//! Provides REST endpoints for creating, listing, updating and deleting
//! orders, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use order_store::{IndexSet, KeyValueBackend, OrderRepository};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<B: KeyValueBackend + 'static>(
    state: Arc<AppState<B>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/orders",
            get(routes::orders::list::<B>).post(routes::orders::create::<B>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<B>)
                .put(routes::orders::update::<B>)
                .delete(routes::orders::delete::<B>),
        )
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

/// Creates the application state for `backend` from the storage settings in `config`.
pub fn create_state<B: KeyValueBackend>(backend: B, config: &Config) -> Arc<AppState<B>> {
    let repository = OrderRepository::new(backend, IndexSet::new(config.index_set.clone()))
        .with_request_timeout(config.request_timeout);

    Arc::new(AppState {
        repository,
        page_size: config.page_size,
    })
}
