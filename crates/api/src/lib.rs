//! HTTP API server with observability for the stock allocation service.
//!
//! Provides REST endpoints that translate requests into commands on the
//! message bus, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use service_layer::{BusSettings, LogNotifier, LogPublisher, bootstrap};
use stock_store::StockStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::allocation::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: StockStore>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/add_batch", post(routes::allocation::add_batch::<S>))
        .route("/allocate", post(routes::allocation::allocate::<S>))
        .route(
            "/change_batch_quantity",
            post(routes::allocation::change_batch_quantity::<S>),
        )
        .route("/products/{sku}", get(routes::allocation::get_product::<S>))
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

/// Creates the default application state: a bus over `store` that sends
/// notifications and publishes events to the log.
pub fn create_default_state<S: StockStore>(store: S, settings: BusSettings) -> Arc<AppState<S>> {
    let bus = bootstrap(store, settings, LogNotifier, LogPublisher);
    Arc::new(AppState { bus })
}
