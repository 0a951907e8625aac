pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use state::AppState;
use tower_http::cors::CorsLayer;

/// Assemble the HTTP surface around a shared application state.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::root))
        .route("/api/health", get(routes::health))
        .route("/api/predict", post(routes::predict))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
