//! HTTP surface.
//!
//! Handlers are thin: they decode the request, call into [`crate::core`] and map
//! the outcome to a status code. All shared state lives in [`AppState`].

pub mod bookings;
pub mod dto;
pub mod error;
pub mod orders;

use crate::config::CapacityConfig;
use axum::{Json, Router, extract::State, routing::get};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection pool
    pub db: DatabaseConnection,
    /// Daily ceiling used by the admission guard
    pub capacity: CapacityConfig,
}

/// Builds the application router with tracing and CORS layers applied.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(orders::router())
        .merge(bookings::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    database: &'static str,
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match state.db.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            warn!(error = %e, "Database ping failed");
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}
