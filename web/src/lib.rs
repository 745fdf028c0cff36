//! # Slotbook Web
//!
//! Axum HTTP surface for the Slotbook reservation ledger.
//!
//! Wires the booking coordinator and query surface into a router, maps the
//! ledger's error taxonomy onto HTTP statuses, and resolves caller identity
//! from trusted gateway headers.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use extractors::Identity;
pub use state::AppState;

use axum::routing::{get, patch, post};
use axum::Router;

/// Build the API router over shared application state.
#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/reservations",
            post(handlers::reservations::create_reservation)
                .get(handlers::reservations::list_reservations),
        )
        .route(
            "/api/reservations/:id",
            patch(handlers::reservations::update_reservation)
                .delete(handlers::reservations::delete_reservation),
        )
        .route(
            "/api/reservations/:id/payment",
            post(handlers::reservations::record_payment),
        )
        .route("/api/events", post(handlers::events::put_event))
        .route("/api/events/:id", get(handlers::events::get_event))
        .route(
            "/api/events/:id/attendance",
            get(handlers::counts::get_attendance),
        )
        .route(
            "/api/events/attendance",
            post(handlers::counts::get_batch_attendance),
        )
        .route(
            "/api/events/:id/reconcile",
            post(handlers::counts::reconcile_attendance),
        )
        .route("/health", get(health))
        .with_state(state)
}

/// Liveness probe.
async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}
