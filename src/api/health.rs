//! Liveness probe.

use axum::{extract::State, http::StatusCode};
use sqlx::AnyPool;

/// GET / - "OK" while the database answers, 500 otherwise.
pub async fn health_check(State(pool): State<AnyPool>) -> (StatusCode, &'static str) {
    match crate::db::ping(&pool).await {
        Ok(()) => (StatusCode::OK, "OK"),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "UNAVAILABLE")
        }
    }
}
