//! Administrative endpoints.

use axum::{extract::State, http::StatusCode};
use sqlx::AnyPool;

use crate::config::DbDriver;
use crate::db::seed;
use crate::errors::AppError;

/// POST /initDB - Drop all tables and reload the demonstration dataset.
///
/// Only routed when `CATALOG_ADMIN_RESEED_ENABLED` is set, and always behind
/// the access gate.
pub async fn reseed_database(
    State(pool): State<AnyPool>,
    State(driver): State<DbDriver>,
) -> Result<StatusCode, AppError> {
    seed::reseed(&pool, driver).await?;
    Ok(StatusCode::NO_CONTENT)
}
