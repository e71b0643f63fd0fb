//! Talk date relation endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};

use super::EntityId;
use crate::db::TalkDateStore;
use crate::errors::AppError;
use crate::models::TalkDate;

/// GET /talkDates/event/{id}
pub async fn talk_dates_by_event(
    State(store): State<Arc<TalkDateStore>>,
    EntityId(event_id): EntityId,
) -> Result<Json<Vec<TalkDate>>, AppError> {
    Ok(Json(store.get_by_event_id(event_id).await?))
}
