//! Event relation endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};

use super::EntityId;
use crate::db::EventStore;
use crate::errors::AppError;
use crate::models::Event;

/// GET /events/talk/{id} - Events at which the talk is scheduled.
pub async fn events_by_talk(
    State(store): State<Arc<EventStore>>,
    EntityId(talk_id): EntityId,
) -> Result<Json<Vec<Event>>, AppError> {
    Ok(Json(store.get_by_talk_id(talk_id).await?))
}
