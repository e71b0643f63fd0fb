//! Talk relation endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};

use super::EntityId;
use crate::db::TalkStore;
use crate::errors::AppError;
use crate::models::Talk;

/// GET /talks/event/{id} - Talks scheduled at an event.
pub async fn talks_by_event(
    State(store): State<Arc<TalkStore>>,
    EntityId(event_id): EntityId,
) -> Result<Json<Vec<Talk>>, AppError> {
    Ok(Json(store.get_by_event_id(event_id).await?))
}

/// GET /talks/person/{id} - Talks given by a person.
pub async fn talks_by_person(
    State(store): State<Arc<TalkStore>>,
    EntityId(person_id): EntityId,
) -> Result<Json<Vec<Talk>>, AppError> {
    Ok(Json(store.get_by_person_id(person_id).await?))
}
