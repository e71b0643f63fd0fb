//! Topic relation endpoints.

use std::sync::Arc;

use axum::{extract::State, Json};

use super::EntityId;
use crate::db::TopicStore;
use crate::errors::AppError;
use crate::models::Topic;

/// GET /topics/event/{id} - Distinct topics of the talks at an event.
pub async fn topics_by_event(
    State(store): State<Arc<TopicStore>>,
    EntityId(event_id): EntityId,
) -> Result<Json<Vec<Topic>>, AppError> {
    Ok(Json(store.get_by_event_id(event_id).await?))
}
