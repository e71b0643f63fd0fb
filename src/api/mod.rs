//! REST API module.
//!
//! Every entity exposes the same five CRUD routes, served by the generic
//! handlers below. Relation-scoped reads live in the per-entity modules.

mod admin;
mod events;
mod health;
mod talk_dates;
mod talks;
mod topics;

pub use admin::*;
pub use events::*;
pub use health::*;
pub use talk_dates::*;
pub use talks::*;
pub use topics::*;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request, State},
    http::{request::Parts, StatusCode},
    Json,
};
use serde::de::DeserializeOwned;

use crate::db::EntityStore;
use crate::errors::AppError;

/// Entity id taken from the `{id}` path segment.
///
/// Anything that is not an unsigned 32-bit integer is rejected with 400.
#[derive(Debug, Clone, Copy)]
pub struct EntityId(pub u32);

impl<S: Send + Sync> FromRequestParts<S> for EntityId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        raw.parse::<u32>()
            .map(EntityId)
            .map_err(|_| AppError::BadRequest(format!("Invalid id {raw:?}")))
    }
}

/// JSON request body. Decode failures become the 400 envelope.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(request, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(JsonBody(serde_json::from_slice(&bytes)?))
    }
}

/// GET /{entity}
pub async fn list<S: EntityStore>(
    State(store): State<Arc<S>>,
) -> Result<Json<Vec<S::Entity>>, AppError> {
    Ok(Json(store.get_all().await?))
}

/// GET /{entity}/{id}
pub async fn get_one<S: EntityStore>(
    State(store): State<Arc<S>>,
    EntityId(id): EntityId,
) -> Result<Json<S::Entity>, AppError> {
    Ok(Json(store.get_by_id(id).await?))
}

/// POST /{entity}
pub async fn create<S: EntityStore>(
    State(store): State<Arc<S>>,
    JsonBody(input): JsonBody<S::Input>,
) -> Result<(StatusCode, Json<S::Entity>), AppError> {
    let entity = store.add(input).await?;
    Ok((StatusCode::CREATED, Json(entity)))
}

/// PUT /{entity}/{id}
pub async fn update<S: EntityStore>(
    State(store): State<Arc<S>>,
    EntityId(id): EntityId,
    JsonBody(input): JsonBody<S::Input>,
) -> Result<Json<S::Entity>, AppError> {
    Ok(Json(store.update(id, input).await?))
}

/// DELETE /{entity}/{id}
pub async fn remove<S: EntityStore>(
    State(store): State<Arc<S>>,
    EntityId(id): EntityId,
) -> Result<StatusCode, AppError> {
    store.delete(id).await?;
    tracing::info!(entity = S::ENTITY, id, "Deleted");
    Ok(StatusCode::NO_CONTENT)
}
