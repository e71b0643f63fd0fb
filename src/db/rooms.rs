//! Room store.

use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};

use super::{
    delete_row, ensure_exists, id_column, inserted_id, require_reference, require_text,
    EntityStore, OrganizationStore,
};
use crate::errors::AppError;
use crate::models::{Room, RoomInput};

#[derive(Clone)]
pub struct RoomStore {
    pool: AnyPool,
    organizations: OrganizationStore,
}

impl RoomStore {
    pub fn new(pool: AnyPool) -> Self {
        Self {
            organizations: OrganizationStore::new(pool.clone()),
            pool,
        }
    }

    async fn list(&self, filter: &str, arg: Option<u32>) -> Result<Vec<Room>, AppError> {
        let sql = format!("SELECT id, name, organization_id FROM room {filter} ORDER BY id");
        let mut query = sqlx::query(&sql);
        if let Some(arg) = arg {
            query = query.bind(i64::from(arg));
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut rooms = Vec::with_capacity(rows.len());
        for row in &rows {
            rooms.push(self.hydrate(row).await?);
        }
        Ok(rooms)
    }

    async fn hydrate(&self, row: &AnyRow) -> Result<Room, AppError> {
        let organization_id = id_column(row, "organization_id")?;
        Ok(Room {
            id: id_column(row, "id")?,
            name: row.try_get("name")?,
            organization: self.organizations.get_by_id(organization_id).await?,
        })
    }
}

#[async_trait]
impl EntityStore for RoomStore {
    type Entity = Room;
    type Input = RoomInput;

    const ENTITY: &'static str = "Room";

    async fn get_all(&self) -> Result<Vec<Room>, AppError> {
        self.list("", None).await
    }

    async fn get_by_id(&self, id: u32) -> Result<Room, AppError> {
        self.list("WHERE id = ?", Some(id))
            .await?
            .pop()
            .ok_or(AppError::NotFound { entity: Self::ENTITY, id })
    }

    async fn add(&self, input: RoomInput) -> Result<Room, AppError> {
        require_text("name", &input.name)?;
        let organization_id = require_reference("organization", input.organization)?;
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query("INSERT INTO room (name, organization_id) VALUES (?, ?)")
            .bind(&input.name)
            .bind(i64::from(organization_id))
            .execute(&mut *conn)
            .await?;
        let id = inserted_id(&mut conn, &result).await?;
        drop(conn);
        tracing::info!(id, name = %input.name, "Created room");
        self.get_by_id(id).await
    }

    async fn update(&self, id: u32, input: RoomInput) -> Result<Room, AppError> {
        require_text("name", &input.name)?;
        let organization_id = require_reference("organization", input.organization)?;
        ensure_exists(&self.pool, "room", Self::ENTITY, id).await?;
        sqlx::query("UPDATE room SET name = ?, organization_id = ? WHERE id = ?")
            .bind(&input.name)
            .bind(i64::from(organization_id))
            .bind(i64::from(id))
            .execute(&self.pool)
            .await?;
        self.get_by_id(id).await
    }

    async fn delete(&self, id: u32) -> Result<(), AppError> {
        delete_row(&self.pool, "room", Self::ENTITY, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;
    use crate::models::{OrganizationInput, Reference};

    #[tokio::test]
    async fn test_room_embeds_organization() {
        let db = TestDb::new().await;
        OrganizationStore::new(db.pool.clone())
            .add(OrganizationInput {
                id: None,
                name: "Prodyna".into(),
            })
            .await
            .unwrap();
        let store = RoomStore::new(db.pool.clone());

        let room = store
            .add(RoomInput {
                id: None,
                name: "Red Room".into(),
                organization: Some(Reference { id: 1 }),
            })
            .await
            .unwrap();
        assert_eq!(room.organization.name, "Prodyna");

        let err = store
            .update(
                room.id,
                RoomInput {
                    id: None,
                    name: "Red Room".into(),
                    organization: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "organization: is required");
    }
}
