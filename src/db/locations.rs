//! Location store.

use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};

use super::{delete_row, ensure_exists, id_column, inserted_id, require_text, EntityStore};
use crate::errors::AppError;
use crate::models::{Location, LocationInput};

#[derive(Clone)]
pub struct LocationStore {
    pool: AnyPool,
}

impl LocationStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    async fn list(&self, filter: &str, arg: Option<u32>) -> Result<Vec<Location>, AppError> {
        let sql = format!("SELECT id, name FROM location {filter} ORDER BY id");
        let mut query = sqlx::query(&sql);
        if let Some(arg) = arg {
            query = query.bind(i64::from(arg));
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_location).collect()
    }

    fn validate(input: &LocationInput) -> Result<(), AppError> {
        require_text("name", &input.name)
    }
}

#[async_trait]
impl EntityStore for LocationStore {
    type Entity = Location;
    type Input = LocationInput;

    const ENTITY: &'static str = "Location";

    async fn get_all(&self) -> Result<Vec<Location>, AppError> {
        self.list("", None).await
    }

    async fn get_by_id(&self, id: u32) -> Result<Location, AppError> {
        self.list("WHERE id = ?", Some(id))
            .await?
            .pop()
            .ok_or(AppError::NotFound { entity: Self::ENTITY, id })
    }

    async fn add(&self, input: LocationInput) -> Result<Location, AppError> {
        Self::validate(&input)?;
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query("INSERT INTO location (name) VALUES (?)")
            .bind(&input.name)
            .execute(&mut *conn)
            .await?;
        let id = inserted_id(&mut conn, &result).await?;
        drop(conn);
        tracing::info!(id, name = %input.name, "Created location");
        self.get_by_id(id).await
    }

    async fn update(&self, id: u32, input: LocationInput) -> Result<Location, AppError> {
        Self::validate(&input)?;
        ensure_exists(&self.pool, "location", Self::ENTITY, id).await?;
        sqlx::query("UPDATE location SET name = ? WHERE id = ?")
            .bind(&input.name)
            .bind(i64::from(id))
            .execute(&self.pool)
            .await?;
        self.get_by_id(id).await
    }

    async fn delete(&self, id: u32) -> Result<(), AppError> {
        delete_row(&self.pool, "location", Self::ENTITY, id).await
    }
}

fn row_to_location(row: &AnyRow) -> Result<Location, AppError> {
    Ok(Location {
        id: id_column(row, "id")?,
        name: row.try_get("name")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;

    fn input(name: &str) -> LocationInput {
        LocationInput {
            id: None,
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_location_crud() {
        let db = TestDb::new().await;
        let store = LocationStore::new(db.pool.clone());

        let created = store.add(input("Hall A")).await.unwrap();
        assert_eq!(created, Location { id: 1, name: "Hall A".into() });

        let updated = store.update(1, input("Hall B")).await.unwrap();
        assert_eq!(updated.name, "Hall B");
        assert_eq!(store.get_all().await.unwrap().len(), 1);

        store.delete(1).await.unwrap();
        assert!(matches!(
            store.get_by_id(1).await,
            Err(AppError::NotFound { id: 1, .. })
        ));
        assert!(matches!(store.delete(1).await, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_adds_return_generated_ids() {
        let db = TestDb::new().await;
        let store = LocationStore::new(db.pool.clone());

        assert_eq!(store.add(input("Hall A")).await.unwrap().id, 1);
        assert_eq!(store.add(input("Hall B")).await.unwrap().id, 2);

        // Concurrent inserts run on different pooled connections
        let (c, d, e) = tokio::join!(
            store.add(input("Hall C")),
            store.add(input("Hall D")),
            store.add(input("Hall E")),
        );
        let mut ids = Vec::new();
        for (created, name) in [(c, "Hall C"), (d, "Hall D"), (e, "Hall E")] {
            let created = created.unwrap();
            assert_eq!(created.name, name);
            assert_eq!(store.get_by_id(created.id).await.unwrap().name, name);
            ids.push(created.id);
        }
        ids.sort_unstable();
        assert_eq!(ids, vec![3, 4, 5]);
    }

    #[tokio::test]
    async fn test_update_missing_location() {
        let db = TestDb::new().await;
        let store = LocationStore::new(db.pool.clone());
        assert!(matches!(
            store.update(42, input("Nowhere")).await,
            Err(AppError::NotFound { id: 42, .. })
        ));
    }

    #[tokio::test]
    async fn test_blank_name_rejected() {
        let db = TestDb::new().await;
        let store = LocationStore::new(db.pool.clone());
        assert!(matches!(
            store.add(input("  ")).await,
            Err(AppError::Validation { .. })
        ));
        assert!(store.get_all().await.unwrap().is_empty());
    }
}
