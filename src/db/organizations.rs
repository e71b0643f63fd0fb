//! Organization store.
//!
//! Names are unique; a clash surfaces as a validation error from the
//! database constraint.

use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};

use super::{delete_row, ensure_exists, id_column, inserted_id, require_text, EntityStore};
use crate::errors::AppError;
use crate::models::{Organization, OrganizationInput};

#[derive(Clone)]
pub struct OrganizationStore {
    pool: AnyPool,
}

impl OrganizationStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    async fn list(&self, filter: &str, arg: Option<u32>) -> Result<Vec<Organization>, AppError> {
        let sql = format!("SELECT id, name FROM organization {filter} ORDER BY id");
        let mut query = sqlx::query(&sql);
        if let Some(arg) = arg {
            query = query.bind(i64::from(arg));
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_organization).collect()
    }

    fn validate(input: &OrganizationInput) -> Result<(), AppError> {
        require_text("name", &input.name)
    }
}

#[async_trait]
impl EntityStore for OrganizationStore {
    type Entity = Organization;
    type Input = OrganizationInput;

    const ENTITY: &'static str = "Organization";

    async fn get_all(&self) -> Result<Vec<Organization>, AppError> {
        self.list("", None).await
    }

    async fn get_by_id(&self, id: u32) -> Result<Organization, AppError> {
        self.list("WHERE id = ?", Some(id))
            .await?
            .pop()
            .ok_or(AppError::NotFound { entity: Self::ENTITY, id })
    }

    async fn add(&self, input: OrganizationInput) -> Result<Organization, AppError> {
        Self::validate(&input)?;
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query("INSERT INTO organization (name) VALUES (?)")
            .bind(&input.name)
            .execute(&mut *conn)
            .await?;
        let id = inserted_id(&mut conn, &result).await?;
        drop(conn);
        tracing::info!(id, name = %input.name, "Created organization");
        self.get_by_id(id).await
    }

    async fn update(&self, id: u32, input: OrganizationInput) -> Result<Organization, AppError> {
        Self::validate(&input)?;
        ensure_exists(&self.pool, "organization", Self::ENTITY, id).await?;
        sqlx::query("UPDATE organization SET name = ? WHERE id = ?")
            .bind(&input.name)
            .bind(i64::from(id))
            .execute(&self.pool)
            .await?;
        self.get_by_id(id).await
    }

    async fn delete(&self, id: u32) -> Result<(), AppError> {
        delete_row(&self.pool, "organization", Self::ENTITY, id).await
    }
}

fn row_to_organization(row: &AnyRow) -> Result<Organization, AppError> {
    Ok(Organization {
        id: id_column(row, "id")?,
        name: row.try_get("name")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;

    fn input(name: &str) -> OrganizationInput {
        OrganizationInput {
            id: None,
            name: name.to_string(),
        }
    }

    #[tokio::test]
    async fn test_organization_crud() {
        let db = TestDb::new().await;
        let store = OrganizationStore::new(db.pool.clone());

        let prodyna = store.add(input("Prodyna")).await.unwrap();
        let google = store.add(input("Google")).await.unwrap();
        assert_eq!((prodyna.id, google.id), (1, 2));

        let renamed = store.update(2, input("Alphabet")).await.unwrap();
        assert_eq!(renamed.name, "Alphabet");

        store.delete(1).await.unwrap();
        let remaining = store.get_all().await.unwrap();
        assert_eq!(remaining, vec![Organization { id: 2, name: "Alphabet".into() }]);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_validation_error() {
        let db = TestDb::new().await;
        let store = OrganizationStore::new(db.pool.clone());

        store.add(input("Prodyna")).await.unwrap();
        assert!(matches!(
            store.add(input("Prodyna")).await,
            Err(AppError::Validation { .. })
        ));
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_missing_organization() {
        let db = TestDb::new().await;
        let store = OrganizationStore::new(db.pool.clone());
        let err = store.delete(999).await.unwrap_err();
        assert_eq!(err.to_string(), "Organization with id 999 not found");
    }
}
