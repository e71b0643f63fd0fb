//! Person store. Speakers belong to exactly one organization.

use async_trait::async_trait;
use sqlx::{AnyPool, Row};

use super::{
    delete_row, ensure_exists, id_column, inserted_id, require_reference, require_text,
    EntityStore, OrganizationStore,
};
use crate::errors::AppError;
use crate::models::{Person, PersonInput};

#[derive(Clone)]
pub struct PersonStore {
    pool: AnyPool,
    organizations: OrganizationStore,
}

impl PersonStore {
    pub fn new(pool: AnyPool) -> Self {
        Self {
            organizations: OrganizationStore::new(pool.clone()),
            pool,
        }
    }

    /// Speakers of a talk, ordered by id.
    pub async fn get_by_talk_id(&self, talk_id: u32) -> Result<Vec<Person>, AppError> {
        self.list(
            "WHERE id IN (SELECT person_id FROM talk_person WHERE talk_id = ?)",
            Some(talk_id),
        )
        .await
    }

    async fn list(&self, filter: &str, arg: Option<u32>) -> Result<Vec<Person>, AppError> {
        let sql = format!("SELECT id, name, organization_id FROM person {filter} ORDER BY id");
        let mut query = sqlx::query(&sql);
        if let Some(arg) = arg {
            query = query.bind(i64::from(arg));
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut persons = Vec::with_capacity(rows.len());
        for row in &rows {
            let organization_id = id_column(row, "organization_id")?;
            persons.push(Person {
                id: id_column(row, "id")?,
                name: row.try_get("name")?,
                organization: self.organizations.get_by_id(organization_id).await?,
            });
        }
        Ok(persons)
    }

    fn validate(input: &PersonInput) -> Result<u32, AppError> {
        require_text("name", &input.name)?;
        require_reference("organization", input.organization)
    }
}

#[async_trait]
impl EntityStore for PersonStore {
    type Entity = Person;
    type Input = PersonInput;

    const ENTITY: &'static str = "Person";

    async fn get_all(&self) -> Result<Vec<Person>, AppError> {
        self.list("", None).await
    }

    async fn get_by_id(&self, id: u32) -> Result<Person, AppError> {
        self.list("WHERE id = ?", Some(id))
            .await?
            .pop()
            .ok_or(AppError::NotFound { entity: Self::ENTITY, id })
    }

    async fn add(&self, input: PersonInput) -> Result<Person, AppError> {
        let organization_id = Self::validate(&input)?;
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query("INSERT INTO person (name, organization_id) VALUES (?, ?)")
            .bind(&input.name)
            .bind(i64::from(organization_id))
            .execute(&mut *conn)
            .await?;
        let id = inserted_id(&mut conn, &result).await?;
        drop(conn);
        tracing::info!(id, name = %input.name, "Created person");
        self.get_by_id(id).await
    }

    async fn update(&self, id: u32, input: PersonInput) -> Result<Person, AppError> {
        let organization_id = Self::validate(&input)?;
        ensure_exists(&self.pool, "person", Self::ENTITY, id).await?;
        sqlx::query("UPDATE person SET name = ?, organization_id = ? WHERE id = ?")
            .bind(&input.name)
            .bind(i64::from(organization_id))
            .bind(i64::from(id))
            .execute(&self.pool)
            .await?;
        self.get_by_id(id).await
    }

    async fn delete(&self, id: u32) -> Result<(), AppError> {
        delete_row(&self.pool, "person", Self::ENTITY, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;
    use crate::models::{OrganizationInput, Reference};

    #[tokio::test]
    async fn test_person_listing_is_ordered() {
        let db = TestDb::new().await;
        OrganizationStore::new(db.pool.clone())
            .add(OrganizationInput {
                id: None,
                name: "Google".into(),
            })
            .await
            .unwrap();
        let store = PersonStore::new(db.pool.clone());

        for name in ["Aaron Koblin", "Darko Krizic"] {
            store
                .add(PersonInput {
                    id: None,
                    name: name.into(),
                    organization: Some(Reference { id: 1 }),
                })
                .await
                .unwrap();
        }

        let names: Vec<_> = store
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|p| (p.id, p.name, p.organization.id))
            .collect();
        assert_eq!(
            names,
            vec![
                (1, "Aaron Koblin".to_string(), 1),
                (2, "Darko Krizic".to_string(), 1)
            ]
        );
        assert!(store.get_by_talk_id(1).await.unwrap().is_empty());
    }
}
