//! Topic store.
//!
//! Topics form a directed graph through `topic_child`. A topic lists its
//! direct children by id and name only, so arbitrary graphs (cycles
//! included) serialize without recursion.

use async_trait::async_trait;
use sqlx::{Any, AnyPool, Row, Transaction};

use super::{delete_row, ensure_exists, id_column, inserted_id, require_text, EntityStore};
use crate::errors::AppError;
use crate::models::{reference_ids, Topic, TopicInput, TopicRef};

#[derive(Clone)]
pub struct TopicStore {
    pool: AnyPool,
}

impl TopicStore {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Topics covered by talks scheduled at the event.
    pub async fn get_by_event_id(&self, event_id: u32) -> Result<Vec<Topic>, AppError> {
        self.list(
            "WHERE id IN (SELECT talk_topic.topic_id FROM talk_topic \
             JOIN talk_date ON talk_date.talk_id = talk_topic.talk_id \
             WHERE talk_date.event_id = ?)",
            Some(event_id),
        )
        .await
    }

    pub async fn get_by_talk_id(&self, talk_id: u32) -> Result<Vec<Topic>, AppError> {
        self.list(
            "WHERE id IN (SELECT topic_id FROM talk_topic WHERE talk_id = ?)",
            Some(talk_id),
        )
        .await
    }

    async fn list(&self, filter: &str, arg: Option<u32>) -> Result<Vec<Topic>, AppError> {
        let sql = format!("SELECT id, name FROM topic {filter} ORDER BY id");
        let mut query = sqlx::query(&sql);
        if let Some(arg) = arg {
            query = query.bind(i64::from(arg));
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut topics = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = id_column(row, "id")?;
            topics.push(Topic {
                id,
                name: row.try_get("name")?,
                children: self.children(id).await?,
            });
        }
        Ok(topics)
    }

    async fn children(&self, parent_id: u32) -> Result<Vec<TopicRef>, AppError> {
        let rows = sqlx::query(
            "SELECT topic.id, topic.name FROM topic \
             JOIN topic_child ON topic_child.child_topic_id = topic.id \
             WHERE topic_child.parent_topic_id = ? ORDER BY topic.id",
        )
        .bind(i64::from(parent_id))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(TopicRef {
                    id: id_column(row, "id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn link_children(
        tx: &mut Transaction<'static, Any>,
        parent_id: u32,
        input: &TopicInput,
    ) -> Result<(), AppError> {
        for child_id in reference_ids(&input.children) {
            sqlx::query("INSERT INTO topic_child (parent_topic_id, child_topic_id) VALUES (?, ?)")
                .bind(i64::from(parent_id))
                .bind(i64::from(child_id))
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for TopicStore {
    type Entity = Topic;
    type Input = TopicInput;

    const ENTITY: &'static str = "Topic";

    async fn get_all(&self) -> Result<Vec<Topic>, AppError> {
        self.list("", None).await
    }

    async fn get_by_id(&self, id: u32) -> Result<Topic, AppError> {
        self.list("WHERE id = ?", Some(id))
            .await?
            .pop()
            .ok_or(AppError::NotFound { entity: Self::ENTITY, id })
    }

    async fn add(&self, input: TopicInput) -> Result<Topic, AppError> {
        require_text("name", &input.name)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("INSERT INTO topic (name) VALUES (?)")
            .bind(&input.name)
            .execute(&mut *tx)
            .await?;
        let id = inserted_id(&mut tx, &result).await?;
        Self::link_children(&mut tx, id, &input).await?;
        tx.commit().await?;

        tracing::info!(id, name = %input.name, "Created topic");
        self.get_by_id(id).await
    }

    async fn update(&self, id: u32, input: TopicInput) -> Result<Topic, AppError> {
        require_text("name", &input.name)?;
        ensure_exists(&self.pool, "topic", Self::ENTITY, id).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE topic SET name = ? WHERE id = ?")
            .bind(&input.name)
            .bind(i64::from(id))
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM topic_child WHERE parent_topic_id = ?")
            .bind(i64::from(id))
            .execute(&mut *tx)
            .await?;
        Self::link_children(&mut tx, id, &input).await?;
        tx.commit().await?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: u32) -> Result<(), AppError> {
        delete_row(&self.pool, "topic", Self::ENTITY, id).await
    }
}
