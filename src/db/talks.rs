//! Talk store.
//!
//! A talk carries its speakers and topics through the `talk_person` and
//! `talk_topic` join tables, and lists the slots it is scheduled in.

use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{Any, AnyPool, Row, Transaction};

use super::{
    delete_row, ensure_exists, id_column, inserted_id, require_text, timestamp_column,
    EntityStore, EventStore, PersonStore, TopicStore,
};
use crate::errors::AppError;
use crate::models::{reference_ids, Talk, TalkInput, TalkLevel, TalkSlot};

const COLUMNS: &str = "id, title, duration_in_minutes, language, level";

#[derive(Clone)]
pub struct TalkStore {
    pool: AnyPool,
    persons: PersonStore,
    topics: TopicStore,
    events: EventStore,
}

impl TalkStore {
    pub fn new(pool: AnyPool) -> Self {
        Self {
            persons: PersonStore::new(pool.clone()),
            topics: TopicStore::new(pool.clone()),
            events: EventStore::new(pool.clone()),
            pool,
        }
    }

    /// Talks with at least one slot at the event.
    pub async fn get_by_event_id(&self, event_id: u32) -> Result<Vec<Talk>, AppError> {
        self.list(
            "WHERE id IN (SELECT talk_id FROM talk_date WHERE event_id = ?)",
            Some(event_id),
            true,
        )
        .await
    }

    /// Talks the person speaks at.
    pub async fn get_by_person_id(&self, person_id: u32) -> Result<Vec<Talk>, AppError> {
        self.list(
            "WHERE id IN (SELECT talk_id FROM talk_person WHERE person_id = ?)",
            Some(person_id),
            true,
        )
        .await
    }

    /// The talk without its schedule, as embedded in a talk date.
    pub async fn get_summary(&self, id: u32) -> Result<Talk, AppError> {
        self.list("WHERE id = ?", Some(id), false)
            .await?
            .pop()
            .ok_or(AppError::NotFound { entity: Self::ENTITY, id })
    }

    async fn list(
        &self,
        filter: &str,
        arg: Option<u32>,
        with_slots: bool,
    ) -> Result<Vec<Talk>, AppError> {
        let sql = format!("SELECT {COLUMNS} FROM talk {filter} ORDER BY id");
        let mut query = sqlx::query(&sql);
        if let Some(arg) = arg {
            query = query.bind(i64::from(arg));
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut talks = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut talk = self.hydrate(row).await?;
            if with_slots {
                talk.talk_dates = Some(self.slots(talk.id).await?);
            }
            talks.push(talk);
        }
        Ok(talks)
    }

    async fn hydrate(&self, row: &AnyRow) -> Result<Talk, AppError> {
        let id = id_column(row, "id")?;
        let level: String = row.try_get("level")?;
        let duration: i64 = row.try_get("duration_in_minutes")?;

        Ok(Talk {
            id,
            title: row.try_get("title")?,
            duration_in_minutes: u32::try_from(duration)
                .map_err(|_| AppError::Infrastructure(format!("duration out of range: {duration}")))?,
            language: row.try_get("language")?,
            level: level.parse::<TalkLevel>().map_err(AppError::Infrastructure)?,
            persons: self.persons.get_by_talk_id(id).await?,
            topics: self.topics.get_by_talk_id(id).await?,
            talk_dates: None,
        })
    }

    async fn slots(&self, talk_id: u32) -> Result<Vec<TalkSlot>, AppError> {
        let rows = sqlx::query(
            "SELECT id, begin_date, event_id FROM talk_date WHERE talk_id = ? ORDER BY id",
        )
        .bind(i64::from(talk_id))
        .fetch_all(&self.pool)
        .await?;

        let mut slots = Vec::with_capacity(rows.len());
        for row in &rows {
            slots.push(TalkSlot {
                id: id_column(row, "id")?,
                begin_date: timestamp_column(row, "begin_date")?,
                event: self.events.get_by_id(id_column(row, "event_id")?).await?,
            });
        }
        Ok(slots)
    }

    async fn link(
        tx: &mut Transaction<'static, Any>,
        talk_id: u32,
        input: &TalkInput,
    ) -> Result<(), AppError> {
        for person_id in reference_ids(&input.persons) {
            sqlx::query("INSERT INTO talk_person (talk_id, person_id) VALUES (?, ?)")
                .bind(i64::from(talk_id))
                .bind(i64::from(person_id))
                .execute(&mut **tx)
                .await?;
        }
        for topic_id in reference_ids(&input.topics) {
            sqlx::query("INSERT INTO talk_topic (talk_id, topic_id) VALUES (?, ?)")
                .bind(i64::from(talk_id))
                .bind(i64::from(topic_id))
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl EntityStore for TalkStore {
    type Entity = Talk;
    type Input = TalkInput;

    const ENTITY: &'static str = "Talk";

    async fn get_all(&self) -> Result<Vec<Talk>, AppError> {
        self.list("", None, true).await
    }

    async fn get_by_id(&self, id: u32) -> Result<Talk, AppError> {
        self.list("WHERE id = ?", Some(id), true)
            .await?
            .pop()
            .ok_or(AppError::NotFound { entity: Self::ENTITY, id })
    }

    async fn add(&self, input: TalkInput) -> Result<Talk, AppError> {
        require_text("title", &input.title)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "INSERT INTO talk (title, duration_in_minutes, language, level) VALUES (?, ?, ?, ?)",
        )
        .bind(&input.title)
        .bind(i64::from(input.duration_in_minutes))
        .bind(&input.language)
        .bind(input.level.as_str())
        .execute(&mut *tx)
        .await?;
        let id = inserted_id(&mut tx, &result).await?;
        Self::link(&mut tx, id, &input).await?;
        tx.commit().await?;

        tracing::info!(id, title = %input.title, "Created talk");
        self.get_by_id(id).await
    }

    async fn update(&self, id: u32, input: TalkInput) -> Result<Talk, AppError> {
        require_text("title", &input.title)?;
        ensure_exists(&self.pool, "talk", Self::ENTITY, id).await?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "UPDATE talk SET title = ?, duration_in_minutes = ?, language = ?, level = ? WHERE id = ?",
        )
        .bind(&input.title)
        .bind(i64::from(input.duration_in_minutes))
        .bind(&input.language)
        .bind(input.level.as_str())
        .bind(i64::from(id))
        .execute(&mut *tx)
        .await?;
        for table in ["talk_person", "talk_topic"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE talk_id = ?"))
                .bind(i64::from(id))
                .execute(&mut *tx)
                .await?;
        }
        Self::link(&mut tx, id, &input).await?;
        tx.commit().await?;

        self.get_by_id(id).await
    }

    async fn delete(&self, id: u32) -> Result<(), AppError> {
        delete_row(&self.pool, "talk", Self::ENTITY, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed, test_support::TestDb};
    use crate::models::Reference;

    async fn seeded() -> (TestDb, TalkStore) {
        let db = TestDb::new().await;
        seed::reseed(&db.pool, crate::config::DbDriver::Sqlite)
            .await
            .unwrap();
        let store = TalkStore::new(db.pool.clone());
        (db, store)
    }

    #[tokio::test]
    async fn test_talk_loads_relations() {
        let (_db, store) = seeded().await;
        let talk = store.get_by_id(1).await.unwrap();

        assert_eq!(talk.title, "Java, Spring, and You");
        assert_eq!(talk.level, TalkLevel::Beginner);
        let persons: Vec<u32> = talk.persons.iter().map(|p| p.id).collect();
        assert_eq!(persons, vec![1, 2]);
        let topics: Vec<u32> = talk.topics.iter().map(|t| t.id).collect();
        assert_eq!(topics, vec![1, 2, 3]);

        let slots = talk.talk_dates.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].event.name, "Best Java Conference");
    }

    #[tokio::test]
    async fn test_summary_has_no_slots() {
        let (_db, store) = seeded().await;
        assert!(store.get_summary(3).await.unwrap().talk_dates.is_none());
    }

    #[tokio::test]
    async fn test_relation_queries() {
        let (_db, store) = seeded().await;

        let at_it_connect: Vec<u32> = store
            .get_by_event_id(3)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(at_it_connect, vec![3, 4]);

        let by_goran: Vec<u32> = store
            .get_by_person_id(2)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(by_goran, vec![1, 3]);

        assert!(store.get_by_event_id(4).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_join_rows() {
        let (_db, store) = seeded().await;
        let updated = store
            .update(
                2,
                TalkInput {
                    id: Some(2),
                    title: "Fullstack TypeScript".into(),
                    duration_in_minutes: 45,
                    language: "English".into(),
                    level: TalkLevel::Advanced,
                    persons: vec![Reference { id: 4 }],
                    topics: vec![],
                    talk_dates: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.duration_in_minutes, 45);
        assert_eq!(updated.persons.len(), 1);
        assert_eq!(updated.persons[0].name, "Aaron Koblin");
        assert!(updated.topics.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_speaker_leaves_no_talk() {
        let (_db, store) = seeded().await;
        let before = store.get_all().await.unwrap().len();
        let result = store
            .add(TalkInput {
                id: None,
                title: "Ghost talk".into(),
                duration_in_minutes: 30,
                language: "English".into(),
                level: TalkLevel::Expert,
                persons: vec![Reference { id: 99 }],
                topics: vec![],
                talk_dates: None,
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
        assert_eq!(store.get_all().await.unwrap().len(), before);
    }

    #[tokio::test]
    async fn test_delete_cascades_slots() {
        let (db, store) = seeded().await;
        store.delete(1).await.unwrap();
        let remaining: i64 = sqlx::query("SELECT COUNT(*) AS n FROM talk_date WHERE talk_id = 1")
            .fetch_one(&db.pool)
            .await
            .unwrap()
            .try_get("n")
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
