//! TalkDate store: one scheduled slot of a talk in a room at an event.

use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::AnyPool;

use super::{
    delete_row, ensure_exists, id_column, inserted_id, require_reference, timestamp_column,
    timestamp_text, EntityStore, EventStore, LocationStore, RoomStore, TalkStore,
};
use crate::errors::AppError;
use crate::models::{TalkDate, TalkDateInput};

const COLUMNS: &str = "id, begin_date, talk_id, room_id, event_id, location_id";

#[derive(Clone)]
pub struct TalkDateStore {
    pool: AnyPool,
    talks: TalkStore,
    rooms: RoomStore,
    events: EventStore,
    locations: LocationStore,
}

/// Foreign keys of a validated talk date.
struct Slot {
    talk_id: u32,
    room_id: u32,
    event_id: u32,
    location_id: u32,
}

impl TalkDateStore {
    pub fn new(pool: AnyPool) -> Self {
        Self {
            talks: TalkStore::new(pool.clone()),
            rooms: RoomStore::new(pool.clone()),
            events: EventStore::new(pool.clone()),
            locations: LocationStore::new(pool.clone()),
            pool,
        }
    }

    pub async fn get_by_event_id(&self, event_id: u32) -> Result<Vec<TalkDate>, AppError> {
        self.list("WHERE event_id = ?", Some(event_id)).await
    }

    async fn list(&self, filter: &str, arg: Option<u32>) -> Result<Vec<TalkDate>, AppError> {
        let sql = format!("SELECT {COLUMNS} FROM talk_date {filter} ORDER BY id");
        let mut query = sqlx::query(&sql);
        if let Some(arg) = arg {
            query = query.bind(i64::from(arg));
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut talk_dates = Vec::with_capacity(rows.len());
        for row in &rows {
            talk_dates.push(self.hydrate(row).await?);
        }
        Ok(talk_dates)
    }

    async fn hydrate(&self, row: &AnyRow) -> Result<TalkDate, AppError> {
        Ok(TalkDate {
            id: id_column(row, "id")?,
            begin_date: timestamp_column(row, "begin_date")?,
            talk: self.talks.get_summary(id_column(row, "talk_id")?).await?,
            room: self.rooms.get_by_id(id_column(row, "room_id")?).await?,
            event: self.events.get_by_id(id_column(row, "event_id")?).await?,
            location: self
                .locations
                .get_by_id(id_column(row, "location_id")?)
                .await?,
        })
    }

    fn validate(input: &TalkDateInput) -> Result<Slot, AppError> {
        Ok(Slot {
            talk_id: require_reference("talk", input.talk)?,
            room_id: require_reference("room", input.room)?,
            event_id: require_reference("event", input.event)?,
            location_id: require_reference("location", input.location)?,
        })
    }
}

#[async_trait]
impl EntityStore for TalkDateStore {
    type Entity = TalkDate;
    type Input = TalkDateInput;

    const ENTITY: &'static str = "TalkDate";

    async fn get_all(&self) -> Result<Vec<TalkDate>, AppError> {
        self.list("", None).await
    }

    async fn get_by_id(&self, id: u32) -> Result<TalkDate, AppError> {
        self.list("WHERE id = ?", Some(id))
            .await?
            .pop()
            .ok_or(AppError::NotFound { entity: Self::ENTITY, id })
    }

    async fn add(&self, input: TalkDateInput) -> Result<TalkDate, AppError> {
        let slot = Self::validate(&input)?;
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            "INSERT INTO talk_date (begin_date, talk_id, room_id, event_id, location_id) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(timestamp_text(&input.begin_date))
        .bind(i64::from(slot.talk_id))
        .bind(i64::from(slot.room_id))
        .bind(i64::from(slot.event_id))
        .bind(i64::from(slot.location_id))
        .execute(&mut *conn)
        .await?;
        let id = inserted_id(&mut conn, &result).await?;
        drop(conn);
        tracing::info!(id, talk_id = slot.talk_id, event_id = slot.event_id, "Scheduled talk");
        self.get_by_id(id).await
    }

    async fn update(&self, id: u32, input: TalkDateInput) -> Result<TalkDate, AppError> {
        let slot = Self::validate(&input)?;
        ensure_exists(&self.pool, "talk_date", Self::ENTITY, id).await?;
        sqlx::query(
            "UPDATE talk_date SET begin_date = ?, talk_id = ?, room_id = ?, event_id = ?, \
             location_id = ? WHERE id = ?",
        )
        .bind(timestamp_text(&input.begin_date))
        .bind(i64::from(slot.talk_id))
        .bind(i64::from(slot.room_id))
        .bind(i64::from(slot.event_id))
        .bind(i64::from(slot.location_id))
        .bind(i64::from(id))
        .execute(&self.pool)
        .await?;
        self.get_by_id(id).await
    }

    async fn delete(&self, id: u32) -> Result<(), AppError> {
        delete_row(&self.pool, "talk_date", Self::ENTITY, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DbDriver;
    use crate::db::{seed, test_support::TestDb};
    use crate::models::Reference;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_talk_date_embeds_summary() {
        let db = TestDb::new().await;
        seed::reseed(&db.pool, DbDriver::Sqlite).await.unwrap();
        let store = TalkDateStore::new(db.pool.clone());

        let slot = store.get_by_id(5).await.unwrap();
        assert_eq!(slot.talk.title, "The IT Job Market Today");
        assert!(slot.talk.talk_dates.is_none());
        assert_eq!(slot.room.name, "Google Room");
        assert_eq!(slot.event.name, "Google I/O");
        assert_eq!(slot.location.id, 3);
        assert_eq!(slot.begin_date, Utc.with_ymd_and_hms(2021, 6, 2, 15, 0, 0).unwrap());

        let ids: Vec<u32> = store
            .get_by_event_id(3)
            .await
            .unwrap()
            .iter()
            .map(|td| td.id)
            .collect();
        assert_eq!(ids, vec![4, 6]);
    }

    #[tokio::test]
    async fn test_talk_date_requires_every_reference() {
        let db = TestDb::new().await;
        let store = TalkDateStore::new(db.pool.clone());
        let err = store
            .add(TalkDateInput {
                id: None,
                begin_date: Utc::now(),
                talk: Some(Reference { id: 1 }),
                room: None,
                event: Some(Reference { id: 1 }),
                location: Some(Reference { id: 1 }),
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "room: is required");
    }
}
