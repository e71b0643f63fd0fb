//! Event store.

use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};

use super::{
    delete_row, ensure_exists, id_column, inserted_id, require_reference, require_text,
    timestamp_column, timestamp_text, EntityStore, LocationStore,
};
use crate::errors::AppError;
use crate::models::{Event, EventInput};

const COLUMNS: &str = "id, name, begin_date, end_date, location_id";

#[derive(Clone)]
pub struct EventStore {
    pool: AnyPool,
    locations: LocationStore,
}

impl EventStore {
    pub fn new(pool: AnyPool) -> Self {
        Self {
            locations: LocationStore::new(pool.clone()),
            pool,
        }
    }

    /// Events at which the talk has at least one scheduled slot.
    pub async fn get_by_talk_id(&self, talk_id: u32) -> Result<Vec<Event>, AppError> {
        self.list(
            "WHERE id IN (SELECT event_id FROM talk_date WHERE talk_id = ?)",
            Some(talk_id),
        )
        .await
    }

    async fn list(&self, filter: &str, arg: Option<u32>) -> Result<Vec<Event>, AppError> {
        let sql = format!("SELECT {COLUMNS} FROM event {filter} ORDER BY id");
        let mut query = sqlx::query(&sql);
        if let Some(arg) = arg {
            query = query.bind(i64::from(arg));
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            events.push(self.hydrate(row).await?);
        }
        Ok(events)
    }

    async fn hydrate(&self, row: &AnyRow) -> Result<Event, AppError> {
        let location_id = id_column(row, "location_id")?;
        Ok(Event {
            id: id_column(row, "id")?,
            name: row.try_get("name")?,
            begin_date: timestamp_column(row, "begin_date")?,
            end_date: timestamp_column(row, "end_date")?,
            location: self.locations.get_by_id(location_id).await?,
        })
    }

    fn validate(input: &EventInput) -> Result<u32, AppError> {
        require_text("name", &input.name)?;
        if input.end_date < input.begin_date {
            return Err(AppError::validation("endDate", "must not be before beginDate"));
        }
        require_reference("location", input.location)
    }
}

#[async_trait]
impl EntityStore for EventStore {
    type Entity = Event;
    type Input = EventInput;

    const ENTITY: &'static str = "Event";

    async fn get_all(&self) -> Result<Vec<Event>, AppError> {
        self.list("", None).await
    }

    async fn get_by_id(&self, id: u32) -> Result<Event, AppError> {
        self.list("WHERE id = ?", Some(id))
            .await?
            .pop()
            .ok_or(AppError::NotFound { entity: Self::ENTITY, id })
    }

    async fn add(&self, input: EventInput) -> Result<Event, AppError> {
        let location_id = Self::validate(&input)?;
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            "INSERT INTO event (name, begin_date, end_date, location_id) VALUES (?, ?, ?, ?)",
        )
        .bind(&input.name)
        .bind(timestamp_text(&input.begin_date))
        .bind(timestamp_text(&input.end_date))
        .bind(i64::from(location_id))
        .execute(&mut *conn)
        .await?;
        let id = inserted_id(&mut conn, &result).await?;
        drop(conn);
        tracing::info!(id, name = %input.name, "Created event");
        self.get_by_id(id).await
    }

    async fn update(&self, id: u32, input: EventInput) -> Result<Event, AppError> {
        let location_id = Self::validate(&input)?;
        ensure_exists(&self.pool, "event", Self::ENTITY, id).await?;
        sqlx::query(
            "UPDATE event SET name = ?, begin_date = ?, end_date = ?, location_id = ? WHERE id = ?",
        )
        .bind(&input.name)
        .bind(timestamp_text(&input.begin_date))
        .bind(timestamp_text(&input.end_date))
        .bind(i64::from(location_id))
        .bind(i64::from(id))
        .execute(&self.pool)
        .await?;
        self.get_by_id(id).await
    }

    async fn delete(&self, id: u32) -> Result<(), AppError> {
        delete_row(&self.pool, "event", Self::ENTITY, id).await
    }
}
