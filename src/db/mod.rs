//! Database module.
//!
//! Persistence goes through the sqlx `Any` driver so the same stores run
//! against SQLite (local development, tests) and MySQL. Only the DDL differs
//! between the two.

mod events;
mod locations;
mod organizations;
mod persons;
mod rooms;
pub mod seed;
mod talk_dates;
mod talks;
mod topics;

pub use events::*;
pub use locations::*;
pub use organizations::*;
pub use persons::*;
pub use rooms::*;
pub use talk_dates::*;
pub use talks::*;
pub use topics::*;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::any::{AnyConnectOptions, AnyPoolOptions, AnyQueryResult, AnyRow};
use sqlx::AnyConnection;
use sqlx::{AnyPool, ConnectOptions, Row};
use std::path::Path;
use std::str::FromStr;

use crate::config::{DatabaseConfig, DbDriver};
use crate::errors::AppError;

/// CRUD contract shared by every entity store.
///
/// Reads return entities with the related rows their JSON shape includes.
/// A missing row is always reported as [`AppError::NotFound`].
#[async_trait]
pub trait EntityStore: Send + Sync + 'static {
    /// Read shape returned to clients.
    type Entity: Serialize + Send;
    /// Write shape accepted on create and update.
    type Input: DeserializeOwned + Send;

    /// Entity name used in logs and not-found errors.
    const ENTITY: &'static str;

    async fn get_all(&self) -> Result<Vec<Self::Entity>, AppError>;

    async fn get_by_id(&self, id: u32) -> Result<Self::Entity, AppError>;

    async fn add(&self, input: Self::Input) -> Result<Self::Entity, AppError>;

    async fn update(&self, id: u32, input: Self::Input) -> Result<Self::Entity, AppError>;

    async fn delete(&self, id: u32) -> Result<(), AppError>;
}

/// Open the connection pool and make sure the schema exists.
pub async fn init_database(
    config: &DatabaseConfig,
    log_statements: bool,
) -> Result<AnyPool, sqlx::Error> {
    sqlx::any::install_default_drivers();

    if config.driver == DbDriver::Sqlite {
        // Ensure the parent directory exists
        if let Some(parent) = Path::new(&config.name).parent() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
    }

    let mut options = AnyConnectOptions::from_str(&config.url())?;
    if !log_statements {
        options = options.disable_statement_logging();
    }

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool, config.driver).await?;

    Ok(pool)
}

/// Create every table that does not exist yet.
///
/// Tables are created parents first so foreign keys always resolve.
pub async fn run_migrations(pool: &AnyPool, driver: DbDriver) -> Result<(), sqlx::Error> {
    for statement in schema(driver) {
        sqlx::query(&statement).execute(pool).await?;
    }
    tracing::debug!("Schema is up to date");
    Ok(())
}

/// Drop every table, children first.
pub async fn drop_tables(pool: &AnyPool) -> Result<(), sqlx::Error> {
    for table in [
        "talk_person",
        "talk_topic",
        "topic_child",
        "talk_date",
        "talk",
        "topic",
        "person",
        "room",
        "event",
        "organization",
        "location",
    ] {
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Cheap connectivity check used by the liveness probe.
pub async fn ping(pool: &AnyPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

fn schema(driver: DbDriver) -> Vec<String> {
    let (pk, text) = match driver {
        DbDriver::Sqlite => ("INTEGER PRIMARY KEY AUTOINCREMENT", "TEXT"),
        DbDriver::MySql => ("BIGINT PRIMARY KEY AUTO_INCREMENT", "VARCHAR(255)"),
    };
    let fk = "BIGINT NOT NULL";

    vec![
        format!("CREATE TABLE IF NOT EXISTS location (id {pk}, name {text} NOT NULL)"),
        format!("CREATE TABLE IF NOT EXISTS organization (id {pk}, name {text} NOT NULL UNIQUE)"),
        format!(
            "CREATE TABLE IF NOT EXISTS event (
                id {pk},
                name {text} NOT NULL,
                begin_date {text} NOT NULL,
                end_date {text} NOT NULL,
                location_id {fk},
                FOREIGN KEY (location_id) REFERENCES location(id)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS room (
                id {pk},
                name {text} NOT NULL,
                organization_id {fk},
                FOREIGN KEY (organization_id) REFERENCES organization(id)
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS person (
                id {pk},
                name {text} NOT NULL,
                organization_id {fk},
                FOREIGN KEY (organization_id) REFERENCES organization(id)
            )"
        ),
        format!("CREATE TABLE IF NOT EXISTS topic (id {pk}, name {text} NOT NULL)"),
        format!(
            "CREATE TABLE IF NOT EXISTS topic_child (
                parent_topic_id {fk},
                child_topic_id {fk},
                PRIMARY KEY (parent_topic_id, child_topic_id),
                FOREIGN KEY (parent_topic_id) REFERENCES topic(id) ON DELETE CASCADE,
                FOREIGN KEY (child_topic_id) REFERENCES topic(id) ON DELETE CASCADE
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS talk (
                id {pk},
                title {text} NOT NULL,
                duration_in_minutes BIGINT NOT NULL,
                language {text} NOT NULL,
                level {text} NOT NULL
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS talk_person (
                talk_id {fk},
                person_id {fk},
                PRIMARY KEY (talk_id, person_id),
                FOREIGN KEY (talk_id) REFERENCES talk(id) ON DELETE CASCADE,
                FOREIGN KEY (person_id) REFERENCES person(id) ON DELETE CASCADE
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS talk_topic (
                talk_id {fk},
                topic_id {fk},
                PRIMARY KEY (talk_id, topic_id),
                FOREIGN KEY (talk_id) REFERENCES talk(id) ON DELETE CASCADE,
                FOREIGN KEY (topic_id) REFERENCES topic(id) ON DELETE CASCADE
            )"
        ),
        format!(
            "CREATE TABLE IF NOT EXISTS talk_date (
                id {pk},
                begin_date {text} NOT NULL,
                talk_id {fk},
                room_id {fk},
                event_id {fk},
                location_id {fk},
                FOREIGN KEY (talk_id) REFERENCES talk(id) ON DELETE CASCADE,
                FOREIGN KEY (room_id) REFERENCES room(id),
                FOREIGN KEY (event_id) REFERENCES event(id),
                FOREIGN KEY (location_id) REFERENCES location(id)
            )"
        ),
        "CREATE INDEX IF NOT EXISTS idx_talk_date_event ON talk_date(event_id)".to_string(),
        "CREATE INDEX IF NOT EXISTS idx_talk_date_talk ON talk_date(talk_id)".to_string(),
    ]
    .into_iter()
    .filter(|statement| driver == DbDriver::Sqlite || !statement.contains("INDEX IF NOT EXISTS"))
    .collect()
}

// Helper functions for row conversion

/// Read an id column, stored as a signed 64-bit integer.
pub(crate) fn id_column(row: &AnyRow, column: &str) -> Result<u32, AppError> {
    let raw: i64 = row.try_get(column)?;
    u32::try_from(raw)
        .map_err(|_| AppError::Infrastructure(format!("{column} out of range: {raw}")))
}

/// Read an RFC 3339 timestamp column.
pub(crate) fn timestamp_column(row: &AnyRow, column: &str) -> Result<DateTime<Utc>, AppError> {
    let raw: String = row.try_get(column)?;
    Ok(DateTime::parse_from_rfc3339(&raw)?.with_timezone(&Utc))
}

pub(crate) fn timestamp_text(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

/// Id generated by the `INSERT` that produced `result` on `conn`.
///
/// MySQL reports it with the query result. The SQLite backend of the `Any`
/// driver does not, so it is read back with `last_insert_rowid()`, which is
/// scoped to the connection. `conn` must be the one that ran the insert.
pub(crate) async fn inserted_id(
    conn: &mut AnyConnection,
    result: &AnyQueryResult,
) -> Result<u32, AppError> {
    let raw = match result.last_insert_id() {
        Some(raw) => raw,
        None => {
            sqlx::query_scalar::<_, i64>("SELECT last_insert_rowid()")
                .fetch_one(&mut *conn)
                .await?
        }
    };
    u32::try_from(raw)
        .map_err(|_| AppError::Infrastructure(format!("generated id out of range: {raw}")))
}

/// Fail with `NotFound` unless `table` holds a row with this id.
pub(crate) async fn ensure_exists(
    pool: &AnyPool,
    table: &str,
    entity: &'static str,
    id: u32,
) -> Result<(), AppError> {
    let row = sqlx::query(&format!("SELECT id FROM {table} WHERE id = ?"))
        .bind(i64::from(id))
        .fetch_optional(pool)
        .await?;
    match row {
        Some(_) => Ok(()),
        None => {
            tracing::debug!(entity, id, "Entity not found");
            Err(AppError::NotFound { entity, id })
        }
    }
}

/// Delete one row by id, reporting `NotFound` when nothing was deleted.
pub(crate) async fn delete_row(
    pool: &AnyPool,
    table: &str,
    entity: &'static str,
    id: u32,
) -> Result<(), AppError> {
    let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
        .bind(i64::from(id))
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        tracing::debug!(entity, id, "Entity to delete not found");
        return Err(AppError::NotFound { entity, id });
    }

    tracing::debug!(entity, id, "Deleted entity");
    Ok(())
}

/// Reject blank names and titles.
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::validation(field, "is required"));
    }
    Ok(())
}

/// Reject a missing reference.
pub(crate) fn require_reference(
    field: &str,
    reference: Option<crate::models::Reference>,
) -> Result<u32, AppError> {
    reference
        .map(|r| r.id)
        .ok_or_else(|| AppError::validation(field, "is required"))
}
