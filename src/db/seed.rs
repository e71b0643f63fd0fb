//! Demonstration dataset.
//!
//! [`reseed`] wipes every table and loads a small set of Belgrade
//! conferences. It runs at startup when configured and behind
//! `POST /initDB`.

use chrono::{DateTime, TimeZone, Utc};
use sqlx::AnyPool;

use super::{
    drop_tables, run_migrations, EntityStore, EventStore, LocationStore, OrganizationStore,
    PersonStore, RoomStore, TalkDateStore, TalkStore, TopicStore,
};
use crate::config::DbDriver;
use crate::errors::AppError;
use crate::models::{
    EventInput, LocationInput, OrganizationInput, PersonInput, Reference, RoomInput,
    TalkDateInput, TalkInput, TalkLevel, TopicInput,
};

fn date(year: i32, month: u32, day: u32, hour: u32) -> Result<DateTime<Utc>, AppError> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .ok_or_else(|| AppError::Infrastructure(format!("invalid seed date {year}-{month}-{day}")))
}

fn refs(ids: &[u32]) -> Vec<Reference> {
    ids.iter().copied().map(Reference::from).collect()
}

/// Drop all tables, recreate the schema and insert the dataset.
pub async fn reseed(pool: &AnyPool, driver: DbDriver) -> Result<(), AppError> {
    tracing::warn!("Dropping all tables and loading the demonstration dataset");
    drop_tables(pool).await?;
    run_migrations(pool, driver).await?;

    let locations = LocationStore::new(pool.clone());
    for name in ["Belexpo Centar", "Hotel Plaza", "Belgrade Fair Building One"] {
        locations
            .add(LocationInput {
                id: None,
                name: name.to_string(),
            })
            .await?;
    }

    let events = EventStore::new(pool.clone());
    for (name, begin, end, location) in [
        ("Best Java Conference", (5, 12), (5, 14), 1),
        ("Prodyna Job Fair", (5, 2), (5, 5), 2),
        ("IT Connect", (5, 10), (5, 12), 2),
        ("Cloud Native Conference", (5, 22), (5, 23), 3),
        ("Google I/O", (6, 2), (6, 5), 3),
    ] {
        events
            .add(EventInput {
                id: None,
                name: name.to_string(),
                begin_date: date(2021, begin.0, begin.1, 0)?,
                end_date: date(2021, end.0, end.1, 0)?,
                location: Some(Reference { id: location }),
            })
            .await?;
    }

    let organizations = OrganizationStore::new(pool.clone());
    for name in ["Prodyna", "Google"] {
        organizations
            .add(OrganizationInput {
                id: None,
                name: name.to_string(),
            })
            .await?;
    }

    let rooms = RoomStore::new(pool.clone());
    for (name, organization) in [
        ("Red Room", 1),
        ("White Room", 1),
        ("Blue Room", 1),
        ("Google Room", 2),
    ] {
        rooms
            .add(RoomInput {
                id: None,
                name: name.to_string(),
                organization: Some(Reference { id: organization }),
            })
            .await?;
    }

    let topics = TopicStore::new(pool.clone());
    let topic_rows: [(&str, &[u32]); 6] = [
        ("Java", &[]),
        ("Hibernate", &[1]),
        ("Spring", &[1, 2]),
        ("Kubernetes", &[]),
        ("JavaScript", &[]),
        ("Job Market", &[]),
    ];
    for (name, children) in topic_rows {
        topics
            .add(TopicInput {
                id: None,
                name: name.to_string(),
                children: refs(children),
            })
            .await?;
    }

    let persons = PersonStore::new(pool.clone());
    for (name, organization) in [
        ("Darko Krizic", 1),
        ("Goran Grujic", 1),
        ("Milos Nikolic", 1),
        ("Aaron Koblin", 2),
    ] {
        persons
            .add(PersonInput {
                id: None,
                name: name.to_string(),
                organization: Some(Reference { id: organization }),
            })
            .await?;
    }

    let talks = TalkStore::new(pool.clone());
    let talk_rows: [(&str, u32, &str, TalkLevel, &[u32], &[u32]); 4] = [
        ("Java, Spring, and You", 90, "English", TalkLevel::Beginner, &[1, 2], &[1, 3, 2]),
        ("Fullstack JavaScript on Kubernetes", 60, "Serbian", TalkLevel::Expert, &[3], &[5, 4]),
        ("Java for Beginners", 60, "English", TalkLevel::Beginner, &[2], &[1]),
        ("The IT Job Market Today", 60, "English", TalkLevel::Beginner, &[4], &[1, 6]),
    ];
    for (title, duration, language, level, speakers, subjects) in talk_rows {
        talks
            .add(TalkInput {
                id: None,
                title: title.to_string(),
                duration_in_minutes: duration,
                language: language.to_string(),
                level,
                persons: refs(speakers),
                topics: refs(subjects),
                talk_dates: None,
            })
            .await?;
    }

    // (month, day, hour, talk, room, event, location)
    let talk_dates = TalkDateStore::new(pool.clone());
    for (month, day, hour, talk, room, event, location) in [
        (5, 12, 14, 1, 1, 1, 1),
        (5, 2, 10, 2, 2, 2, 2),
        (5, 2, 13, 3, 2, 2, 2),
        (5, 10, 14, 3, 3, 3, 2),
        (6, 2, 15, 4, 4, 5, 3),
        (5, 10, 12, 4, 3, 3, 2),
    ] {
        talk_dates
            .add(TalkDateInput {
                id: None,
                begin_date: date(2021, month, day, hour)?,
                talk: Some(Reference { id: talk }),
                room: Some(Reference { id: room }),
                event: Some(Reference { id: event }),
                location: Some(Reference { id: location }),
            })
            .await?;
    }

    tracing::info!("Demonstration dataset loaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::TestDb;

    #[tokio::test]
    async fn test_reseed_is_repeatable() {
        let db = TestDb::new().await;
        reseed(&db.pool, DbDriver::Sqlite).await.unwrap();
        reseed(&db.pool, DbDriver::Sqlite).await.unwrap();

        let events = EventStore::new(db.pool.clone());
        assert_eq!(events.get_all().await.unwrap().len(), 5);
        let spring = TopicStore::new(db.pool.clone()).get_by_id(3).await.unwrap();
        assert_eq!(spring.children.len(), 2);
        assert_eq!(TalkDateStore::new(db.pool.clone()).get_all().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_event_relations_after_seed() {
        let db = TestDb::new().await;
        reseed(&db.pool, DbDriver::Sqlite).await.unwrap();

        let events = EventStore::new(db.pool.clone());
        let for_talk_four: Vec<u32> = events
            .get_by_talk_id(4)
            .await
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(for_talk_four, vec![3, 5]);

        let topics = TopicStore::new(db.pool.clone());
        let at_job_fair: Vec<u32> = topics
            .get_by_event_id(2)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(at_job_fair, vec![1, 4, 5]);
    }
}
