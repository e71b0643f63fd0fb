//! TalkDate model: a talk scheduled in a room at an event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Event, Location, Reference, Room, Talk};

/// A scheduled occurrence of a talk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TalkDate {
    pub id: u32,
    pub begin_date: DateTime<Utc>,
    pub talk: Talk,
    pub room: Room,
    pub event: Event,
    pub location: Location,
}

/// Request body for creating or replacing a talk date. All references are required.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TalkDateInput {
    #[serde(default)]
    pub id: Option<u32>,
    pub begin_date: DateTime<Utc>,
    #[serde(default)]
    pub talk: Option<Reference>,
    #[serde(default)]
    pub room: Option<Reference>,
    #[serde(default)]
    pub event: Option<Reference>,
    #[serde(default)]
    pub location: Option<Reference>,
}
