//! Event model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Location, Reference};

/// A conference or fair held at a location over a date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: u32,
    pub name: String,
    pub begin_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: Location,
}

/// Request body for creating or replacing an event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EventInput {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: String,
    pub begin_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<Reference>,
}
