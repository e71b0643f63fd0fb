//! Talk model.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use super::{Event, Person, Reference, Topic};

/// Audience level of a talk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TalkLevel {
    Beginner,
    Advanced,
    Expert,
}

impl TalkLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TalkLevel::Beginner => "beginner",
            TalkLevel::Advanced => "advanced",
            TalkLevel::Expert => "expert",
        }
    }
}

impl FromStr for TalkLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "beginner" => Ok(TalkLevel::Beginner),
            "advanced" => Ok(TalkLevel::Advanced),
            "expert" => Ok(TalkLevel::Expert),
            other => Err(format!("unknown talk level {other:?}")),
        }
    }
}

impl fmt::Display for TalkLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A talk with its speakers, topics and scheduled slots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Talk {
    pub id: u32,
    pub title: String,
    pub duration_in_minutes: u32,
    pub language: String,
    pub level: TalkLevel,
    pub persons: Vec<Person>,
    pub topics: Vec<Topic>,
    /// Absent when the talk is embedded in a talk date
    #[serde(skip_serializing_if = "Option::is_none")]
    pub talk_dates: Option<Vec<TalkSlot>>,
}

/// One scheduled occurrence of a talk, as listed on the talk itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TalkSlot {
    pub id: u32,
    pub begin_date: DateTime<Utc>,
    pub event: Event,
}

/// Request body for creating or replacing a talk.
///
/// Scheduling is managed through talk dates. A `talkDates` array is accepted
/// so a fetched talk can be sent back, but its content is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TalkInput {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration_in_minutes: u32,
    #[serde(default)]
    pub language: String,
    pub level: TalkLevel,
    #[serde(default)]
    pub persons: Vec<Reference>,
    #[serde(default)]
    pub topics: Vec<Reference>,
    #[serde(default)]
    pub talk_dates: Option<IgnoredAny>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trip_through_text() {
        for level in [TalkLevel::Beginner, TalkLevel::Advanced, TalkLevel::Expert] {
            assert_eq!(level.as_str().parse::<TalkLevel>(), Ok(level));
        }
        assert!("guru".parse::<TalkLevel>().is_err());
    }

    #[test]
    fn test_input_rejects_unknown_level() {
        let result = serde_json::from_str::<TalkInput>(r#"{"title": "x", "level": "guru"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_input_rejects_unknown_fields() {
        let result = serde_json::from_str::<TalkInput>(
            r#"{"title": "x", "level": "expert", "speakers": []}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_input_ignores_talk_dates() {
        let input: TalkInput = serde_json::from_str(
            r#"{"title": "x", "level": "expert",
                "talkDates": [{"id": 1, "beginDate": "2019-05-18T10:00:00Z", "event": {"id": 1}}]}"#,
        )
        .unwrap();
        assert_eq!(input.title, "x");
        assert!(input.talk_dates.is_some());
    }
}
