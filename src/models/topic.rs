//! Topic model.
//!
//! Topics form a graph through the `topic_child` join table. A topic lists
//! its direct children only; nothing prevents cycles, so callers walking the
//! graph must track visited ids themselves.

use serde::{Deserialize, Serialize};

use super::Reference;

/// A subject area a talk can cover.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Topic {
    pub id: u32,
    pub name: String,
    /// Direct children (one level deep)
    pub children: Vec<TopicRef>,
}

/// A child entry of a topic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopicRef {
    pub id: u32,
    pub name: String,
}

/// Request body for creating or replacing a topic.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicInput {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub children: Vec<Reference>,
}
