//! Person model.

use serde::{Deserialize, Serialize};

use super::{Organization, Reference};

/// A speaker, affiliated with an organization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id: u32,
    pub name: String,
    pub organization: Organization,
}

/// Request body for creating or replacing a person.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PersonInput {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub organization: Option<Reference>,
}
