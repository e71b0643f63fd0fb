//! Location model.

use serde::{Deserialize, Serialize};

/// A venue where events and talks take place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: u32,
    pub name: String,
}

/// Request body for creating or replacing a location.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationInput {
    /// Ignored; identity comes from the path or the database
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: String,
}
