//! Organization model.

use serde::{Deserialize, Serialize};

/// A company or group that employs speakers and owns rooms.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub id: u32,
    /// Unique across all organizations
    pub name: String,
}

/// Request body for creating or replacing an organization.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrganizationInput {
    #[serde(default)]
    pub id: Option<u32>,
    #[serde(default)]
    pub name: String,
}
