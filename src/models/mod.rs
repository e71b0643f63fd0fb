//! Data models for the conference catalog.
//!
//! Each entity has a read shape (what the API returns, with related rows
//! included) and an input shape (what the API accepts on create/update).
//! Inputs point at related rows through [`Reference`].

mod event;
mod location;
mod organization;
mod person;
mod room;
mod talk;
mod talk_date;
mod topic;

pub use event::*;
pub use location::*;
pub use organization::*;
pub use person::*;
pub use room::*;
pub use talk::*;
pub use talk_date::*;
pub use topic::*;

use serde::{Deserialize, Serialize};

/// Pointer to an existing row, written as `{"id": 3}`.
///
/// Other fields are ignored, so a record fetched from the API can be sent
/// back as a reference unchanged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reference {
    pub id: u32,
}

impl From<u32> for Reference {
    fn from(id: u32) -> Self {
        Self { id }
    }
}

/// Sorted, duplicate-free ids of a reference list.
pub fn reference_ids(references: &[Reference]) -> Vec<u32> {
    let mut ids: Vec<u32> = references.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_ignores_extra_fields() {
        let reference: Reference =
            serde_json::from_str(r#"{"id": 4, "name": "Hall A"}"#).unwrap();
        assert_eq!(reference, Reference { id: 4 });
    }

    #[test]
    fn test_reference_ids_dedup() {
        let refs = [Reference { id: 3 }, Reference { id: 1 }, Reference { id: 3 }];
        assert_eq!(reference_ids(&refs), vec![1, 3]);
    }
}
