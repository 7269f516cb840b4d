use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::guest::GuestId;

/// Identity of the pairing between two guests.
///
/// Derived, never allocated: either side can rebuild it from the two ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn between(a: &GuestId, b: &GuestId) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}_{}", first, second))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Transport group name used for room-wide pushes.
    pub fn group(&self) -> String {
        format!("room:{}", self.0)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RoomId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Transport group reaching whichever connection a guest holds.
pub fn guest_group(guest_id: &GuestId) -> String {
    format!("guest:{}", guest_id)
}
