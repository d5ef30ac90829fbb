// Pick records and slot addressing.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Slot addressing
// ---------------------------------------------------------------------------

/// A `(round, pick)` position on the draft board. Both are 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SlotKey {
    pub round: u32,
    pub pick: u32,
}

impl SlotKey {
    pub fn new(round: u32, pick: u32) -> Self {
        SlotKey { round, pick }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "round {}, pick {}", self.round, self.pick)
    }
}

/// How the operator names a team: by row id or by display name.
///
/// Deserializes from a JSON number (`3`) or a JSON string (`"Bluebirds"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TeamRef {
    Id(i64),
    Name(String),
}

impl fmt::Display for TeamRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamRef::Id(id) => write!(f, "{id}"),
            TeamRef::Name(name) => write!(f, "{name:?}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger rows
// ---------------------------------------------------------------------------

/// One row of the pick ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick {
    pub round: u32,
    pub pick: u32,
    /// Seated player; `None` means the slot is empty.
    pub player_id: Option<i64>,
    /// Team that owns the slot.
    pub team_id: Option<i64>,
    /// Set once the pick has been committed to the player's roster record.
    pub reconciled: bool,
}

impl Pick {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.round, self.pick)
    }
}

/// A filled cell of the board as shown to the operator UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickMapEntry {
    pub player_id: i64,
    pub player_name: String,
    pub team_id: Option<i64>,
    pub reconciled: bool,
}

/// `round -> pick -> entry`, containing only slots with a seated player.
pub type PickMap = BTreeMap<u32, BTreeMap<u32, PickMapEntry>>;
