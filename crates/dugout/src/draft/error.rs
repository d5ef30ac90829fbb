// Error types for the draft engine.

use std::fmt;

use thiserror::Error;

use super::pick::SlotKey;

/// The draft configuration is missing or internally inconsistent.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no draft configuration has been saved")]
    Missing,

    #[error("picks_per_round is {picks_per_round} but the team order lists {order_len} teams")]
    OrderLengthMismatch { picks_per_round: u32, order_len: usize },

    #[error("final round lists {final_len} teams but a round only has {picks_per_round} picks")]
    FinalRoundTooLong { picks_per_round: u32, final_len: usize },

    #[error("final round team {0} does not appear in the draft order")]
    FinalRoundTeamNotInOrder(i64),

    #[error("{rounds} draftable rounds requested but at most {max} are allowed")]
    TooManyRounds { rounds: u32, max: u32 },

    #[error("the board would have {slots} slots but at most {max} are allowed")]
    TooManySlots { slots: usize, max: usize },

    #[error("team {0} appears more than once in the draft order")]
    DuplicateTeam(i64),

    #[error("team {0} in the draft order does not exist")]
    UnknownTeam(i64),

    #[error("could not parse team order {input:?}: {reason}")]
    InvalidOrder { input: String, reason: String },

    #[error("{count} existing pick(s) fall outside the new schedule, starting at {first}")]
    OrphanedPicks { count: usize, first: SlotKey },

    #[error("cannot delete the draft configuration while {0} pick(s) exist")]
    PicksExist(usize),
}

/// What a lookup failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Player(i64),
    Team(String),
    Slot(SlotKey),
}

impl fmt::Display for Missing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Missing::Player(id) => write!(f, "player {id}"),
            Missing::Team(team) => write!(f, "team {team}"),
            Missing::Slot(slot) => write!(f, "scheduled slot {slot}"),
        }
    }
}

/// Errors returned by pick, schedule and configuration operations.
#[derive(Debug, Error)]
pub enum DraftError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("{0} not found")]
    NotFound(Missing),

    #[error("player {player_id} is already drafted at {slot}")]
    PlayerAlreadyDrafted { player_id: i64, slot: SlotKey },

    #[error("player {0} is not draftable")]
    PlayerNotDraftable(i64),

    #[error("the pick at {0} has already been reconciled")]
    PickReconciled(SlotKey),

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl DraftError {
    /// Stable machine-readable name, used in operator error replies.
    pub fn kind(&self) -> &'static str {
        match self {
            DraftError::Configuration(_) => "configuration",
            DraftError::NotFound(_) => "not_found",
            DraftError::PlayerAlreadyDrafted { .. } => "player_already_drafted",
            DraftError::PlayerNotDraftable(_) => "player_not_draftable",
            DraftError::PickReconciled(_) => "pick_reconciled",
            DraftError::Storage(_) => "storage",
        }
    }
}
