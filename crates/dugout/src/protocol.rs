// JSON messages exchanged with the operator over the websocket.
//
// Observers receive `broadcast::DraftEvent` frames and never send anything
// meaningful, so only the operator side is modelled here.

use serde::{Deserialize, Serialize};

use crate::broadcast::DraftEvent;
use crate::draft::config::{parse_team_order, DraftConfiguration};
use crate::draft::engine::NamedRound;
use crate::draft::error::{ConfigurationError, DraftError};
use crate::draft::pick::{PickMap, TeamRef};
use crate::draft::reconcile::ReconcileSummary;
use crate::draft::validator::DraftValidation;
use crate::roster::Player;

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A team order as typed by the operator: a JSON array of ids or a
/// comma-separated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TeamOrderInput {
    List(Vec<i64>),
    Encoded(String),
}

impl TeamOrderInput {
    pub fn into_ids(self) -> Result<Vec<i64>, ConfigurationError> {
        match self {
            TeamOrderInput::List(ids) => Ok(ids),
            TeamOrderInput::Encoded(text) => parse_team_order(&text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum OperatorCommand {
    MakePick {
        round: u32,
        pick: u32,
        player_id: i64,
        team: TeamRef,
    },
    UndoPick {
        round: u32,
        pick: u32,
        team: TeamRef,
    },
    GetSchedule,
    GetPickMap,
    AvailablePlayers {
        #[serde(default)]
        excluding: Option<i64>,
    },
    /// Run the named checks, or all of them when `checks` is omitted.
    ValidateDraft {
        #[serde(default)]
        checks: Option<Vec<String>>,
    },
    Reconcile,
    ConfigureDraft {
        rounds_draftable: u32,
        #[serde(default)]
        rounds_nondraftable: u32,
        picks_per_round: u32,
        order: TeamOrderInput,
        #[serde(default)]
        final_round_order: Option<TeamOrderInput>,
    },
    GetConfiguration,
    GetPortal,
    SetPortal {
        open: bool,
    },
}

impl OperatorCommand {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            OperatorCommand::MakePick { .. } => "make_pick",
            OperatorCommand::UndoPick { .. } => "undo_pick",
            OperatorCommand::GetSchedule => "get_schedule",
            OperatorCommand::GetPickMap => "get_pick_map",
            OperatorCommand::AvailablePlayers { .. } => "available_players",
            OperatorCommand::ValidateDraft { .. } => "validate_draft",
            OperatorCommand::Reconcile => "reconcile",
            OperatorCommand::ConfigureDraft { .. } => "configure_draft",
            OperatorCommand::GetConfiguration => "get_configuration",
            OperatorCommand::GetPortal => "get_portal",
            OperatorCommand::SetPortal { .. } => "set_portal",
        }
    }
}

/// Build a configuration from the `configure_draft` fields.
pub fn configuration_from_input(
    rounds_draftable: u32,
    rounds_nondraftable: u32,
    picks_per_round: u32,
    order: TeamOrderInput,
    final_round_order: Option<TeamOrderInput>,
) -> Result<DraftConfiguration, ConfigurationError> {
    Ok(DraftConfiguration {
        rounds_draftable,
        rounds_nondraftable,
        picks_per_round,
        order: order.into_ids()?,
        final_round_order: match final_round_order {
            Some(input) => input.into_ids()?,
            None => Vec::new(),
        },
    })
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum OperatorReply {
    PickMade { event: DraftEvent },
    PickUndone { event: DraftEvent },
    Schedule { rounds: Vec<NamedRound> },
    PickMap { picks: PickMap },
    AvailablePlayers { players: Vec<Player> },
    Validation { report: DraftValidation },
    Reconciled { summary: ReconcileSummary },
    Configured { total_slots: usize },
    Configuration { configuration: DraftConfiguration },
    Portal { open: bool },
    Error { kind: String, message: String },
}

impl OperatorReply {
    pub fn error(kind: &str, message: impl Into<String>) -> Self {
        OperatorReply::Error {
            kind: kind.to_string(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::error("bad_request", message)
    }
}

impl From<DraftError> for OperatorReply {
    fn from(err: DraftError) -> Self {
        OperatorReply::error(err.kind(), err.to_string())
    }
}
