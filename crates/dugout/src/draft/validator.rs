// Draft completeness report and the named checks run against it.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::config::DraftConfiguration;
use super::engine::DraftRoom;
use super::error::DraftError;
use super::pick::Pick;
use super::schedule::required_final_round_size;
use crate::roster::Player;

/// Advisory counts computed before reconciliation. Never blocks anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftValidation {
    pub total_slots: usize,
    pub filled_slots: usize,
    pub unfilled_slots: usize,
    /// Players with a team who were never drafted.
    pub pre_assigned_outside_draft: usize,
    pub already_reconciled: usize,
    pub draftable_players: usize,
    pub required_final_round_size: usize,
    pub warnings: Vec<ValidationWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub code: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Named checks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftCheck {
    DraftComplete,
    NoPlayersPreAssigned,
    SlotsMatchDraftablePlayers,
    NotYetReconciled,
}

struct CheckEntry {
    check: DraftCheck,
    code: &'static str,
    passes: fn(&DraftValidation) -> bool,
    message: fn(&DraftValidation) -> String,
}

// Indexed by `DraftCheck as usize`; keep rows in variant order.
static CHECKS: [CheckEntry; 4] = [
    CheckEntry {
        check: DraftCheck::DraftComplete,
        code: "draft_complete",
        passes: |v| v.unfilled_slots == 0,
        message: |v| format!("{} of {} slots are unfilled", v.unfilled_slots, v.total_slots),
    },
    CheckEntry {
        check: DraftCheck::NoPlayersPreAssigned,
        code: "no_players_pre_assigned",
        passes: |v| v.pre_assigned_outside_draft == 0,
        message: |v| {
            format!(
                "{} player(s) already have a team but were not drafted",
                v.pre_assigned_outside_draft
            )
        },
    },
    CheckEntry {
        check: DraftCheck::SlotsMatchDraftablePlayers,
        code: "slots_match_draftable_players",
        passes: |v| v.total_slots == v.draftable_players,
        message: |v| {
            format!(
                "{} slots for {} draftable players (final round should have {} picks)",
                v.total_slots, v.draftable_players, v.required_final_round_size
            )
        },
    },
    CheckEntry {
        check: DraftCheck::NotYetReconciled,
        code: "not_yet_reconciled",
        passes: |v| v.already_reconciled == 0,
        message: |v| {
            format!(
                "{} pick(s) have already been reconciled to team rosters",
                v.already_reconciled
            )
        },
    },
];

impl DraftCheck {
    pub const ALL: [DraftCheck; 4] = [
        DraftCheck::DraftComplete,
        DraftCheck::NoPlayersPreAssigned,
        DraftCheck::SlotsMatchDraftablePlayers,
        DraftCheck::NotYetReconciled,
    ];

    fn entry(self) -> &'static CheckEntry {
        &CHECKS[self as usize]
    }

    pub fn code(self) -> &'static str {
        self.entry().code
    }

    pub fn from_code(code: &str) -> Option<DraftCheck> {
        CHECKS.iter().find(|e| e.code == code).map(|e| e.check)
    }

    pub fn passes(self, validation: &DraftValidation) -> bool {
        (self.entry().passes)(validation)
    }

    pub fn message(self, validation: &DraftValidation) -> String {
        (self.entry().message)(validation)
    }
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Compute the report for `config` over the given ledger and roster, then
/// attach a warning for every failing check in `checks`.
pub fn validate(
    config: &DraftConfiguration,
    picks: &[Pick],
    players: &[Player],
    checks: &[DraftCheck],
) -> DraftValidation {
    let drafted: HashSet<i64> = picks.iter().filter_map(|p| p.player_id).collect();

    let total_slots = config.total_slots();
    let filled_slots = picks.iter().filter(|p| p.player_id.is_some()).count();
    let draftable_players = players.iter().filter(|p| p.draftable).count();

    let mut validation = DraftValidation {
        total_slots,
        filled_slots,
        unfilled_slots: total_slots.saturating_sub(filled_slots),
        pre_assigned_outside_draft: players
            .iter()
            .filter(|p| p.team_id.is_some() && !drafted.contains(&p.id))
            .count(),
        already_reconciled: picks.iter().filter(|p| p.reconciled).count(),
        draftable_players,
        required_final_round_size: required_final_round_size(draftable_players, config),
        warnings: Vec::new(),
    };

    validation.warnings = checks
        .iter()
        .filter(|check| !check.passes(&validation))
        .map(|check| ValidationWarning {
            code: check.code().to_string(),
            message: check.message(&validation),
        })
        .collect();

    validation
}

impl DraftRoom {
    /// Run every check against the current ledger.
    pub fn validate_draft(&self) -> Result<DraftValidation, DraftError> {
        self.validate_draft_with(&DraftCheck::ALL)
    }

    pub fn validate_draft_with(&self, checks: &[DraftCheck]) -> Result<DraftValidation, DraftError> {
        let config = self.configuration()?;
        let picks = self.db().picks()?;
        let players = self.db().players()?;
        Ok(validate(&config, &picks, &players, checks))
    }
}
