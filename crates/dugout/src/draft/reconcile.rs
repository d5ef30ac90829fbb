// Commit the drafted picks to the permanent roster.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::engine::DraftRoom;
use super::pick::SlotKey;

/// A pick (or the final portal close, `slot: None`) that could not be
/// committed. The pick stays unreconciled so a later run retries it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileFailure {
    pub slot: Option<SlotKey>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub newly_assigned: usize,
    pub already_assigned: usize,
    pub errors: Vec<ReconcileFailure>,
    /// Ledger rows missing a player or a team.
    pub incomplete_picks: usize,
}

impl DraftRoom {
    /// Assign every drafted player to the team that picked them, then close
    /// the manager portal.
    ///
    /// Each pick is committed in its own transaction and only once: running
    /// this again assigns nothing new. Failures are collected in the summary
    /// rather than returned.
    pub fn reconcile(&self) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        let picks = match self.db().picks() {
            Ok(picks) => picks,
            Err(e) => {
                error!("Reconcile could not load picks: {e:#}");
                summary.errors.push(ReconcileFailure {
                    slot: None,
                    message: format!("{e:#}"),
                });
                Vec::new()
            }
        };

        for pick in &picks {
            let (Some(player_id), Some(team_id)) = (pick.player_id, pick.team_id) else {
                summary.incomplete_picks += 1;
                continue;
            };
            if pick.reconciled {
                summary.already_assigned += 1;
                continue;
            }

            let slot = pick.slot();
            match self.db().reconcile_pick(slot, player_id, team_id) {
                Ok(true) => summary.newly_assigned += 1,
                Ok(false) => summary.already_assigned += 1,
                Err(e) => {
                    warn!("Reconcile failed at {slot}: {e:#}");
                    summary.errors.push(ReconcileFailure {
                        slot: Some(slot),
                        message: format!("{e:#}"),
                    });
                }
            }
        }

        if let Err(e) = self.settings().set_portal_open(false) {
            error!("Reconcile could not close the draft portal: {e:#}");
            summary.errors.push(ReconcileFailure {
                slot: None,
                message: format!("failed to close draft portal: {e:#}"),
            });
        }

        info!(
            "Reconcile: {} newly assigned, {} already assigned, {} incomplete, {} errors",
            summary.newly_assigned,
            summary.already_assigned,
            summary.incomplete_picks,
            summary.errors.len()
        );
        summary
    }
}
