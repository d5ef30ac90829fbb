// The draft room: pick ledger operations over storage, with live broadcast.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::config::DraftConfiguration;
use super::error::{ConfigurationError, DraftError, Missing};
use super::pick::{PickMap, PickMapEntry, SlotKey, TeamRef};
use super::schedule::{self, RoundKind, Schedule};
use crate::broadcast::{DraftEvent, DraftEventKind, Publisher, TeamSummary, DRAFT_TOPIC};
use crate::db::Database;
use crate::roster::{Player, PlayerSummary, Team};
use crate::settings::Settings;

/// A schedule round with team names resolved, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRound {
    pub round: u32,
    pub kind: RoundKind,
    pub picks: Vec<NamedCell>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedCell {
    pub pick: u32,
    pub team_id: i64,
    pub team_name: String,
}

/// Runs the draft for one division.
///
/// Every operation reads the configuration and ledger fresh from storage;
/// nothing is cached between calls.
#[derive(Clone)]
pub struct DraftRoom {
    db: Arc<Database>,
    settings: Settings,
    publisher: Arc<dyn Publisher>,
}

impl DraftRoom {
    pub fn new(db: Arc<Database>, publisher: Arc<dyn Publisher>) -> Self {
        let settings = Settings::new(db.clone());
        DraftRoom {
            db,
            settings,
            publisher,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// The saved configuration. Fails with [`ConfigurationError::Missing`]
    /// if none has been saved.
    pub fn configuration(&self) -> Result<DraftConfiguration, DraftError> {
        self.db
            .draft_configuration()?
            .ok_or_else(|| ConfigurationError::Missing.into())
    }

    /// Replace the configuration and return the schedule it produces.
    ///
    /// Rejected when an order id is not a team, or when an existing pick
    /// would fall outside the new schedule.
    pub fn configure(&self, config: DraftConfiguration) -> Result<Schedule, DraftError> {
        let schedule = schedule::generate(&config)?;

        for &team_id in &config.order {
            if self.db.team(team_id)?.is_none() {
                return Err(ConfigurationError::UnknownTeam(team_id).into());
            }
        }

        let orphaned: Vec<SlotKey> = self
            .db
            .picks()?
            .iter()
            .map(|p| p.slot())
            .filter(|slot| !schedule.covers(*slot))
            .collect();
        if let Some(&first) = orphaned.first() {
            return Err(ConfigurationError::OrphanedPicks {
                count: orphaned.len(),
                first,
            }
            .into());
        }

        self.db.save_draft_configuration(&config)?;
        if schedule.is_empty() {
            warn!("Draft configured with no rounds; every pick will be rejected");
        }
        info!(
            "Draft configured: {} rounds x {} picks, final round {} picks ({} slots)",
            config.rounds_draftable,
            config.picks_per_round,
            config.final_round_order.len(),
            schedule.len()
        );
        Ok(schedule)
    }

    /// Remove the configuration. Only allowed while the ledger is empty.
    pub fn delete_configuration(&self) -> Result<(), DraftError> {
        let picks = self.db.pick_count()?;
        if picks > 0 {
            return Err(ConfigurationError::PicksExist(picks).into());
        }
        if self.db.delete_draft_configuration()? {
            info!("Draft configuration deleted");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read views
    // ------------------------------------------------------------------

    pub fn schedule(&self) -> Result<Schedule, DraftError> {
        Ok(schedule::generate(&self.configuration()?)?)
    }

    /// The schedule with team names filled in.
    pub fn schedule_grid(&self) -> Result<Vec<NamedRound>, DraftError> {
        let schedule = self.schedule()?;
        let names: HashMap<i64, String> = self
            .db
            .teams()?
            .into_iter()
            .map(|t| (t.id, t.name))
            .collect();

        Ok(schedule
            .rounds()
            .iter()
            .map(|round| NamedRound {
                round: round.round,
                kind: round.kind,
                picks: round
                    .teams
                    .iter()
                    .enumerate()
                    .map(|(idx, &team_id)| NamedCell {
                        pick: idx as u32 + 1,
                        team_id,
                        team_name: match names.get(&team_id) {
                            Some(name) => name.clone(),
                            None => {
                                warn!(
                                    "Round {} pick {} is scheduled for team {team_id}, which no longer exists",
                                    round.round,
                                    idx + 1
                                );
                                format!("(missing team {team_id})")
                            }
                        },
                    })
                    .collect(),
            })
            .collect())
    }

    /// Filled slots keyed by round then pick.
    pub fn pick_map(&self) -> Result<PickMap, DraftError> {
        let players: HashMap<i64, Player> = self
            .db
            .players()?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut map = PickMap::new();
        for pick in self.db.picks()? {
            let Some(player) = pick.player_id.and_then(|id| players.get(&id)) else {
                continue;
            };
            map.entry(pick.round).or_default().insert(
                pick.pick,
                PickMapEntry {
                    player_id: player.id,
                    player_name: player.full_name(),
                    team_id: pick.team_id,
                    reconciled: pick.reconciled,
                },
            );
        }
        Ok(map)
    }

    pub fn resolve_team(&self, team: &TeamRef) -> Result<Team, DraftError> {
        let found = match team {
            TeamRef::Id(id) => self.db.team(*id)?,
            TeamRef::Name(name) => self.db.team_by_name(name)?,
        };
        found.ok_or_else(|| DraftError::NotFound(Missing::Team(team.to_string())))
    }

    /// Draftable players not seated in any pick, ordered by last then first
    /// name. `excluding` is always included so an edit form can keep showing
    /// the player currently in the slot being edited.
    pub fn available_players(&self, excluding: Option<i64>) -> Result<Vec<Player>, DraftError> {
        let seated: HashSet<i64> = self
            .db
            .picks()?
            .iter()
            .filter_map(|p| p.player_id)
            .collect();

        let mut players: Vec<Player> = self
            .db
            .draftable_players()?
            .into_iter()
            .filter(|p| !seated.contains(&p.id) || Some(p.id) == excluding)
            .collect();

        if let Some(id) = excluding {
            if !players.iter().any(|p| p.id == id) {
                if let Some(player) = self.db.player(id)? {
                    players.push(player);
                }
            }
        }

        players.sort_by(|a, b| {
            (&a.last_name, &a.first_name, a.id).cmp(&(&b.last_name, &b.first_name, b.id))
        });
        Ok(players)
    }

    // ------------------------------------------------------------------
    // Ledger mutations
    // ------------------------------------------------------------------

    /// Seat `player_id` at `slot` for `team`, overwriting whoever was there.
    pub fn make_pick(
        &self,
        slot: SlotKey,
        player_id: i64,
        team: &TeamRef,
    ) -> Result<DraftEvent, DraftError> {
        let schedule = self.schedule()?;
        let scheduled_team = schedule
            .team_at(slot)
            .ok_or(DraftError::NotFound(Missing::Slot(slot)))?;

        let player = self
            .db
            .player(player_id)?
            .ok_or(DraftError::NotFound(Missing::Player(player_id)))?;
        let team = self.resolve_team(team)?;

        if !player.draftable {
            return Err(DraftError::PlayerNotDraftable(player_id));
        }

        if let Some(seated) = self.db.pick_for_player(player_id)? {
            if seated.slot() != slot {
                return Err(DraftError::PlayerAlreadyDrafted {
                    player_id,
                    slot: seated.slot(),
                });
            }
        }

        if let Some(existing) = self.db.pick_at(slot)? {
            if existing.reconciled {
                return Err(DraftError::PickReconciled(slot));
            }
        }

        if team.id != scheduled_team {
            warn!(
                "Pick at {slot} recorded for {} but the schedule has team {scheduled_team}",
                team.name
            );
        }

        self.db.upsert_pick(slot, player_id, team.id)?;
        info!("Pick made at {slot}: {} to {}", player.full_name(), team.name);

        let event = DraftEvent {
            kind: DraftEventKind::PickMade,
            round: slot.round,
            pick: slot.pick,
            player: Some(PlayerSummary::from(&player)),
            team: TeamSummary {
                id: team.id,
                name: team.name,
            },
            at: Utc::now(),
        };
        self.publisher.publish(DRAFT_TOPIC, event.clone());
        Ok(event)
    }

    /// Clear `slot` if it belongs to `team`. Anything else is a no-op, but
    /// a `pick-undone` event is published either way.
    pub fn undo_pick(&self, slot: SlotKey, team: &TeamRef) -> Result<DraftEvent, DraftError> {
        let team = self.resolve_team(team)?;

        let mut removed = None;
        match self.db.pick_at(slot)? {
            Some(existing) if existing.reconciled => {
                return Err(DraftError::PickReconciled(slot));
            }
            Some(existing) if existing.team_id == Some(team.id) => {
                self.db.delete_pick(slot)?;
                if let Some(player_id) = existing.player_id {
                    removed = self.db.player(player_id)?;
                }
                info!(
                    "Pick undone at {slot} for {}: {}",
                    team.name,
                    removed.as_ref().map_or("(empty)".into(), Player::full_name)
                );
            }
            Some(_) => debug!("Undo at {slot} ignored: slot belongs to another team"),
            None => debug!("Undo at {slot} ignored: slot is empty"),
        }

        let event = DraftEvent {
            kind: DraftEventKind::PickUndone,
            round: slot.round,
            pick: slot.pick,
            player: removed.as_ref().map(PlayerSummary::from),
            team: TeamSummary {
                id: team.id,
                name: team.name,
            },
            at: Utc::now(),
        };
        self.publisher.publish(DRAFT_TOPIC, event.clone());
        Ok(event)
    }
}
