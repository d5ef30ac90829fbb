// Snake-draft schedule generation.
//
// Odd rounds run the configured order left to right, even rounds run it in
// reverse. An optional final round uses its own order verbatim and is never
// reversed. The schedule is derived on every read and never persisted.

use serde::{Deserialize, Serialize};

use super::config::DraftConfiguration;
use super::error::ConfigurationError;
use super::pick::SlotKey;

/// Direction a round takes through the team order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundKind {
    Forward,
    Reversed,
    Final,
}

/// One round of the board: `teams[p - 1]` owns pick `p`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRound {
    pub round: u32,
    pub kind: RoundKind,
    pub teams: Vec<i64>,
}

/// A single `(round, pick) -> team` assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleCell {
    pub round: u32,
    pub pick: u32,
    pub team_id: i64,
}

impl ScheduleCell {
    pub fn slot(&self) -> SlotKey {
        SlotKey::new(self.round, self.pick)
    }
}

/// The full pick schedule derived from a [`DraftConfiguration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    rounds: Vec<ScheduleRound>,
}

impl Schedule {
    pub fn rounds(&self) -> &[ScheduleRound] {
        &self.rounds
    }

    /// Team scheduled to make the given pick, if the slot exists.
    pub fn team_at(&self, slot: SlotKey) -> Option<i64> {
        let round = self
            .rounds
            .get((slot.round as usize).checked_sub(1)?)?;
        round.teams.get((slot.pick as usize).checked_sub(1)?).copied()
    }

    pub fn covers(&self, slot: SlotKey) -> bool {
        self.team_at(slot).is_some()
    }

    /// Every cell in board order (round, then pick).
    pub fn cells(&self) -> impl Iterator<Item = ScheduleCell> + '_ {
        self.rounds.iter().flat_map(|round| {
            round
                .teams
                .iter()
                .enumerate()
                .map(move |(idx, &team_id)| ScheduleCell {
                    round: round.round,
                    pick: idx as u32 + 1,
                    team_id,
                })
        })
    }

    /// Number of scheduled cells.
    pub fn len(&self) -> usize {
        self.rounds.iter().map(|r| r.teams.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the schedule for `config`.
///
/// Fails if the configuration breaks an invariant (most importantly
/// `picks_per_round != order.len()`); the order is never truncated or padded.
pub fn generate(config: &DraftConfiguration) -> Result<Schedule, ConfigurationError> {
    config.validate()?;

    let reversed: Vec<i64> = config.order.iter().rev().copied().collect();
    let mut rounds = Vec::with_capacity(config.rounds_draftable as usize + 1);

    for round in 1..=config.rounds_draftable {
        let (kind, teams) = if round % 2 == 1 {
            (RoundKind::Forward, config.order.clone())
        } else {
            (RoundKind::Reversed, reversed.clone())
        };
        rounds.push(ScheduleRound { round, kind, teams });
    }

    if config.has_final_round() {
        rounds.push(ScheduleRound {
            round: config.rounds_draftable + 1,
            kind: RoundKind::Final,
            teams: config.final_round_order.clone(),
        });
    }

    Ok(Schedule { rounds })
}

/// How many final-round picks are needed so every draftable player is
/// drafted: the players left over after the regular rounds fill.
pub fn required_final_round_size(draftable_players: usize, config: &DraftConfiguration) -> usize {
    draftable_players.saturating_sub(config.regular_slots())
}
