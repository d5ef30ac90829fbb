// Draft configuration: rounds, picks per round, and team order.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::error::ConfigurationError;

/// Upper bound on `rounds_draftable`.
pub const MAX_ROUNDS: u32 = 100;

/// Upper bound on the number of cells on the board.
pub const MAX_SLOTS: usize = 10_000;

/// The single active draft configuration for the division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftConfiguration {
    /// Number of full snake rounds.
    pub rounds_draftable: u32,
    /// Rounds filled outside the draft. Stored but not scheduled.
    #[serde(default)]
    pub rounds_nondraftable: u32,
    pub picks_per_round: u32,
    /// Team ids in first-round pick order.
    pub order: Vec<i64>,
    /// Team ids for the trailing partial round. Empty means no final round.
    #[serde(default)]
    pub final_round_order: Vec<i64>,
}

impl DraftConfiguration {
    /// Check the invariants the schedule depends on.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.rounds_draftable > MAX_ROUNDS {
            return Err(ConfigurationError::TooManyRounds {
                rounds: self.rounds_draftable,
                max: MAX_ROUNDS,
            });
        }

        if self.order.len() != self.picks_per_round as usize {
            return Err(ConfigurationError::OrderLengthMismatch {
                picks_per_round: self.picks_per_round,
                order_len: self.order.len(),
            });
        }

        let mut seen = HashSet::with_capacity(self.order.len());
        for &team_id in &self.order {
            if !seen.insert(team_id) {
                return Err(ConfigurationError::DuplicateTeam(team_id));
            }
        }

        if self.final_round_order.len() > self.picks_per_round as usize {
            return Err(ConfigurationError::FinalRoundTooLong {
                picks_per_round: self.picks_per_round,
                final_len: self.final_round_order.len(),
            });
        }

        let slots = self.total_slots();
        if slots > MAX_SLOTS {
            return Err(ConfigurationError::TooManySlots {
                slots,
                max: MAX_SLOTS,
            });
        }

        if let Some(&stray) = self
            .final_round_order
            .iter()
            .find(|team_id| !seen.contains(*team_id))
        {
            return Err(ConfigurationError::FinalRoundTeamNotInOrder(stray));
        }

        Ok(())
    }

    /// Slots in the full snake rounds.
    pub fn regular_slots(&self) -> usize {
        self.rounds_draftable as usize * self.picks_per_round as usize
    }

    /// Every slot on the board, including the final round.
    pub fn total_slots(&self) -> usize {
        self.regular_slots() + self.final_round_order.len()
    }

    pub fn has_final_round(&self) -> bool {
        !self.final_round_order.is_empty()
    }
}

/// Parse a stored or operator-supplied team order.
///
/// Accepts a JSON array (`[3, 1, 2]`) or a comma-separated list (`"3,1,2"`).
/// Blank entries in the comma form are skipped, so `"3,1,"` is `[3, 1]` and
/// an empty string is an empty order.
pub fn parse_team_order(input: &str) -> Result<Vec<i64>, ConfigurationError> {
    let trimmed = input.trim();
    let invalid = |reason: String| ConfigurationError::InvalidOrder {
        input: input.to_string(),
        reason,
    };

    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<i64>>(trimmed).map_err(|e| invalid(e.to_string()));
    }

    trimmed
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|e| invalid(format!("{part:?}: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_team_config() -> DraftConfiguration {
        DraftConfiguration {
            rounds_draftable: 3,
            rounds_nondraftable: 1,
            picks_per_round: 4,
            order: vec![1, 2, 3, 4],
            final_round_order: vec![1],
        }
    }

    #[test]
    fn valid_config_passes() {
        assert_eq!(four_team_config().validate(), Ok(()));
    }

    #[test]
    fn rejects_order_length_mismatch() {
        let config = DraftConfiguration {
            picks_per_round: 5,
            ..four_team_config()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::OrderLengthMismatch {
                picks_per_round: 5,
                order_len: 4
            })
        );
    }

    #[test]
    fn rejects_duplicate_team() {
        let config = DraftConfiguration {
            order: vec![1, 2, 2, 4],
            ..four_team_config()
        };
        assert_eq!(config.validate(), Err(ConfigurationError::DuplicateTeam(2)));
    }

    #[test]
    fn rejects_final_round_longer_than_a_round() {
        let config = DraftConfiguration {
            final_round_order: vec![1, 2, 3, 4, 1],
            ..four_team_config()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::FinalRoundTooLong { final_len: 5, .. })
        ));
    }

    #[test]
    fn rejects_final_round_team_outside_order() {
        let config = DraftConfiguration {
            final_round_order: vec![9],
            ..four_team_config()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::FinalRoundTeamNotInOrder(9))
        );
    }

    #[test]
    fn rejects_unbounded_round_count() {
        let config = DraftConfiguration {
            rounds_draftable: u32::MAX,
            ..four_team_config()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::TooManyRounds {
                rounds: u32::MAX,
                max: MAX_ROUNDS
            })
        );

        let at_cap = DraftConfiguration {
            rounds_draftable: MAX_ROUNDS,
            ..four_team_config()
        };
        assert_eq!(at_cap.validate(), Ok(()));
    }

    #[test]
    fn rejects_board_larger_than_slot_cap() {
        let teams: Vec<i64> = (1..=101).collect();
        let config = DraftConfiguration {
            rounds_draftable: MAX_ROUNDS,
            rounds_nondraftable: 0,
            picks_per_round: 101,
            order: teams,
            final_round_order: Vec::new(),
        };
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::TooManySlots {
                slots: 10_100,
                max: MAX_SLOTS
            })
        );
    }

    #[test]
    fn slot_counts() {
        let config = four_team_config();
        assert_eq!(config.regular_slots(), 12);
        assert_eq!(config.total_slots(), 13);
        assert!(config.has_final_round());
    }

    #[test]
    fn parse_json_array_order() {
        assert_eq!(parse_team_order("[4, 2, 9]"), Ok(vec![4, 2, 9]));
        assert_eq!(parse_team_order("[]"), Ok(vec![]));
    }

    #[test]
    fn parse_comma_separated_order() {
        assert_eq!(parse_team_order("4,2,9"), Ok(vec![4, 2, 9]));
        assert_eq!(parse_team_order(" 4 , 2 ,"), Ok(vec![4, 2]));
        assert_eq!(parse_team_order(""), Ok(vec![]));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            parse_team_order("4,two,9"),
            Err(ConfigurationError::InvalidOrder { .. })
        ));
        assert!(matches!(
            parse_team_order("[1, \"x\"]"),
            Err(ConfigurationError::InvalidOrder { .. })
        ));
    }
}
