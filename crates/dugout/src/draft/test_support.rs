// Shared fixtures for draft engine unit tests.

use std::sync::Arc;

use super::config::DraftConfiguration;
use super::engine::DraftRoom;
use crate::broadcast::BroadcastHub;
use crate::db::Database;
use crate::roster::NewPlayer;

pub(crate) struct Fixture {
    pub room: DraftRoom,
    pub hub: Arc<BroadcastHub>,
    /// Team ids for "Team 1".."Team N", in creation order.
    pub teams: Vec<i64>,
    /// Player ids, already in last-name order.
    pub players: Vec<i64>,
}

/// In-memory draft room with `team_count` teams and `player_count`
/// draftable players and no configuration.
pub(crate) fn fixture(team_count: usize, player_count: usize) -> Fixture {
    let db = Arc::new(Database::open(":memory:").expect("in-memory database should open"));

    let teams = (1..=team_count)
        .map(|i| db.upsert_team(&format!("Team {i}")).unwrap())
        .collect();

    let players = (1..=player_count)
        .map(|i| {
            db.insert_player(&NewPlayer {
                first_name: format!("Kid{i:02}"),
                last_name: format!("Family{i:02}"),
                draftable: true,
                ..NewPlayer::default()
            })
            .unwrap()
        })
        .collect();

    let hub = Arc::new(BroadcastHub::new(64));
    let room = DraftRoom::new(db, hub.clone());
    Fixture {
        room,
        hub,
        teams,
        players,
    }
}

/// Plain snake configuration over `teams` with no final round.
pub(crate) fn snake_config(teams: &[i64], rounds: u32) -> DraftConfiguration {
    DraftConfiguration {
        rounds_draftable: rounds,
        rounds_nondraftable: 0,
        picks_per_round: teams.len() as u32,
        order: teams.to_vec(),
        final_round_order: Vec::new(),
    }
}
