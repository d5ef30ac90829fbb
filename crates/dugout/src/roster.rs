// Roster records (teams and players) and CSV roster import.

use std::io::Read;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::db::Database;

/// A team in the division.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
}

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<String>,
    pub school: Option<String>,
    pub history: Option<String>,
    pub conflict: Option<String>,
    /// Non-draftable players are kept out of the pick pool.
    pub draftable: bool,
    /// Team on the permanent roster record; set by reconciliation.
    pub team_id: Option<i64>,
}

impl Player {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Fields for inserting a player. The roster team is assigned separately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPlayer {
    pub first_name: String,
    pub last_name: String,
    pub birthday: Option<String>,
    pub school: Option<String>,
    pub history: Option<String>,
    pub conflict: Option<String>,
    pub draftable: bool,
}

/// Player details carried in broadcast events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub id: i64,
    pub name: String,
    pub birthday: Option<String>,
    pub school: Option<String>,
    pub history: Option<String>,
    pub conflict: Option<String>,
    pub draftable: bool,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        PlayerSummary {
            id: player.id,
            name: player.full_name(),
            birthday: player.birthday.clone(),
            school: player.school.clone(),
            history: player.history.clone(),
            conflict: player.conflict.clone(),
            draftable: player.draftable,
        }
    }
}

// ---------------------------------------------------------------------------
// CSV import
// ---------------------------------------------------------------------------

/// One row of a roster CSV. Only the name columns are required.
#[derive(Debug, Deserialize)]
struct RosterRow {
    first_name: String,
    last_name: String,
    #[serde(default)]
    birthday: Option<String>,
    #[serde(default)]
    school: Option<String>,
    #[serde(default)]
    history: Option<String>,
    #[serde(default)]
    conflict: Option<String>,
    #[serde(default)]
    draftable: Option<String>,
    /// Team name. A non-empty value pre-assigns the player to that team.
    #[serde(default)]
    team: Option<String>,
}

/// Counts reported by [`import_roster_csv`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub players: usize,
    pub pre_assigned: usize,
    pub skipped: usize,
}

/// Import players from CSV, creating teams named in the `team` column.
///
/// Rows that fail to parse are skipped with a warning. `draftable` accepts
/// `true/false`, `yes/no` and `1/0`; a blank cell means draftable.
pub fn import_roster_csv<R: Read>(db: &Database, reader: R) -> Result<ImportSummary> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut summary = ImportSummary::default();

    for (idx, record) in csv_reader.deserialize::<RosterRow>().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let row = match record {
            Ok(row) => row,
            Err(e) => {
                warn!("Skipping roster line {line}: {e}");
                summary.skipped += 1;
                continue;
            }
        };

        let draftable = match parse_flag(row.draftable.as_deref()) {
            Some(flag) => flag,
            None => {
                warn!(
                    "Skipping roster line {line}: unrecognised draftable value {:?}",
                    row.draftable
                );
                summary.skipped += 1;
                continue;
            }
        };

        let player = NewPlayer {
            first_name: row.first_name,
            last_name: row.last_name,
            birthday: non_empty(row.birthday),
            school: non_empty(row.school),
            history: non_empty(row.history),
            conflict: non_empty(row.conflict),
            draftable,
        };
        let player_id = db
            .insert_player(&player)
            .with_context(|| format!("failed to import roster line {line}"))?;
        summary.players += 1;

        if let Some(team_name) = non_empty(row.team) {
            let team_id = db.upsert_team(&team_name)?;
            db.set_player_team(player_id, Some(team_id))?;
            summary.pre_assigned += 1;
        }
    }

    info!(
        "Roster import: {} players ({} pre-assigned), {} rows skipped",
        summary.players, summary.pre_assigned, summary.skipped
    );
    Ok(summary)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: Option<&str>) -> Option<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") => Some(true),
        Some("true" | "yes" | "y" | "1") => Some(true),
        Some("false" | "no" | "n" | "0") => Some(false),
        Some(_) => None,
    }
}
