// SQLite persistence layer for the roster, draft configuration, pick ledger,
// and key-value settings.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::draft::config::{parse_team_order, DraftConfiguration};
use crate::draft::pick::{Pick, SlotKey};
use crate::roster::{NewPlayer, Player, Team};

const PLAYER_COLUMNS: &str =
    "id, first_name, last_name, birthday, school, history, conflict, draftable, team_id";

const PICK_COLUMNS: &str = "round, pick, player_id, team_id, reconciled";

/// SQLite-backed persistence for teams, players, the draft configuration,
/// draft picks, and settings.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS teams (
                id   INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS players (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                first_name TEXT NOT NULL,
                last_name  TEXT NOT NULL,
                birthday   TEXT,
                school     TEXT,
                history    TEXT,
                conflict   TEXT,
                draftable  INTEGER NOT NULL DEFAULT 1,
                team_id    INTEGER REFERENCES teams(id) ON DELETE SET NULL
            );

            CREATE TABLE IF NOT EXISTS draft_config (
                id                  INTEGER PRIMARY KEY CHECK (id = 1),
                rounds_draftable    INTEGER NOT NULL,
                rounds_nondraftable INTEGER NOT NULL DEFAULT 0,
                picks_per_round     INTEGER NOT NULL,
                team_order          TEXT NOT NULL,
                final_round_order   TEXT,
                updated_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE IF NOT EXISTS draft_picks (
                round      INTEGER NOT NULL,
                pick       INTEGER NOT NULL,
                player_id  INTEGER REFERENCES players(id) ON DELETE SET NULL,
                team_id    INTEGER REFERENCES teams(id) ON DELETE SET NULL,
                reconciled INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (round, pick)
            );

            CREATE TABLE IF NOT EXISTS settings (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        // A player may be seated in at most one slot.
        conn.execute_batch(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_draft_picks_player
                ON draft_picks(player_id) WHERE player_id IS NOT NULL;",
        )
        .context("failed to create draft_picks player index")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    /// Insert a team by name, or return the existing row's id.
    pub fn upsert_team(&self, name: &str) -> Result<i64> {
        let conn = self.conn();
        let id: i64 = conn
            .query_row(
                "INSERT INTO teams (name) VALUES (?1)
                 ON CONFLICT(name) DO UPDATE SET name = excluded.name
                 RETURNING id",
                params![name],
                |row| row.get(0),
            )
            .context("failed to upsert team")?;
        Ok(id)
    }

    pub fn team(&self, id: i64) -> Result<Option<Team>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name FROM teams WHERE id = ?1",
            params![id],
            team_from_row,
        )
        .optional()
        .context("failed to load team")
    }

    pub fn team_by_name(&self, name: &str) -> Result<Option<Team>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name FROM teams WHERE name = ?1",
            params![name],
            team_from_row,
        )
        .optional()
        .context("failed to load team by name")
    }

    /// All teams, ordered by name.
    pub fn teams(&self) -> Result<Vec<Team>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name FROM teams ORDER BY name")
            .context("failed to prepare teams query")?;
        let teams = stmt
            .query_map([], team_from_row)
            .context("failed to query teams")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team rows")?;
        Ok(teams)
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    pub fn insert_player(&self, player: &NewPlayer) -> Result<i64> {
        let conn = self.conn();
        let id: i64 = conn
            .query_row(
                "INSERT INTO players
                    (first_name, last_name, birthday, school, history, conflict, draftable)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 RETURNING id",
                params![
                    player.first_name,
                    player.last_name,
                    player.birthday,
                    player.school,
                    player.history,
                    player.conflict,
                    player.draftable,
                ],
                |row| row.get(0),
            )
            .context("failed to insert player")?;
        Ok(id)
    }

    pub fn player(&self, id: i64) -> Result<Option<Player>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PLAYER_COLUMNS} FROM players WHERE id = ?1"),
            params![id],
            player_from_row,
        )
        .optional()
        .context("failed to load player")
    }

    /// All players, ordered by last name then first name.
    pub fn players(&self) -> Result<Vec<Player>> {
        self.query_players(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players ORDER BY last_name, first_name, id"
        ))
    }

    /// Players eligible for the draft pool, ordered like [`Self::players`].
    pub fn draftable_players(&self) -> Result<Vec<Player>> {
        self.query_players(&format!(
            "SELECT {PLAYER_COLUMNS} FROM players WHERE draftable = 1
             ORDER BY last_name, first_name, id"
        ))
    }

    fn query_players(&self, sql: &str) -> Result<Vec<Player>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql).context("failed to prepare players query")?;
        let players = stmt
            .query_map([], player_from_row)
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;
        Ok(players)
    }

    /// Set (or clear) a player's roster team. Returns `false` if the player
    /// does not exist.
    pub fn set_player_team(&self, player_id: i64, team_id: Option<i64>) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE players SET team_id = ?1 WHERE id = ?2",
                params![team_id, player_id],
            )
            .context("failed to set player team")?;
        Ok(changed > 0)
    }

    pub fn set_player_draftable(&self, player_id: i64, draftable: bool) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "UPDATE players SET draftable = ?1 WHERE id = ?2",
                params![draftable, player_id],
            )
            .context("failed to set player draftable flag")?;
        Ok(changed > 0)
    }

    // ------------------------------------------------------------------
    // Draft configuration (single row)
    // ------------------------------------------------------------------

    /// Store the draft configuration, replacing any previous one. Orders are
    /// stored as JSON arrays.
    pub fn save_draft_configuration(&self, config: &DraftConfiguration) -> Result<()> {
        let conn = self.conn();
        let order_json =
            serde_json::to_string(&config.order).context("failed to serialize team order")?;
        let final_json = serde_json::to_string(&config.final_round_order)
            .context("failed to serialize final round order")?;
        conn.execute(
            "INSERT INTO draft_config
                (id, rounds_draftable, rounds_nondraftable, picks_per_round, team_order, final_round_order)
             VALUES (1, ?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                rounds_draftable    = excluded.rounds_draftable,
                rounds_nondraftable = excluded.rounds_nondraftable,
                picks_per_round     = excluded.picks_per_round,
                team_order          = excluded.team_order,
                final_round_order   = excluded.final_round_order,
                updated_at          = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![
                config.rounds_draftable,
                config.rounds_nondraftable,
                config.picks_per_round,
                order_json,
                final_json,
            ],
        )
        .context("failed to save draft configuration")?;
        Ok(())
    }

    /// Load the draft configuration, if one has been saved.
    ///
    /// Orders written as comma-separated lists are read as well as JSON.
    pub fn draft_configuration(&self) -> Result<Option<DraftConfiguration>> {
        let row = {
            let conn = self.conn();
            conn.query_row(
                "SELECT rounds_draftable, rounds_nondraftable, picks_per_round,
                        team_order, final_round_order
                 FROM draft_config WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, u32>(1)?,
                        row.get::<_, u32>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()
            .context("failed to load draft configuration")?
        };

        let Some((rounds_draftable, rounds_nondraftable, picks_per_round, order, final_order)) =
            row
        else {
            return Ok(None);
        };

        let order = parse_team_order(&order).context("stored team order is invalid")?;
        let final_round_order = match final_order {
            Some(text) => {
                parse_team_order(&text).context("stored final round order is invalid")?
            }
            None => Vec::new(),
        };

        Ok(Some(DraftConfiguration {
            rounds_draftable,
            rounds_nondraftable,
            picks_per_round,
            order,
            final_round_order,
        }))
    }

    /// Remove the draft configuration. Returns `false` if none was stored.
    pub fn delete_draft_configuration(&self) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute("DELETE FROM draft_config", [])
            .context("failed to delete draft configuration")?;
        Ok(changed > 0)
    }

    // ------------------------------------------------------------------
    // Pick ledger
    // ------------------------------------------------------------------

    pub fn pick_at(&self, slot: SlotKey) -> Result<Option<Pick>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PICK_COLUMNS} FROM draft_picks WHERE round = ?1 AND pick = ?2"),
            params![slot.round, slot.pick],
            pick_from_row,
        )
        .optional()
        .context("failed to load pick")
    }

    /// The pick a player is seated in, if any.
    pub fn pick_for_player(&self, player_id: i64) -> Result<Option<Pick>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {PICK_COLUMNS} FROM draft_picks WHERE player_id = ?1"),
            params![player_id],
            pick_from_row,
        )
        .optional()
        .context("failed to load pick for player")
    }

    /// Every ledger row in board order.
    pub fn picks(&self) -> Result<Vec<Pick>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {PICK_COLUMNS} FROM draft_picks ORDER BY round, pick"
            ))
            .context("failed to prepare picks query")?;
        let picks = stmt
            .query_map([], pick_from_row)
            .context("failed to query draft picks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map draft pick rows")?;
        Ok(picks)
    }

    pub fn pick_count(&self) -> Result<usize> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM draft_picks", [], |row| row.get(0))
            .context("failed to count draft picks")?;
        Ok(count as usize)
    }

    /// Seat `player_id` for `team_id` at `slot`, creating the row or
    /// overwriting the previous occupant. The reconciled flag is untouched.
    pub fn upsert_pick(&self, slot: SlotKey, player_id: i64, team_id: i64) -> Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO draft_picks (round, pick, player_id, team_id)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(round, pick) DO UPDATE SET
                player_id  = excluded.player_id,
                team_id    = excluded.team_id,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            params![slot.round, slot.pick, player_id, team_id],
        )
        .context("failed to record draft pick")?;
        Ok(())
    }

    /// Delete the row at `slot`. Returns `false` if there was none.
    pub fn delete_pick(&self, slot: SlotKey) -> Result<bool> {
        let conn = self.conn();
        let changed = conn
            .execute(
                "DELETE FROM draft_picks WHERE round = ?1 AND pick = ?2",
                params![slot.round, slot.pick],
            )
            .context("failed to delete draft pick")?;
        Ok(changed > 0)
    }

    /// Commit a pick to the roster: mark it reconciled and set the player's
    /// team in one transaction.
    ///
    /// Returns `Ok(false)` without touching the player if the pick was
    /// already reconciled. Any failure rolls both changes back.
    pub fn reconcile_pick(&self, slot: SlotKey, player_id: i64, team_id: i64) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        let claimed = tx
            .execute(
                "UPDATE draft_picks
                 SET reconciled = 1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE round = ?1 AND pick = ?2 AND reconciled = 0",
                params![slot.round, slot.pick],
            )
            .context("failed to mark pick reconciled")?;
        if claimed == 0 {
            return Ok(false);
        }

        let assigned = tx
            .execute(
                "UPDATE players SET team_id = ?1 WHERE id = ?2",
                params![team_id, player_id],
            )
            .context("failed to assign player to team")?;
        if assigned == 0 {
            anyhow::bail!("player {player_id} no longer exists");
        }

        tx.commit().context("failed to commit reconciliation")?;
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Settings (key-value)
    // ------------------------------------------------------------------

    /// Persist a JSON value under `key`, overwriting any previous value.
    pub fn save_setting(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str =
            serde_json::to_string(value).context("failed to serialize setting value")?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save setting")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`. Returns `None` if the key
    /// does not exist.
    pub fn load_setting(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let json_str: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .context("failed to query setting")?;

        match json_str {
            Some(json_str) => {
                let value = serde_json::from_str(&json_str)
                    .context("failed to deserialize setting value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])
            .context("failed to delete setting")?;
        Ok(())
    }
}

fn team_from_row(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

fn player_from_row(row: &Row<'_>) -> rusqlite::Result<Player> {
    Ok(Player {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        birthday: row.get(3)?,
        school: row.get(4)?,
        history: row.get(5)?,
        conflict: row.get(6)?,
        draftable: row.get(7)?,
        team_id: row.get(8)?,
    })
}

fn pick_from_row(row: &Row<'_>) -> rusqlite::Result<Pick> {
    Ok(Pick {
        round: row.get(0)?,
        pick: row.get(1)?,
        player_id: row.get(2)?,
        team_id: row.get(3)?,
        reconciled: row.get(4)?,
    })
}
