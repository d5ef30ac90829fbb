// Integration tests: end-to-end draft flows over the public API.
//
// Each test builds an in-memory database, a broadcast hub, and a draft room,
// then drives the draft the way the operator console would.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use dugout::app;
use dugout::broadcast::{BroadcastHub, DraftEventKind, Publisher, DRAFT_TOPIC};
use dugout::db::Database;
use dugout::draft::config::DraftConfiguration;
use dugout::draft::engine::DraftRoom;
use dugout::draft::error::DraftError;
use dugout::draft::pick::{SlotKey, TeamRef};
use dugout::draft::schedule::RoundKind;
use dugout::roster::{import_roster_csv, NewPlayer};
use dugout::ws_server::{self, Listener, ServerContext};

// ===========================================================================
// Helpers
// ===========================================================================

struct League {
    room: DraftRoom,
    hub: Arc<BroadcastHub>,
    teams: Vec<i64>,
    players: Vec<i64>,
}

/// Four teams T1..T4 and `player_count` draftable players.
fn league(player_count: usize) -> League {
    let db = Arc::new(Database::open(":memory:").expect("in-memory db"));

    let teams: Vec<i64> = ["T1", "T2", "T3", "T4"]
        .iter()
        .map(|name| db.upsert_team(name).unwrap())
        .collect();

    let players = (1..=player_count)
        .map(|i| {
            db.insert_player(&NewPlayer {
                first_name: format!("Player{i:02}"),
                last_name: format!("Last{i:02}"),
                draftable: true,
                ..NewPlayer::default()
            })
            .unwrap()
        })
        .collect();

    let hub = Arc::new(BroadcastHub::new(64));
    let room = DraftRoom::new(db, hub.clone());
    League {
        room,
        hub,
        teams,
        players,
    }
}

/// Three draftable rounds of four picks, plus a final round when given.
fn three_round_config(teams: &[i64], final_round_order: Vec<i64>) -> DraftConfiguration {
    DraftConfiguration {
        rounds_draftable: 3,
        rounds_nondraftable: 0,
        picks_per_round: 4,
        order: teams.to_vec(),
        final_round_order,
    }
}

// ===========================================================================
// Test: Schedule for 13 players
// ===========================================================================

#[test]
fn thirteen_players_need_one_final_round_pick() {
    let lg = league(13);
    let t = &lg.teams;

    // Without a final round the draft math reports the shortfall.
    lg.room.configure(three_round_config(t, Vec::new())).unwrap();
    let report = lg.room.validate_draft().unwrap();
    assert_eq!(report.total_slots, 12);
    assert_eq!(report.draftable_players, 13);
    assert_eq!(report.required_final_round_size, 1);
    assert!(report
        .warnings
        .iter()
        .any(|w| w.code == "slots_match_draftable_players"));

    let schedule = lg.room.configure(three_round_config(t, vec![t[0]])).unwrap();
    assert_eq!(schedule.len(), 13);

    // Round 2 snakes back.
    assert_eq!(schedule.team_at(SlotKey::new(2, 1)), Some(t[3]));
    assert_eq!(schedule.team_at(SlotKey::new(2, 2)), Some(t[2]));
    assert_eq!(schedule.team_at(SlotKey::new(2, 3)), Some(t[1]));
    assert_eq!(schedule.team_at(SlotKey::new(2, 4)), Some(t[0]));

    // Round 4 is the final round with a single pick.
    let final_round = &schedule.rounds()[3];
    assert_eq!(final_round.kind, RoundKind::Final);
    assert_eq!(final_round.teams, vec![t[0]]);
    assert_eq!(schedule.team_at(SlotKey::new(4, 1)), Some(t[0]));
    assert_eq!(schedule.team_at(SlotKey::new(4, 2)), None);

    let report = lg.room.validate_draft().unwrap();
    assert!(report
        .warnings
        .iter()
        .all(|w| w.code != "slots_match_draftable_players"));
}

#[test]
fn schedule_grid_names_each_team() {
    let lg = league(12);
    lg.room.configure(three_round_config(&lg.teams, Vec::new())).unwrap();

    let grid = lg.room.schedule_grid().unwrap();
    assert_eq!(grid.len(), 3);
    let names: Vec<&str> = grid[1].picks.iter().map(|c| c.team_name.as_str()).collect();
    assert_eq!(names, vec!["T4", "T3", "T2", "T1"]);
}

// ===========================================================================
// Test: Make and undo
// ===========================================================================

#[test]
fn make_then_undo_leaves_empty_pick_map() {
    let lg = league(12);
    lg.room.configure(three_round_config(&lg.teams, Vec::new())).unwrap();
    let slot = SlotKey::new(1, 1);

    lg.room
        .make_pick(slot, lg.players[0], &TeamRef::Name("T1".into()))
        .unwrap();
    assert_eq!(lg.room.pick_map().unwrap()[&1][&1].player_id, lg.players[0]);

    let event = lg.room.undo_pick(slot, &TeamRef::Id(lg.teams[0])).unwrap();
    assert_eq!(event.kind, DraftEventKind::PickUndone);
    assert_eq!(event.player.map(|p| p.id), Some(lg.players[0]));

    assert!(lg.room.pick_map().unwrap().is_empty());
    assert_eq!(lg.room.available_players(None).unwrap().len(), 12);
}

#[test]
fn repick_overwrites_slot_and_frees_previous_player() {
    let lg = league(12);
    lg.room.configure(three_round_config(&lg.teams, Vec::new())).unwrap();
    let slot = SlotKey::new(1, 2);
    let t2 = TeamRef::Id(lg.teams[1]);

    lg.room.make_pick(slot, lg.players[0], &t2).unwrap();
    lg.room.make_pick(slot, lg.players[1], &t2).unwrap();

    let pick = lg.room.db().pick_at(slot).unwrap().unwrap();
    assert_eq!(pick.player_id, Some(lg.players[1]));
    assert_eq!(lg.room.db().pick_count().unwrap(), 1);

    let available: Vec<i64> = lg
        .room
        .available_players(None)
        .unwrap()
        .iter()
        .map(|p| p.id)
        .collect();
    assert!(available.contains(&lg.players[0]));
    assert!(!available.contains(&lg.players[1]));
}

#[test]
fn player_cannot_occupy_two_slots() {
    let lg = league(12);
    lg.room.configure(three_round_config(&lg.teams, Vec::new())).unwrap();

    lg.room
        .make_pick(SlotKey::new(1, 1), lg.players[0], &TeamRef::Id(lg.teams[0]))
        .unwrap();
    let err = lg
        .room
        .make_pick(SlotKey::new(1, 2), lg.players[0], &TeamRef::Id(lg.teams[1]))
        .unwrap_err();
    assert!(matches!(err, DraftError::PlayerAlreadyDrafted { .. }));
}

#[test]
fn pick_outside_schedule_is_not_found() {
    let lg = league(12);
    lg.room.configure(three_round_config(&lg.teams, Vec::new())).unwrap();

    let err = lg
        .room
        .make_pick(SlotKey::new(4, 1), lg.players[0], &TeamRef::Id(lg.teams[0]))
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

// ===========================================================================
// Test: Validation
// ===========================================================================

#[test]
fn ten_of_twelve_slots_with_one_preassigned_player() {
    let lg = league(12);
    let schedule = lg.room.configure(three_round_config(&lg.teams, Vec::new())).unwrap();

    for (cell, player_id) in schedule.cells().take(10).zip(&lg.players) {
        lg.room
            .make_pick(cell.slot(), *player_id, &TeamRef::Id(cell.team_id))
            .unwrap();
    }
    lg.room
        .db()
        .set_player_team(lg.players[11], Some(lg.teams[1]))
        .unwrap();

    let report = lg.room.validate_draft().unwrap();
    assert_eq!(report.filled_slots, 10);
    assert_eq!(report.unfilled_slots, 2);
    assert_eq!(report.pre_assigned_outside_draft, 1);
    assert_eq!(report.already_reconciled, 0);

    let codes: Vec<&str> = report.warnings.iter().map(|w| w.code.as_str()).collect();
    assert_eq!(codes, vec!["draft_complete", "no_players_pre_assigned"]);
}

// ===========================================================================
// Test: Reconcile
// ===========================================================================

#[test]
fn reconcile_is_idempotent() {
    let lg = league(12);
    lg.room.configure(three_round_config(&lg.teams, Vec::new())).unwrap();
    lg.room.settings().set_portal_open(true).unwrap();

    lg.room
        .make_pick(SlotKey::new(1, 1), lg.players[0], &TeamRef::Id(lg.teams[0]))
        .unwrap();
    lg.room
        .make_pick(SlotKey::new(1, 2), lg.players[1], &TeamRef::Id(lg.teams[1]))
        .unwrap();

    let first = lg.room.reconcile();
    assert_eq!(first.newly_assigned, 2);
    assert!(first.errors.is_empty());
    assert!(!lg.room.settings().is_portal_open().unwrap());

    let roster = lg.room.db().players().unwrap();
    let second = lg.room.reconcile();
    assert_eq!(second.newly_assigned, 0);
    assert_eq!(second.already_assigned, 2);
    assert_eq!(lg.room.db().players().unwrap(), roster);
}

#[test]
fn reconciled_slot_rejects_undo_and_repick() {
    let lg = league(12);
    lg.room.configure(three_round_config(&lg.teams, Vec::new())).unwrap();
    let slot = SlotKey::new(1, 1);
    let t1 = TeamRef::Id(lg.teams[0]);

    lg.room.make_pick(slot, lg.players[0], &t1).unwrap();
    lg.room.reconcile();

    let err = lg.room.undo_pick(slot, &t1).unwrap_err();
    assert!(matches!(err, DraftError::PickReconciled(s) if s == slot));

    let err = lg.room.make_pick(slot, lg.players[1], &t1).unwrap_err();
    assert!(matches!(err, DraftError::PickReconciled(_)));

    let pick = lg.room.db().pick_at(slot).unwrap().unwrap();
    assert_eq!(pick.player_id, Some(lg.players[0]));
    assert!(pick.reconciled);

    // Configuration can't be dropped out from under a committed ledger.
    assert!(lg.room.delete_configuration().is_err());
}

#[test]
fn csv_import_draft_and_reconcile() {
    let db = Arc::new(Database::open(":memory:").unwrap());
    let csv = "\
first_name,last_name,birthday,school,history,conflict,draftable,team
Ada,Lovelace,2015-04-02,Hillside,,,yes,
Grace,Hopper,,,,,yes,
Mary,Jackson,,,,,yes,
Katherine,Johnson,,,,,yes,
Dorothy,Vaughan,,,,,no,
Annie,Easley,,,,,no,Comets
";
    let summary = import_roster_csv(&db, csv.as_bytes()).unwrap();
    assert_eq!(summary.players, 6);
    assert_eq!(summary.pre_assigned, 1);

    let comets = db.team_by_name("Comets").unwrap().unwrap().id;
    let rockets = db.upsert_team("Rockets").unwrap();

    let hub = Arc::new(BroadcastHub::new(16));
    let room = DraftRoom::new(db.clone(), hub);
    room.configure(DraftConfiguration {
        rounds_draftable: 2,
        rounds_nondraftable: 0,
        picks_per_round: 2,
        order: vec![rockets, comets],
        final_round_order: Vec::new(),
    })
    .unwrap();

    // Annie is placed on the Comets ahead of the draft; Dorothy sits out.
    let pool = room.available_players(None).unwrap();
    let names: Vec<String> = pool.iter().map(|p| p.full_name()).collect();
    assert_eq!(
        names,
        vec!["Grace Hopper", "Mary Jackson", "Katherine Johnson", "Ada Lovelace"]
    );

    let schedule = room.schedule().unwrap();
    for (cell, player) in schedule.cells().zip(&pool) {
        room.make_pick(cell.slot(), player.id, &TeamRef::Id(cell.team_id))
            .unwrap();
    }

    let report = room.validate_draft().unwrap();
    assert_eq!(report.unfilled_slots, 0);
    assert_eq!(report.pre_assigned_outside_draft, 1);

    let summary = room.reconcile();
    assert_eq!(summary.newly_assigned, 4);
    assert!(summary.errors.is_empty());

    // Snake: Rockets take picks 1 and 4, Comets picks 2 and 3.
    let team_of = |first: &str| {
        db.players()
            .unwrap()
            .into_iter()
            .find(|p| p.first_name == first)
            .and_then(|p| p.team_id)
    };
    assert_eq!(team_of("Grace"), Some(rockets));
    assert_eq!(team_of("Mary"), Some(comets));
    assert_eq!(team_of("Katherine"), Some(comets));
    assert_eq!(team_of("Ada"), Some(rockets));
    assert_eq!(team_of("Dorothy"), None);
}

// ===========================================================================
// Test: Broadcast
// ===========================================================================

#[test]
fn observers_see_events_in_order_and_late_joiners_see_none() {
    let lg = league(12);
    let schedule = lg.room.configure(three_round_config(&lg.teams, Vec::new())).unwrap();
    let mut early = lg.hub.subscribe(DRAFT_TOPIC);

    let cells: Vec<_> = schedule.cells().take(5).collect();
    for (cell, player_id) in cells.iter().zip(&lg.players) {
        lg.room
            .make_pick(cell.slot(), *player_id, &TeamRef::Id(cell.team_id))
            .unwrap();
    }
    let mut late = lg.hub.subscribe(DRAFT_TOPIC);

    for (cell, player_id) in cells.iter().zip(&lg.players) {
        let event = early.try_next().expect("event for every pick");
        assert_eq!(event.kind, DraftEventKind::PickMade);
        assert_eq!((event.round, event.pick), (cell.round, cell.pick));
        assert_eq!(event.team.id, cell.team_id);
        assert_eq!(event.player.unwrap().id, *player_id);
    }
    assert!(early.try_next().is_none());
    assert!(late.try_next().is_none());

    // Late joiners catch up from the ledger instead.
    let map = lg.room.pick_map().unwrap();
    assert_eq!(map.values().map(|round| round.len()).sum::<usize>(), 5);
}

#[test]
fn pick_without_observers_still_persists() {
    let lg = league(12);
    lg.room.configure(three_round_config(&lg.teams, Vec::new())).unwrap();
    assert_eq!(lg.hub.subscriber_count(DRAFT_TOPIC), 0);

    lg.room
        .make_pick(SlotKey::new(1, 1), lg.players[0], &TeamRef::Id(lg.teams[0]))
        .unwrap();
    assert_eq!(lg.room.db().pick_count().unwrap(), 1);
}

// ===========================================================================
// Test: Websocket session
// ===========================================================================

struct DuplexListener {
    incoming: mpsc::Receiver<DuplexStream>,
}

#[async_trait]
impl Listener for DuplexListener {
    type Io = DuplexStream;

    async fn accept(&mut self) -> std::io::Result<(DuplexStream, String)> {
        match self.incoming.recv().await {
            Some(io) => Ok((io, "duplex".into())),
            None => Err(std::io::ErrorKind::BrokenPipe.into()),
        }
    }
}

async fn connect(
    connector: &mpsc::Sender<DuplexStream>,
    path: &str,
) -> WebSocketStream<DuplexStream> {
    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    connector.send(server_io).await.unwrap();
    let url = format!("ws://localhost{path}");
    let (ws, _) = tokio_tungstenite::client_async(url.as_str(), client_io)
        .await
        .unwrap();
    ws
}

async fn next_json(ws: &mut WebSocketStream<DuplexStream>) -> serde_json::Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            _ => continue,
        }
    }
}

#[tokio::test]
async fn operator_drives_draft_while_observer_watches() {
    let lg = league(4);
    lg.room.settings().set_master_password(Some("pw")).unwrap();

    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (_shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(app::run(cmd_rx, shutdown_rx, lg.room.clone()));

    let (connector, incoming) = mpsc::channel(4);
    let ctx = ServerContext {
        publisher: lg.hub.clone(),
        commands: cmd_tx,
        settings: lg.room.settings().clone(),
    };
    tokio::spawn(ws_server::run(DuplexListener { incoming }, ctx));

    let mut observer = connect(&connector, ws_server::OBSERVER_PATH).await;
    let mut operator = connect(&connector, "/ws/operator/?password=pw").await;

    let configure = serde_json::json!({
        "command": "configure_draft",
        "rounds_draftable": 1,
        "picks_per_round": 4,
        "order": lg.teams.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(",")
    });
    operator
        .send(Message::text(configure.to_string()))
        .await
        .unwrap();
    let reply = next_json(&mut operator).await;
    assert_eq!(reply["reply"], "configured");
    assert_eq!(reply["total_slots"], 4);

    let pick = serde_json::json!({
        "command": "make_pick",
        "round": 1,
        "pick": 3,
        "player_id": lg.players[2],
        "team": "T3"
    });
    operator.send(Message::text(pick.to_string())).await.unwrap();
    let reply = next_json(&mut operator).await;
    assert_eq!(reply["reply"], "pick_made");

    let event = next_json(&mut observer).await;
    assert_eq!(event["type"], "pick-made");
    assert_eq!(event["round"], 1);
    assert_eq!(event["pick"], 3);
    assert_eq!(event["team"]["name"], "T3");
    assert_eq!(event["player"]["id"], lg.players[2]);

    let undo = serde_json::json!({
        "command": "undo_pick",
        "round": 1,
        "pick": 3,
        "team": lg.teams[2]
    });
    operator.send(Message::text(undo.to_string())).await.unwrap();
    assert_eq!(next_json(&mut operator).await["reply"], "pick_undone");
    assert_eq!(next_json(&mut observer).await["type"], "pick-undone");

    operator
        .send(Message::text(r#"{"command":"get_pick_map"}"#))
        .await
        .unwrap();
    let reply = next_json(&mut operator).await;
    assert_eq!(reply["picks"], serde_json::json!({}));
}
