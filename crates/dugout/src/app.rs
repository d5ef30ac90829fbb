// Command loop: runs operator commands against the draft room one at a time.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::draft::engine::DraftRoom;
use crate::draft::error::{ConfigurationError, DraftError};
use crate::draft::pick::SlotKey;
use crate::draft::validator::DraftCheck;
use crate::protocol::{configuration_from_input, OperatorCommand, OperatorReply};

/// A command from an operator connection and the channel its reply goes
/// back on.
#[derive(Debug)]
pub struct CommandEnvelope {
    pub command: OperatorCommand,
    pub reply: oneshot::Sender<OperatorReply>,
}

/// Main application event loop.
///
/// Commands from every operator connection funnel through `cmd_rx`, so
/// ledger mutations never interleave. Exits when `shutdown` fires (or its
/// sender is dropped) or when every command sender is gone.
pub async fn run(
    mut cmd_rx: mpsc::Receiver<CommandEnvelope>,
    mut shutdown: oneshot::Receiver<()>,
    room: DraftRoom,
) -> anyhow::Result<()> {
    info!("Command loop started");

    loop {
        tokio::select! {
            envelope = cmd_rx.recv() => {
                match envelope {
                    Some(CommandEnvelope { command, reply }) => {
                        let name = command.name();
                        let response = handle_command(&room, command);
                        if reply.send(response).is_err() {
                            debug!("Operator went away before the {name} reply");
                        }
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    Ok(())
}

/// Execute one operator command and build its reply.
pub fn handle_command(room: &DraftRoom, command: OperatorCommand) -> OperatorReply {
    let name = command.name();
    debug!("Handling {name}");

    let result: Result<OperatorReply, DraftError> = match command {
        OperatorCommand::MakePick {
            round,
            pick,
            player_id,
            team,
        } => room
            .make_pick(SlotKey::new(round, pick), player_id, &team)
            .map(|event| OperatorReply::PickMade { event }),

        OperatorCommand::UndoPick { round, pick, team } => room
            .undo_pick(SlotKey::new(round, pick), &team)
            .map(|event| OperatorReply::PickUndone { event }),

        OperatorCommand::GetSchedule => room
            .schedule_grid()
            .map(|rounds| OperatorReply::Schedule { rounds }),

        OperatorCommand::GetPickMap => room.pick_map().map(|picks| OperatorReply::PickMap { picks }),

        OperatorCommand::AvailablePlayers { excluding } => room
            .available_players(excluding)
            .map(|players| OperatorReply::AvailablePlayers { players }),

        OperatorCommand::ValidateDraft { checks } => {
            let checks = match checks {
                None => DraftCheck::ALL.to_vec(),
                Some(codes) => {
                    let mut checks = Vec::with_capacity(codes.len());
                    for code in codes {
                        match DraftCheck::from_code(&code) {
                            Some(check) => checks.push(check),
                            None => {
                                return OperatorReply::bad_request(format!(
                                    "unknown check {code:?}"
                                ))
                            }
                        }
                    }
                    checks
                }
            };
            room.validate_draft_with(&checks)
                .map(|report| OperatorReply::Validation { report })
        }

        OperatorCommand::Reconcile => Ok(OperatorReply::Reconciled {
            summary: room.reconcile(),
        }),

        OperatorCommand::ConfigureDraft {
            rounds_draftable,
            rounds_nondraftable,
            picks_per_round,
            order,
            final_round_order,
        } => configuration_from_input(
            rounds_draftable,
            rounds_nondraftable,
            picks_per_round,
            order,
            final_round_order,
        )
        .map_err(DraftError::from)
        .and_then(|config| room.configure(config))
        .map(|schedule| OperatorReply::Configured {
            total_slots: schedule.len(),
        }),

        OperatorCommand::GetConfiguration => room
            .configuration()
            .map(|configuration| OperatorReply::Configuration { configuration }),

        OperatorCommand::GetPortal => room
            .settings()
            .is_portal_open()
            .map(|open| OperatorReply::Portal { open })
            .map_err(DraftError::from),

        OperatorCommand::SetPortal { open } => {
            let result = room.settings().set_portal_open(open);
            if result.is_ok() {
                info!("Draft portal {}", if open { "opened" } else { "closed" });
            }
            result
                .map(|()| OperatorReply::Portal { open })
                .map_err(DraftError::from)
        }
    };

    result.unwrap_or_else(|e| {
        warn!("{name} failed: {e}");
        OperatorReply::from(e)
    })
}

/// Log the draft math: slots against draftable players, and any failing
/// checks.
pub fn log_draft_status(room: &DraftRoom) {
    let config = match room.configuration() {
        Ok(config) => config,
        Err(DraftError::Configuration(ConfigurationError::Missing)) => {
            info!("No draft configuration saved yet");
            return;
        }
        Err(e) => {
            warn!("Could not load draft configuration: {e}");
            return;
        }
    };

    match room.validate_draft() {
        Ok(report) => {
            info!(
                "Draft math: {} draftable players; {} rounds x {} picks = {} slots; \
                 final round {} picks (needs {}); {} of {} slots filled",
                report.draftable_players,
                config.rounds_draftable,
                config.picks_per_round,
                config.regular_slots(),
                config.final_round_order.len(),
                report.required_final_round_size,
                report.filled_slots,
                report.total_slots
            );
            for warning in &report.warnings {
                warn!("Draft check {}: {}", warning.code, warning.message);
            }
        }
        Err(e) => warn!("Could not validate draft: {e}"),
    }
}
