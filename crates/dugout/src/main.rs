// Dugout entry point.
//
// Startup sequence:
// 1. Load config
// 2. Initialize tracing (stderr)
// 3. Open database
// 4. Seed the master password from credentials.toml
// 5. Import the roster CSV into an empty database
// 6. Build the broadcast hub and draft room, log the draft math
// 7. Create command channel
// 8. Spawn WebSocket server task
// 9. Spawn command loop task
// 10. Wait for Ctrl+C, then shut down

use std::sync::Arc;

use dugout::app;
use dugout::broadcast::BroadcastHub;
use dugout::config;
use dugout::db;
use dugout::draft::engine::DraftRoom;
use dugout::roster;
use dugout::settings::Settings;
use dugout::ws_server;

use anyhow::Context;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = config::load_config().context("failed to load configuration")?;

    // 2. Initialize tracing
    init_tracing(&config.log_filter)?;
    info!("Dugout starting up");

    // 3. Open database
    let db = Arc::new(db::Database::open(&config.db_path).context("failed to open database")?);
    info!("Database opened at {}", config.db_path);

    // 4. Seed the master password
    let settings = Settings::new(db.clone());
    if let Some(password) = config.credentials.master_password.as_deref() {
        if settings.master_password()?.is_none() {
            settings.set_master_password(Some(password))?;
            info!("Master password set from credentials.toml");
        }
    }
    if settings.master_password()?.is_none() {
        info!("No master password set; the operator endpoint is open");
    }

    // 5. Import roster
    if let Some(path) = &config.roster_csv {
        if db.players()?.is_empty() {
            let file = std::fs::File::open(path)
                .with_context(|| format!("failed to open roster CSV {path}"))?;
            roster::import_roster_csv(&db, file).context("roster import failed")?;
        } else {
            info!("Players already loaded, skipping roster import from {path}");
        }
    }

    // 6. Draft room
    let hub = Arc::new(BroadcastHub::new(config.broadcast_capacity));
    let room = DraftRoom::new(db.clone(), hub.clone());
    app::log_draft_status(&room);

    // 7. Command channel
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 8. Spawn WebSocket server task
    let listener = ws_server::TungsteniteListener::bind(&config.server.host, config.server.port)
        .await
        .with_context(|| {
            format!(
                "failed to bind WebSocket server on {}:{}",
                config.server.host, config.server.port
            )
        })?;
    info!(
        "WebSocket server listening on {} (observers: {}, operator: {})",
        listener.local_addr()?,
        ws_server::OBSERVER_PATH,
        ws_server::OPERATOR_PATH
    );

    let ctx = ws_server::ServerContext {
        publisher: hub,
        commands: cmd_tx,
        settings,
    };
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = ws_server::run(listener, ctx).await {
            error!("WebSocket server error: {}", e);
        }
    });

    // 9. Spawn command loop task
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app::run(cmd_rx, shutdown_rx, room).await {
            error!("Command loop error: {}", e);
        }
    });

    // 10. Wait for Ctrl+C
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("Ctrl+C received, shutting down");

    ws_handle.abort();
    let _ = shutdown_tx.send(());
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    info!("Dugout shut down cleanly");
    Ok(())
}

/// Initialize tracing to stderr. `RUST_LOG` overrides the configured filter.
fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
