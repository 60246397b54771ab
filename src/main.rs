//! Tile Skirmish Server
//!
//! Authoritative team combat server. Configuration comes from `SKIRMISH_*`
//! environment variables (a `.env` file is loaded first); `RUST_LOG`
//! controls log filtering.

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tile_skirmish::{GameServer, ServerConfig, GAME_TICK_MS, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let config = ServerConfig::from_env();
    config.level.validate().context("invalid level parameters")?;

    info!("Tile Skirmish Server v{}", VERSION);
    info!(
        tick_ms = config.tick_ms,
        default_tick_ms = GAME_TICK_MS,
        map = ?config.map,
        map_file = ?config.map_file,
        bots = config.bots_enabled,
        "configuration loaded"
    );

    let server = GameServer::new(config);
    let shutdown = server.shutdown_handle();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("ctrl-c received, shutting down"),
            Err(e) => warn!(error = %e, "failed to listen for ctrl-c, shutting down"),
        }
        let _ = shutdown.send(());
    });

    server.run().await.context("server failed")?;

    info!("server stopped");
    Ok(())
}
