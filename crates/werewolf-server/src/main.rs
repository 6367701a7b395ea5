//! Werewolf multiplayer game server.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use werewolf_core::Match;

mod config;
mod game_loop;
mod protocol;
mod server;

use config::ServerConfig;
use game_loop::GameLoop;
use server::ServerState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::load()?;
    info!(?config, "Starting werewolf server...");

    // A bad config stops here, before anyone can connect
    let game = Match::new(config.game.clone(), tokio::time::Instant::now().into_std())?;
    let state = Arc::new(ServerState::new(game));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let game_loop = GameLoop::new(Arc::clone(&state), shutdown_rx).spawn();

    tokio::select! {
        result = server::run_server(config.listen, Arc::clone(&state)) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
    }

    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(config.shutdown_grace(), game_loop)
        .await
        .is_err()
    {
        warn!("Game loop did not stop within {:?}", config.shutdown_grace());
    }

    Ok(())
}
