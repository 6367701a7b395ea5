//! Background task that advances the match through its phases.
//!
//! The loop sleeps until the match's next deadline, a roster change, or
//! shutdown, whichever comes first. Timed waits happen only here; message
//! handlers never wait on a phase timer.

use crate::server::ServerState;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{error, info};

pub struct GameLoop {
    state: Arc<ServerState>,
    shutdown: watch::Receiver<bool>,
}

impl GameLoop {
    pub fn new(state: Arc<ServerState>, shutdown: watch::Receiver<bool>) -> Self {
        Self { state, shutdown }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        info!("Game loop started");

        loop {
            let Some(deadline) = self.step().await else {
                break;
            };

            tokio::select! {
                _ = time::sleep_until(Instant::from_std(deadline)) => {}
                _ = self.state.wake.notified() => {}
                _ = self.shutdown.changed() => {
                    info!("Game loop shutting down");
                    break;
                }
            }
        }

        info!("Game loop stopped");
    }

    /// Tick the match once. Returns when to tick next, or `None` to stop.
    async fn step(&self) -> Option<std::time::Instant> {
        let mut game = self.state.game.lock().await;

        match game.tick(Instant::now().into_std()) {
            Ok(deliveries) => self.state.deliver(deliveries),
            Err(err) => {
                error!("Match aborted: {}", err);
                let notice = game.abort_notice(&err);
                self.state.deliver(vec![notice]);
                return None;
            }
        }

        if game.is_finished() {
            info!(outcome = ?game.outcome(), "Match finished");
            return None;
        }
        game.next_deadline()
    }
}
