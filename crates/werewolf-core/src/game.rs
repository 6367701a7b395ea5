//! The match aggregate.
//!
//! A `Match` owns every piece of state for one game: the roster, the open
//! vote round, and the phase controller. Callers serialise access to it
//! (one lock or one task); nothing in here is shared.

use crate::config::{ConfigError, MatchConfig};
use crate::events::{Delivery, InboundEvent};
use crate::phase::{GamePhase, Outcome, PhaseController};
use crate::player::{Address, PlayerRegistry, RegistryError};
use crate::roles::RoleError;
use crate::router::MessageRouter;
use crate::vote::VoteTally;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Errors that stop a match
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Role assignment failed: {0}")]
    Roles(#[from] RoleError),

    /// Programmer error; continuing could corrupt the outcome
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

/// A single game from first connection to the end
#[derive(Debug)]
pub struct Match {
    registry: PlayerRegistry,
    tally: VoteTally,
    router: MessageRouter,
    controller: PhaseController,
}

impl Match {
    /// Create a match in `Connecting`. Fails if the config cannot produce a
    /// playable game.
    pub fn new(config: MatchConfig, now: Instant) -> Result<Self, MatchError> {
        Self::with_rng(config, now, StdRng::from_entropy())
    }

    /// Same as `new` but deals roles from a seeded rng
    pub fn with_seed(config: MatchConfig, now: Instant, seed: u64) -> Result<Self, MatchError> {
        Self::with_rng(config, now, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: MatchConfig, now: Instant, rng: StdRng) -> Result<Self, MatchError> {
        Ok(Self {
            registry: PlayerRegistry::new(),
            tally: VoteTally::new(),
            router: MessageRouter::new(),
            controller: PhaseController::new(config, now, rng)?,
        })
    }

    pub fn phase(&self) -> GamePhase {
        self.controller.phase()
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn tally(&self) -> &VoteTally {
        &self.tally
    }

    pub fn config(&self) -> &MatchConfig {
        self.controller.config()
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.controller.outcome()
    }

    /// Phases entered so far, oldest first
    pub fn phase_history(&self) -> &[GamePhase] {
        self.controller.history()
    }

    pub fn is_finished(&self) -> bool {
        self.controller.is_finished()
    }

    /// When the background loop should next call `tick`
    pub fn next_deadline(&self) -> Option<Instant> {
        self.controller.deadline()
    }

    pub fn alive_names(&self) -> BTreeSet<String> {
        self.registry.list_alive_names()
    }

    /// Apply one inbound event from `from`
    pub fn handle(&mut self, from: Address, event: InboundEvent) -> Vec<Delivery> {
        match event {
            InboundEvent::Connect { name } => self.connect(from, &name),
            InboundEvent::Disconnect => self.disconnect(from),
            InboundEvent::ChatOrVote { text } => self.message(from, &text),
        }
    }

    /// Register a player. The "connected" broadcast is built only after the
    /// roster entry exists, so it also reaches the new player.
    pub fn connect(&mut self, from: Address, name: &str) -> Vec<Delivery> {
        let name = match self.registry.register(from, name) {
            Ok(player) => player.name.clone(),
            Err(err) => {
                warn!(address = %from, name = %name, error = %err, "connect refused");
                return vec![Delivery::notice(from, err.to_string())];
            }
        };

        info!(address = %from, name = %name, "player connected");
        let text = format!("{} connected", name);
        vec![Delivery::announce(self.registry.addresses(), text)]
    }

    /// Remove a player from the roster and every role view
    pub fn disconnect(&mut self, from: Address) -> Vec<Delivery> {
        match self.registry.unregister(from) {
            Ok(player) => {
                info!(address = %from, name = %player.name, phase = %self.phase(), "player disconnected");
                if self.phase() == GamePhase::Connecting {
                    let text = format!("{} disconnected", player.name);
                    vec![Delivery::announce(self.registry.addresses(), text)]
                } else {
                    Vec::new()
                }
            }
            Err(RegistryError::UnknownAddress) => {
                warn!(address = %from, "unknown client disconnected");
                Vec::new()
            }
            Err(err) => {
                warn!(address = %from, error = %err, "disconnect failed");
                Vec::new()
            }
        }
    }

    /// Chat or vote
    pub fn message(&mut self, from: Address, text: &str) -> Vec<Delivery> {
        let phase = self.phase();
        self.router
            .route(from, phase, text, &self.registry, &mut self.tally)
            .into_deliveries(from)
    }

    /// Advance the phase machine to `now`.
    ///
    /// On error the match is moved to `End` and the error returned; the
    /// caller should tell the players and stop.
    pub fn tick(&mut self, now: Instant) -> Result<Vec<Delivery>, MatchError> {
        let result = self
            .controller
            .advance(now, &mut self.registry, &mut self.tally);
        if result.is_err() {
            self.tally.clear();
            self.controller.abort();
        }
        result
    }

    /// Notice for every connected player that the match was stopped
    pub fn abort_notice(&self, err: &MatchError) -> Delivery {
        Delivery::announce(
            self.registry.addresses(),
            format!("The match was stopped: {}", err),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SERVER_NAME;
    use uuid::Uuid;

    fn small_config() -> MatchConfig {
        MatchConfig {
            quorum: 3,
            werewolves: 1,
            witches: 0,
            connect_secs: 5,
            discuss_secs: 5,
            vote_secs: 5,
            start_when_quorum_reached: true,
        }
    }

    #[test]
    fn test_invalid_config_never_starts() {
        let config = MatchConfig {
            quorum: 0,
            ..MatchConfig::default()
        };
        assert_eq!(
            Match::new(config, Instant::now()).unwrap_err(),
            MatchError::Config(ConfigError::ZeroQuorum)
        );
    }

    #[test]
    fn test_oversized_timer_rejected_before_start() {
        let config = MatchConfig {
            connect_secs: u64::MAX,
            ..MatchConfig::default()
        };
        assert_eq!(
            Match::new(config, Instant::now()).unwrap_err(),
            MatchError::Config(ConfigError::DurationTooLong {
                field: "connect_secs",
                secs: u64::MAX,
            })
        );
    }

    #[test]
    fn test_connect_broadcast_reaches_new_player() {
        let mut game = Match::with_seed(small_config(), Instant::now(), 1).unwrap();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        game.connect(first, "ann");
        let out = game.connect(second, "ben");

        assert_eq!(out.len(), 1);
        assert!(out[0].reaches(first));
        assert!(out[0].reaches(second));
        assert_eq!(out[0].line().text, "ben connected");
        assert_eq!(out[0].line().from, SERVER_NAME);
    }

    #[test]
    fn test_duplicate_connect_is_private_notice() {
        let mut game = Match::with_seed(small_config(), Instant::now(), 1).unwrap();
        let addr = Uuid::new_v4();
        game.connect(addr, "ann");

        let out = game.connect(Uuid::new_v4(), "ann");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].line().text, "Display name 'ann' is already taken");
        assert_eq!(game.registry().len(), 1);
    }

    #[test]
    fn test_player_cannot_speak_as_server() {
        let mut game = Match::with_seed(small_config(), Instant::now(), 1).unwrap();
        let ann = Uuid::new_v4();
        let impostor = Uuid::new_v4();
        game.connect(ann, "ann");

        let out = game.connect(impostor, SERVER_NAME);
        assert_eq!(
            out,
            vec![Delivery::notice(impostor, "Display name 'server' is reserved")]
        );
        let out = game.message(impostor, "Game has already started.");
        assert!(out.iter().all(|d| !d.reaches(ann)));
    }

    #[test]
    fn test_connect_after_start_refused() {
        let start = Instant::now();
        let mut game = Match::with_seed(small_config(), start, 1).unwrap();
        for name in ["a", "b", "c"] {
            game.connect(Uuid::new_v4(), name);
        }
        game.tick(start).unwrap();
        assert_ne!(game.phase(), GamePhase::Connecting);

        let late = Uuid::new_v4();
        let out = game.connect(late, "d");
        assert_eq!(out, vec![Delivery::notice(late, "Game has already started.")]);
    }

    #[test]
    fn test_disconnect_unknown_is_ignored() {
        let mut game = Match::with_seed(small_config(), Instant::now(), 1).unwrap();
        assert!(game.disconnect(Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_disconnect_during_connecting_announced() {
        let mut game = Match::with_seed(small_config(), Instant::now(), 1).unwrap();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        game.connect(a, "ann");
        game.connect(b, "ben");

        let out = game.disconnect(a);
        assert_eq!(out, vec![Delivery::announce(vec![b], "ann disconnected")]);
        assert_eq!(game.alive_names().len(), 1);
    }
}
