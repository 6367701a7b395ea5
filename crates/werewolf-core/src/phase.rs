//! Phase state machine.
//!
//! `PhaseController` owns the current phase and its timer. It never sleeps:
//! the caller passes the current time to [`PhaseController::advance`], which
//! performs whatever transition is due and returns the messages to send.
//! [`PhaseController::deadline`] tells the caller when to come back.
//!
//! Cycle:
//!
//! ```text
//! Connecting -> NightStart -> WerewolfDiscuss -> WerewolfVote
//!            -> TownDiscuss -> TownVote -> WerewolfDiscuss ...
//! ```
//!
//! Any step that finds a faction wiped out moves to `End`, which is terminal.

use crate::config::{ConfigError, MatchConfig};
use crate::events::Delivery;
use crate::game::MatchError;
use crate::player::{Address, PlayerRegistry};
use crate::roles::RoleAssignor;
use crate::vote::VoteTally;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};

/// Game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for players
    Connecting,
    /// Roles dealt, night announced
    NightStart,
    /// Werewolves talk privately
    WerewolfDiscuss,
    /// Werewolves pick a victim
    WerewolfVote,
    /// Night result announced, everyone talks
    TownDiscuss,
    /// Everyone votes to eliminate a suspect
    TownVote,
    /// Game is over
    End,
}

impl GamePhase {
    /// Phases where only werewolves may talk
    pub fn is_werewolf_phase(&self) -> bool {
        matches!(self, GamePhase::WerewolfDiscuss | GamePhase::WerewolfVote)
    }

    /// Phases where messages are ballots rather than chat
    pub fn is_vote_phase(&self) -> bool {
        matches!(self, GamePhase::WerewolfVote | GamePhase::TownVote)
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GamePhase::Connecting => "connecting",
            GamePhase::NightStart => "night start",
            GamePhase::WerewolfDiscuss => "werewolf discussion",
            GamePhase::WerewolfVote => "werewolf vote",
            GamePhase::TownDiscuss => "town discussion",
            GamePhase::TownVote => "town vote",
            GamePhase::End => "end",
        };
        f.write_str(name)
    }
}

/// How a match finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    WerewolvesWin,
    TownWins,
    /// Neither faction has anyone left
    Draw,
}

impl Outcome {
    /// Faction check: decided once at least one side is empty
    pub fn from_counts(werewolves: usize, town: usize) -> Option<Self> {
        match (werewolves, town) {
            (0, 0) => Some(Outcome::Draw),
            (0, _) => Some(Outcome::TownWins),
            (_, 0) => Some(Outcome::WerewolvesWin),
            _ => None,
        }
    }

    pub fn announcement(&self) -> &'static str {
        match self {
            Outcome::WerewolvesWin => "The werewolves have taken the town. Werewolves win!",
            Outcome::TownWins => "Every werewolf is dead. The town wins!",
            Outcome::Draw => "Nobody is left standing. The game is a draw.",
        }
    }
}

/// Drives a match through its phases
#[derive(Debug)]
pub struct PhaseController {
    config: MatchConfig,
    phase: GamePhase,
    /// When the current phase's wait runs out
    deadline: Instant,
    /// "Minimum players reached" has been sent
    quorum_announced: bool,
    outcome: Option<Outcome>,
    /// Every phase entered, in order, starting with `Connecting`
    history: Vec<GamePhase>,
    assignor: RoleAssignor,
    rng: StdRng,
}

impl PhaseController {
    /// Start in `Connecting`. The config is checked first so phase
    /// deadlines stay within [`MAX_PHASE_SECS`](crate::config::MAX_PHASE_SECS) of `now`.
    pub fn new(config: MatchConfig, now: Instant, rng: StdRng) -> Result<Self, ConfigError> {
        config.validate()?;
        let deadline = now + config.connect_duration();
        Ok(Self {
            config,
            phase: GamePhase::Connecting,
            deadline,
            quorum_announced: false,
            outcome: None,
            history: vec![GamePhase::Connecting],
            assignor: RoleAssignor::new(),
            rng,
        })
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_finished(&self) -> bool {
        self.phase == GamePhase::End
    }

    pub fn history(&self) -> &[GamePhase] {
        &self.history
    }

    /// Next time `advance` has work to do, `None` once the match is over
    pub fn deadline(&self) -> Option<Instant> {
        (!self.is_finished()).then_some(self.deadline)
    }

    /// Run the transition that is due at `now`, if any
    pub fn advance(
        &mut self,
        now: Instant,
        registry: &mut PlayerRegistry,
        tally: &mut VoteTally,
    ) -> Result<Vec<Delivery>, MatchError> {
        let mut out = Vec::new();

        match self.phase {
            GamePhase::Connecting => self.poll_connecting(now, registry, tally, &mut out)?,
            GamePhase::End => {}
            _ if now < self.deadline => {}
            GamePhase::WerewolfDiscuss => self.enter_werewolf_vote(now, registry, tally, &mut out),
            GamePhase::WerewolfVote => self.enter_town_discuss(now, registry, tally, &mut out)?,
            GamePhase::TownDiscuss => self.enter_town_vote(now, registry, tally, &mut out),
            GamePhase::TownVote => self.finish_town_vote(now, registry, tally, &mut out),
            GamePhase::NightStart => {
                return Err(MatchError::Invariant(
                    "night start is transient and must not be waited on".to_string(),
                ))
            }
        }

        Ok(out)
    }

    /// Force the match into `End`, e.g. after an internal error
    pub fn abort(&mut self) {
        self.set_phase(GamePhase::End);
    }

    fn set_phase(&mut self, next: GamePhase) {
        info!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
        self.history.push(next);
    }

    fn poll_connecting(
        &mut self,
        now: Instant,
        registry: &mut PlayerRegistry,
        tally: &mut VoteTally,
        out: &mut Vec<Delivery>,
    ) -> Result<(), MatchError> {
        let quorum = registry.len() >= self.config.quorum;
        let timer_done = now >= self.deadline;

        if quorum && !self.quorum_announced {
            self.quorum_announced = true;
            out.push(broadcast(registry, "Minimum players reached. ready to begin!!"));
        }

        if quorum && (timer_done || self.config.start_when_quorum_reached) {
            return self.enter_night_start(now, registry, tally, out);
        }

        if !quorum && timer_done {
            self.deadline = now + self.config.connect_duration();
            debug!(players = registry.len(), quorum = self.config.quorum, "connect timer extended");
            out.push(broadcast(registry, "Minimum players not reached. Extending time...."));
        }
        Ok(())
    }

    fn enter_night_start(
        &mut self,
        now: Instant,
        registry: &mut PlayerRegistry,
        tally: &mut VoteTally,
        out: &mut Vec<Delivery>,
    ) -> Result<(), MatchError> {
        self.set_phase(GamePhase::NightStart);
        registry.close();

        let dealt = self.assignor.assign_roles(
            registry,
            self.config.werewolves,
            self.config.witches,
            &mut self.rng,
        )?;
        for (address, role) in dealt {
            out.push(Delivery::notice(
                address,
                format!("========== You are a {} =========", role),
            ));
        }

        out.push(broadcast(
            registry,
            "Night falls and the town sleeps.  Everyone close your eyes",
        ));
        self.enter_werewolf_discuss(now, registry, tally, out);
        Ok(())
    }

    fn enter_werewolf_discuss(
        &mut self,
        now: Instant,
        registry: &mut PlayerRegistry,
        tally: &mut VoteTally,
        out: &mut Vec<Delivery>,
    ) {
        self.set_phase(GamePhase::WerewolfDiscuss);

        match registry.alive_werewolf_count() {
            0 => {
                let outcome = Outcome::from_counts(0, registry.alive_town_count());
                self.finish(outcome.unwrap_or(Outcome::Draw), registry, out);
            }
            1 => {
                out.push(broadcast(registry, "Werewolves, open your eyes."));
                self.enter_werewolf_vote(now, registry, tally, out);
            }
            _ => {
                out.push(broadcast(registry, "Werewolves, open your eyes."));
                out.push(Delivery::announce(
                    werewolf_addresses(registry),
                    "Discuss with your pack which player to kill tonight.",
                ));
                self.deadline = now + self.config.discuss_duration();
            }
        }
    }

    fn enter_werewolf_vote(
        &mut self,
        now: Instant,
        registry: &mut PlayerRegistry,
        tally: &mut VoteTally,
        out: &mut Vec<Delivery>,
    ) {
        self.set_phase(GamePhase::WerewolfVote);

        let voters: Vec<String> = registry.werewolves().map(|p| p.name.clone()).collect();
        let targets = registry.list_alive_names();
        let prompt = format!("Choose the player to kill: {}", join(&targets));
        tally.new_round(voters, targets);

        out.push(Delivery::announce(werewolf_addresses(registry), prompt));
        self.deadline = now + self.config.vote_duration();
    }

    fn enter_town_discuss(
        &mut self,
        now: Instant,
        registry: &mut PlayerRegistry,
        tally: &mut VoteTally,
        out: &mut Vec<Delivery>,
    ) -> Result<(), MatchError> {
        self.set_phase(GamePhase::TownDiscuss);

        let victim = tally.resolve();
        tally.clear();
        let killed = victim.and_then(|name| registry.mark_dead(&name).map(|p| p.name.clone()));
        let news = match killed {
            Some(name) => format!("The town wakes up. {} was killed during the night.", name),
            None => "The town wakes up. Nobody was killed during the night.".to_string(),
        };
        out.push(broadcast(registry, news));

        let alive = registry.alive_count();
        let werewolves = registry.alive_werewolf_count();
        if alive <= 1 || alive == werewolves {
            let outcome = Outcome::from_counts(werewolves, registry.alive_town_count())
                .ok_or_else(|| {
                    MatchError::Invariant(format!(
                        "{} alive with {} werewolves but no faction is empty",
                        alive, werewolves
                    ))
                })?;
            self.finish(outcome, registry, out);
            return Ok(());
        }

        out.push(broadcast(
            registry,
            "Discuss who among you might be a werewolf.",
        ));
        self.deadline = now + self.config.discuss_duration();
        Ok(())
    }

    fn enter_town_vote(
        &mut self,
        now: Instant,
        registry: &mut PlayerRegistry,
        tally: &mut VoteTally,
        out: &mut Vec<Delivery>,
    ) {
        self.set_phase(GamePhase::TownVote);

        let names = registry.list_alive_names();
        let prompt = format!("Vote for the player to eliminate: {}", join(&names));
        tally.new_round(names.clone(), names);

        out.push(broadcast(registry, prompt));
        self.deadline = now + self.config.vote_duration();
    }

    fn finish_town_vote(
        &mut self,
        now: Instant,
        registry: &mut PlayerRegistry,
        tally: &mut VoteTally,
        out: &mut Vec<Delivery>,
    ) {
        let suspect = tally.resolve();
        tally.clear();
        let eliminated = suspect.and_then(|name| {
            registry
                .mark_dead(&name)
                .map(|p| (p.name.clone(), p.role))
        });
        let news = match eliminated {
            Some((name, role)) => format!("The town has eliminated {}. They were a {}.", name, role),
            None => "The town could not agree. Nobody was eliminated.".to_string(),
        };
        out.push(broadcast(registry, news));

        match Outcome::from_counts(registry.alive_werewolf_count(), registry.alive_town_count()) {
            Some(outcome) => self.finish(outcome, registry, out),
            None => self.enter_werewolf_discuss(now, registry, tally, out),
        }
    }

    fn finish(&mut self, outcome: Outcome, registry: &PlayerRegistry, out: &mut Vec<Delivery>) {
        self.set_phase(GamePhase::End);
        self.outcome = Some(outcome);
        info!(?outcome, "match finished");
        out.push(broadcast(registry, outcome.announcement()));
    }
}

/// Announcement to everyone still connected, alive or dead
fn broadcast(registry: &PlayerRegistry, text: impl Into<String>) -> Delivery {
    Delivery::announce(registry.addresses(), text)
}

fn werewolf_addresses(registry: &PlayerRegistry) -> Vec<Address> {
    registry.werewolves().map(|p| p.address).collect()
}

fn join<'a>(names: impl IntoIterator<Item = &'a String>) -> String {
    names
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(",")
}
