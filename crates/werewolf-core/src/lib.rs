//! Werewolf - a phase-driven social deduction match engine
//!
//! This crate provides the core game logic for a werewolf server, including:
//! - Player roster with computed role views
//! - One-shot random role dealing
//! - Vote collection and tie-aware resolution
//! - Phase-aware chat and ballot routing
//! - The day/night phase state machine with win evaluation
//!
//! # Architecture
//!
//! The engine is synchronous and owns no clocks or sockets. A transport feeds
//! it [`InboundEvent`]s and sends out the [`Delivery`]s it returns; a
//! background loop calls [`Match::tick`] at [`Match::next_deadline`].
//!
//! # Modules
//!
//! - [`player`]: Roles, players and the roster
//! - [`roles`]: Role dealing
//! - [`vote`]: Vote rounds and tallying
//! - [`router`]: Who may say what to whom, per phase
//! - [`phase`]: Phase state machine
//! - [`game`]: The match aggregate

pub mod config;
pub mod events;
pub mod game;
pub mod phase;
pub mod player;
pub mod roles;
pub mod router;
pub mod vote;

// Re-export commonly used types
pub use config::{ConfigError, MatchConfig, MAX_PHASE_SECS};
pub use events::{Delivery, InboundEvent, Line, SERVER_NAME};
pub use game::{Match, MatchError};
pub use phase::{GamePhase, Outcome, PhaseController};
pub use player::{Address, Player, PlayerRegistry, RegistryError, Role};
pub use roles::{RoleAssignor, RoleError};
pub use router::{MessageRouter, Rejection, RouteOutcome};
pub use vote::{VoteError, VoteRound, VoteTally};
