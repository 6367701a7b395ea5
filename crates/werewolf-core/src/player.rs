//! Player state and the match roster.
//!
//! This module contains:
//! - Role, the closed set of roles a player can hold
//! - Player, one connected participant
//! - PlayerRegistry, the roster keyed by connection address, plus the
//!   role-subset views computed from it

use crate::events::SERVER_NAME;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Stable per-connection address assigned by the transport.
pub type Address = Uuid;

/// Player roles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Not yet dealt (Connecting phase only)
    #[default]
    Unassigned,
    Werewolf,
    Witch,
    Townsperson,
}

impl Role {
    /// Whether this role counts toward the town faction
    pub fn is_town(&self) -> bool {
        matches!(self, Role::Witch | Role::Townsperson)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Unassigned => write!(f, "unassigned"),
            Role::Werewolf => write!(f, "werewolf"),
            Role::Witch => write!(f, "witch"),
            Role::Townsperson => write!(f, "townsperson"),
        }
    }
}

/// Errors raised by roster membership operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Address is already connected")]
    DuplicateAddress,

    #[error("Display name '{0}' is already taken")]
    DuplicateDisplayName(String),

    #[error("Display name must not be empty")]
    InvalidDisplayName,

    #[error("Display name '{0}' is reserved")]
    ReservedDisplayName(String),

    #[error("Game has already started.")]
    MatchAlreadyStarted,

    #[error("Unknown address")]
    UnknownAddress,

    #[error("Role for '{0}' was already assigned")]
    RoleAlreadySet(String),
}

/// A connected player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub address: Address,
    pub name: String,
    pub role: Role,
    pub alive: bool,
}

impl Player {
    pub fn new(address: Address, name: String) -> Self {
        Self {
            address,
            name,
            role: Role::Unassigned,
            alive: true,
        }
    }

    /// Alive and holding `role`
    pub fn is_alive_as(&self, role: Role) -> bool {
        self.alive && self.role == role
    }
}

/// The roster of a single match.
///
/// Role-subset views (werewolves, witches) are filtered iterators over the
/// same map, so a player's role and alive flag can never disagree between
/// the roster and a view.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: HashMap<Address, Player>,
    /// Set once the match leaves Connecting
    closed: bool,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered players, alive or dead
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Stop accepting registrations
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Add a new player with no role
    pub fn register(&mut self, address: Address, name: &str) -> Result<&Player, RegistryError> {
        if self.closed {
            return Err(RegistryError::MatchAlreadyStarted);
        }
        if name.trim().is_empty() {
            return Err(RegistryError::InvalidDisplayName);
        }
        // Game notices are sent under this name
        if name.trim().eq_ignore_ascii_case(SERVER_NAME) {
            return Err(RegistryError::ReservedDisplayName(name.to_string()));
        }
        if self.players.contains_key(&address) {
            return Err(RegistryError::DuplicateAddress);
        }
        if self.find_by_name(name).is_some() {
            return Err(RegistryError::DuplicateDisplayName(name.to_string()));
        }

        let player = Player::new(address, name.to_string());
        Ok(&*self.players.entry(address).or_insert(player))
    }

    /// Remove a player from the roster and therefore from every view
    pub fn unregister(&mut self, address: Address) -> Result<Player, RegistryError> {
        self.players
            .remove(&address)
            .ok_or(RegistryError::UnknownAddress)
    }

    pub fn lookup(&self, address: Address) -> Result<&Player, RegistryError> {
        self.players
            .get(&address)
            .ok_or(RegistryError::UnknownAddress)
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Player> {
        self.players.values().find(|p| p.name == name)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn alive(&self) -> impl Iterator<Item = &Player> {
        self.players.values().filter(|p| p.alive)
    }

    /// Alive players holding `role`
    pub fn alive_with_role(&self, role: Role) -> impl Iterator<Item = &Player> {
        self.players.values().filter(move |p| p.is_alive_as(role))
    }

    /// Werewolf view: alive werewolves
    pub fn werewolves(&self) -> impl Iterator<Item = &Player> {
        self.alive_with_role(Role::Werewolf)
    }

    /// Witch view: alive witches
    pub fn witches(&self) -> impl Iterator<Item = &Player> {
        self.alive_with_role(Role::Witch)
    }

    /// Display names of every alive player, sorted
    pub fn list_alive_names(&self) -> BTreeSet<String> {
        self.alive().map(|p| p.name.clone()).collect()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.players.keys().copied().collect()
    }

    pub fn alive_count(&self) -> usize {
        self.alive().count()
    }

    pub fn alive_werewolf_count(&self) -> usize {
        self.werewolves().count()
    }

    /// Alive townspeople and witches
    pub fn alive_town_count(&self) -> usize {
        self.alive().filter(|p| p.role.is_town()).count()
    }

    /// Give a player their role. Roles are dealt exactly once.
    pub fn set_role(&mut self, address: Address, role: Role) -> Result<(), RegistryError> {
        let player = self
            .players
            .get_mut(&address)
            .ok_or(RegistryError::UnknownAddress)?;
        if player.role != Role::Unassigned {
            return Err(RegistryError::RoleAlreadySet(player.name.clone()));
        }
        player.role = role;
        Ok(())
    }

    /// Flip the alive flag of the player called `name`.
    ///
    /// Returns the killed player, or `None` (logged) when nobody alive has
    /// that name, e.g. because they disconnected after being voted for.
    pub fn mark_dead(&mut self, name: &str) -> Option<&Player> {
        match self.players.values_mut().find(|p| p.name == name && p.alive) {
            Some(player) => {
                player.alive = false;
                info!(name = %player.name, role = %player.role, "player marked dead");
                Some(&*player)
            }
            None => {
                warn!(name = %name, "mark_dead found no alive player with that name");
                None
            }
        }
    }
}
