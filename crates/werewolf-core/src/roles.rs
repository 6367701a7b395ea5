//! Role dealing.
//!
//! Roles are dealt once per match, when the roster is finalised. Special
//! roles are drawn by a partial Fisher-Yates shuffle over the alive roster,
//! so selection is uniform and never retries.

use crate::player::{Address, PlayerRegistry, RegistryError, Role};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;
use tracing::debug;

/// Errors from dealing roles
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    #[error("{werewolves} werewolves and {witches} witches need more than {roster} players")]
    Configuration {
        werewolves: usize,
        witches: usize,
        roster: usize,
    },

    #[error("Roles have already been assigned")]
    AlreadyAssigned,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Deals roles to a roster exactly once
#[derive(Debug, Default)]
pub struct RoleAssignor {
    assigned: bool,
}

impl RoleAssignor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned
    }

    /// Pick `werewolves` werewolves and `witches` witches from the alive
    /// roster; everyone else becomes a townsperson.
    ///
    /// Returns each address with the role it was given.
    pub fn assign_roles<R: Rng + ?Sized>(
        &mut self,
        registry: &mut PlayerRegistry,
        werewolves: usize,
        witches: usize,
        rng: &mut R,
    ) -> Result<Vec<(Address, Role)>, RoleError> {
        if self.assigned {
            return Err(RoleError::AlreadyAssigned);
        }

        // Sort first so a seeded rng deals the same way regardless of map order
        let mut candidates: Vec<(String, Address)> = registry
            .alive()
            .map(|p| (p.name.clone(), p.address))
            .collect();
        candidates.sort();

        let roster = candidates.len();
        if werewolves + witches >= roster {
            return Err(RoleError::Configuration {
                werewolves,
                witches,
                roster,
            });
        }

        let (chosen, _) = candidates.partial_shuffle(rng, werewolves + witches);
        let chosen: Vec<Address> = chosen.iter().map(|(_, addr)| *addr).collect();

        let mut dealt = Vec::with_capacity(roster);
        for (idx, (name, address)) in candidates.iter().enumerate() {
            let role = match chosen.iter().position(|a| a == address) {
                Some(pos) if pos < werewolves => Role::Werewolf,
                Some(_) => Role::Witch,
                None => Role::Townsperson,
            };
            registry.set_role(*address, role)?;
            debug!(idx, name = %name, role = %role, "role assigned");
            dealt.push((*address, role));
        }

        self.assigned = true;
        Ok(dealt)
    }
}
