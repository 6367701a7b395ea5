//! Match configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Longest any single phase timer may run (one day)
pub const MAX_PHASE_SECS: u64 = 24 * 60 * 60;

/// Configuration problems that stop a match from being created
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Quorum must be at least 1")]
    ZeroQuorum,

    #[error("At least one werewolf is required")]
    NoWerewolves,

    #[error("At most one witch is supported, got {0}")]
    TooManyWitches(usize),

    #[error("{werewolves} werewolves and {witches} witches leave no townspeople with a quorum of {quorum}")]
    TooManySpecialRoles {
        werewolves: usize,
        witches: usize,
        quorum: usize,
    },

    #[error("{field} is {secs}s, the limit is {}s", MAX_PHASE_SECS)]
    DurationTooLong { field: &'static str, secs: u64 },

    #[error("Invalid configuration file: {0}")]
    Parse(String),
}

/// Settings for a single match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Players needed before the night can start
    pub quorum: usize,
    pub werewolves: usize,
    /// 0 or 1
    pub witches: usize,
    /// Connect phase length; extended while quorum is missing
    pub connect_secs: u64,
    /// Length of each discussion phase
    pub discuss_secs: u64,
    /// Length of each vote phase
    pub vote_secs: u64,
    /// Leave Connecting as soon as quorum is met instead of waiting out the
    /// connect timer.
    pub start_when_quorum_reached: bool,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            quorum: 4,
            werewolves: 2,
            witches: 1,
            connect_secs: 60,
            discuss_secs: 60,
            vote_secs: 30,
            start_when_quorum_reached: false,
        }
    }
}

impl MatchConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check the settings can produce a playable match
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quorum == 0 {
            return Err(ConfigError::ZeroQuorum);
        }
        if self.werewolves == 0 {
            return Err(ConfigError::NoWerewolves);
        }
        if self.witches > 1 {
            return Err(ConfigError::TooManyWitches(self.witches));
        }
        if self.werewolves + self.witches >= self.quorum {
            return Err(ConfigError::TooManySpecialRoles {
                werewolves: self.werewolves,
                witches: self.witches,
                quorum: self.quorum,
            });
        }
        for (field, secs) in [
            ("connect_secs", self.connect_secs),
            ("discuss_secs", self.discuss_secs),
            ("vote_secs", self.vote_secs),
        ] {
            if secs > MAX_PHASE_SECS {
                return Err(ConfigError::DurationTooLong { field, secs });
            }
        }
        Ok(())
    }

    pub fn connect_duration(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn discuss_duration(&self) -> Duration {
        Duration::from_secs(self.discuss_secs)
    }

    pub fn vote_duration(&self) -> Duration {
        Duration::from_secs(self.vote_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(MatchConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_validation_errors() {
        let zero = MatchConfig {
            quorum: 0,
            ..MatchConfig::default()
        };
        assert_eq!(zero.validate(), Err(ConfigError::ZeroQuorum));

        let crowded = MatchConfig {
            quorum: 3,
            werewolves: 2,
            witches: 1,
            ..MatchConfig::default()
        };
        assert!(matches!(
            crowded.validate(),
            Err(ConfigError::TooManySpecialRoles { .. })
        ));

        let witches = MatchConfig {
            quorum: 8,
            witches: 2,
            ..MatchConfig::default()
        };
        assert_eq!(witches.validate(), Err(ConfigError::TooManyWitches(2)));

        let no_wolves = MatchConfig {
            werewolves: 0,
            ..MatchConfig::default()
        };
        assert_eq!(no_wolves.validate(), Err(ConfigError::NoWerewolves));
    }

    #[test]
    fn test_phase_timers_are_bounded() {
        let day = MatchConfig {
            vote_secs: MAX_PHASE_SECS,
            ..MatchConfig::default()
        };
        assert_eq!(day.validate(), Ok(()));

        let forever = MatchConfig {
            discuss_secs: u64::MAX,
            ..MatchConfig::default()
        };
        assert_eq!(
            forever.validate(),
            Err(ConfigError::DurationTooLong {
                field: "discuss_secs",
                secs: u64::MAX,
            })
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = MatchConfig::from_json(r#"{"quorum": 6, "vote_secs": 10}"#).unwrap();

        assert_eq!(config.quorum, 6);
        assert_eq!(config.vote_secs, 10);
        assert_eq!(config.werewolves, 2);
        assert!(!config.start_when_quorum_reached);
        assert!(MatchConfig::from_json("not json").is_err());
    }
}
