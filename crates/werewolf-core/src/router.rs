//! Phase-aware message routing.
//!
//! Decides, for one inbound line of text, whether it is chat, a ballot, or
//! something to refuse, and who gets to see it.

use crate::events::{Delivery, Line};
use crate::phase::GamePhase;
use crate::player::{Address, Player, PlayerRegistry};
use crate::vote::{VoteError, VoteTally};
use thiserror::Error;
use tracing::debug;

/// Why a message was refused. The text is shown to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Please connect before sending messages.")]
    NotConnected,

    #[error("You cannot message while dead.")]
    Dead,

    #[error("The game has ended.")]
    GameEnded,

    #[error("You are not allowed to message in this phase.")]
    NotAllowed,

    #[error("Choose from the list only: {0}")]
    NotOnList(String),

    #[error("You have already voted.")]
    AlreadyVoted,

    #[error("Vote rejected: {0}")]
    Vote(VoteError),
}

impl From<VoteError> for Rejection {
    fn from(err: VoteError) -> Self {
        match err {
            VoteError::VoterNotEligible(_) => Rejection::AlreadyVoted,
            other => Rejection::Vote(other),
        }
    }
}

/// What happened to an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Nothing to do (empty text)
    Dropped,
    /// Refused; the sender is told why
    Rejected(Rejection),
    /// Chat to be sent to `to`
    Relayed { to: Vec<Address>, line: Line },
    /// Counted as a ballot
    VoteRecorded { voter: String, target: String },
}

impl RouteOutcome {
    /// Turn the decision into what the transport must send
    pub fn into_deliveries(self, sender: Address) -> Vec<Delivery> {
        match self {
            RouteOutcome::Dropped => Vec::new(),
            RouteOutcome::Rejected(reason) => vec![Delivery::notice(sender, reason.to_string())],
            RouteOutcome::Relayed { to, .. } if to.is_empty() => Vec::new(),
            RouteOutcome::Relayed { to, line } => vec![Delivery::DeliverMany { to, line }],
            RouteOutcome::VoteRecorded { target, .. } => vec![Delivery::notice(
                sender,
                format!("Your vote for {} has been recorded.", target),
            )],
        }
    }
}

/// Stateless routing policy
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageRouter;

impl MessageRouter {
    pub fn new() -> Self {
        Self
    }

    /// Route `text` from `sender` during `phase`.
    ///
    /// During vote phases the text is a ballot and is never relayed as
    /// chat. Chat is never echoed back to its sender.
    pub fn route(
        &self,
        sender: Address,
        phase: GamePhase,
        text: &str,
        registry: &PlayerRegistry,
        tally: &mut VoteTally,
    ) -> RouteOutcome {
        // Blank ballots fall through to the "choose from the list" reply
        let blank = text.is_empty() || (!phase.is_vote_phase() && text.trim().is_empty());
        if blank {
            debug!(address = %sender, %phase, "empty message dropped");
            return RouteOutcome::Dropped;
        }

        let player = match registry.lookup(sender) {
            Ok(player) => player,
            Err(_) => return RouteOutcome::Rejected(Rejection::NotConnected),
        };
        if !player.alive {
            return RouteOutcome::Rejected(Rejection::Dead);
        }
        if phase == GamePhase::End {
            return RouteOutcome::Rejected(Rejection::GameEnded);
        }

        let audience = Self::audience(phase, registry);
        if !audience.iter().any(|p| p.name == player.name) {
            return RouteOutcome::Rejected(Rejection::NotAllowed);
        }

        if phase.is_vote_phase() {
            return Self::cast_vote(player, text, registry, tally);
        }

        RouteOutcome::Relayed {
            to: audience
                .iter()
                .filter(|p| p.address != sender)
                .map(|p| p.address)
                .collect(),
            line: Line::from_player(&player.name, text),
        }
    }

    /// Who may speak and hear in `phase`
    fn audience(phase: GamePhase, registry: &PlayerRegistry) -> Vec<&Player> {
        if phase.is_werewolf_phase() {
            registry.werewolves().collect()
        } else {
            registry.alive().collect()
        }
    }

    fn cast_vote(
        voter: &Player,
        target: &str,
        registry: &PlayerRegistry,
        tally: &mut VoteTally,
    ) -> RouteOutcome {
        let alive = registry.list_alive_names();
        if !alive.contains(target) {
            let list = alive.into_iter().collect::<Vec<_>>().join(",");
            return RouteOutcome::Rejected(Rejection::NotOnList(list));
        }

        match tally.add_vote(&voter.name, target) {
            Ok(()) => {
                debug!(voter = %voter.name, target = %target, "vote recorded");
                RouteOutcome::VoteRecorded {
                    voter: voter.name.clone(),
                    target: target.to_string(),
                }
            }
            Err(err) => RouteOutcome::Rejected(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Role;
    use uuid::Uuid;

    struct Table {
        registry: PlayerRegistry,
        tally: VoteTally,
        wolf: Address,
        other_wolf: Address,
        witch: Address,
        town: Address,
    }

    fn table() -> Table {
        let mut registry = PlayerRegistry::new();
        let mut add = |name: &str, role: Role| {
            let addr = Uuid::new_v4();
            registry.register(addr, name).unwrap();
            registry.set_role(addr, role).unwrap();
            addr
        };
        let wolf = add("wolf", Role::Werewolf);
        let other_wolf = add("fang", Role::Werewolf);
        let witch = add("witch", Role::Witch);
        let town = add("baker", Role::Townsperson);

        Table {
            registry,
            tally: VoteTally::new(),
            wolf,
            other_wolf,
            witch,
            town,
        }
    }

    impl Table {
        fn route(&mut self, sender: Address, phase: GamePhase, text: &str) -> RouteOutcome {
            MessageRouter::new().route(sender, phase, text, &self.registry, &mut self.tally)
        }
    }

    #[test]
    fn test_empty_message_dropped() {
        let mut t = table();
        assert_eq!(t.route(t.town, GamePhase::TownDiscuss, ""), RouteOutcome::Dropped);
        assert_eq!(t.route(t.town, GamePhase::TownDiscuss, "   "), RouteOutcome::Dropped);
        assert_eq!(t.route(t.town, GamePhase::TownVote, ""), RouteOutcome::Dropped);
    }

    #[test]
    fn test_blank_ballot_gets_list() {
        let mut t = table();
        let names = t.registry.list_alive_names();
        t.tally.new_round(names.clone(), names);

        assert_eq!(
            t.route(t.witch, GamePhase::TownVote, "  "),
            RouteOutcome::Rejected(Rejection::NotOnList("baker,fang,witch,wolf".into()))
        );
        assert_eq!(t.tally.round().unwrap().total_votes(), 0);
    }

    #[test]
    fn test_unknown_sender() {
        let mut t = table();
        assert_eq!(
            t.route(Uuid::new_v4(), GamePhase::TownDiscuss, "hi"),
            RouteOutcome::Rejected(Rejection::NotConnected)
        );
    }

    #[test]
    fn test_chat_excludes_sender() {
        let mut t = table();
        let outcome = t.route(t.town, GamePhase::TownDiscuss, "hello");

        match outcome {
            RouteOutcome::Relayed { to, line } => {
                assert_eq!(to.len(), 3);
                assert!(!to.contains(&t.town));
                assert_eq!(line, Line::from_player("baker", "hello"));
            }
            other => panic!("expected relay, got {:?}", other),
        }
    }

    #[test]
    fn test_werewolf_discussion_is_private() {
        let mut t = table();

        assert_eq!(
            t.route(t.town, GamePhase::WerewolfDiscuss, "let me in"),
            RouteOutcome::Rejected(Rejection::NotAllowed)
        );
        assert_eq!(
            t.route(t.wolf, GamePhase::WerewolfDiscuss, "baker?"),
            RouteOutcome::Relayed {
                to: vec![t.other_wolf],
                line: Line::from_player("wolf", "baker?"),
            }
        );
    }

    #[test]
    fn test_dead_player_silenced() {
        let mut t = table();
        t.registry.mark_dead("baker");
        t.tally
            .new_round(t.registry.list_alive_names(), t.registry.list_alive_names());

        assert_eq!(
            t.route(t.town, GamePhase::TownDiscuss, "boo"),
            RouteOutcome::Rejected(Rejection::Dead)
        );
        assert_eq!(
            t.route(t.town, GamePhase::TownVote, "wolf"),
            RouteOutcome::Rejected(Rejection::Dead)
        );
        // Relayed chat no longer reaches the dead
        match t.route(t.witch, GamePhase::TownDiscuss, "rip") {
            RouteOutcome::Relayed { to, .. } => assert!(!to.contains(&t.town)),
            other => panic!("expected relay, got {:?}", other),
        }
    }

    #[test]
    fn test_game_ended() {
        let mut t = table();
        assert_eq!(
            t.route(t.witch, GamePhase::End, "gg"),
            RouteOutcome::Rejected(Rejection::GameEnded)
        );
    }

    #[test]
    fn test_vote_phase_counts_instead_of_relaying() {
        let mut t = table();
        let names = t.registry.list_alive_names();
        t.tally.new_round(names.clone(), names);

        let outcome = t.route(t.witch, GamePhase::TownVote, "wolf");
        assert_eq!(
            outcome,
            RouteOutcome::VoteRecorded {
                voter: "witch".into(),
                target: "wolf".into()
            }
        );
        let deliveries = outcome.into_deliveries(t.witch);
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].recipients(), &[t.witch]);
        assert_eq!(t.tally.round().unwrap().counts.get("wolf"), Some(&1));
    }

    #[test]
    fn test_vote_must_name_alive_player() {
        let mut t = table();
        let names = t.registry.list_alive_names();
        t.tally.new_round(names.clone(), names);

        let outcome = t.route(t.witch, GamePhase::TownVote, "Wolf");
        assert_eq!(
            outcome,
            RouteOutcome::Rejected(Rejection::NotOnList("baker,fang,witch,wolf".into()))
        );
        assert_eq!(t.tally.round().unwrap().total_votes(), 0);
    }

    #[test]
    fn test_repeat_vote_rejected() {
        let mut t = table();
        let names = t.registry.list_alive_names();
        t.tally.new_round(names.clone(), names);

        t.route(t.town, GamePhase::TownVote, "wolf");
        assert_eq!(
            t.route(t.town, GamePhase::TownVote, "fang"),
            RouteOutcome::Rejected(Rejection::AlreadyVoted)
        );
        assert_eq!(t.tally.round().unwrap().total_votes(), 1);
    }

    #[test]
    fn test_werewolf_vote_only_for_pack() {
        let mut t = table();
        let wolves: Vec<String> = t.registry.werewolves().map(|p| p.name.clone()).collect();
        t.tally.new_round(wolves, t.registry.list_alive_names());

        assert_eq!(
            t.route(t.witch, GamePhase::WerewolfVote, "baker"),
            RouteOutcome::Rejected(Rejection::NotAllowed)
        );
        assert!(matches!(
            t.route(t.wolf, GamePhase::WerewolfVote, "baker"),
            RouteOutcome::VoteRecorded { .. }
        ));
    }
}
