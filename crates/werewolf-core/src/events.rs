//! Inbound events from the transport and deliveries handed back to it.

use crate::player::Address;
use serde::{Deserialize, Serialize};

/// Sender name used for notices written by the game itself
pub const SERVER_NAME: &str = "server";

/// Events the transport feeds into a match, each attributed to an address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InboundEvent {
    /// A new connection asks to join under a display name
    Connect { name: String },
    /// The connection went away
    Disconnect,
    /// Free text: chat, or a vote during a vote phase
    ChatOrVote { text: String },
}

/// One line of text as shown to a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Display name of the speaker, or `SERVER_NAME`
    pub from: String,
    pub text: String,
}

impl Line {
    pub fn server(text: impl Into<String>) -> Self {
        Self {
            from: SERVER_NAME.to_string(),
            text: text.into(),
        }
    }

    pub fn from_player(name: &str, text: impl Into<String>) -> Self {
        Self {
            from: name.to_string(),
            text: text.into(),
        }
    }
}

/// Something the transport must send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    /// To a single address
    Deliver { to: Address, line: Line },
    /// The same line to several addresses
    DeliverMany { to: Vec<Address>, line: Line },
}

impl Delivery {
    /// Private notice from the server
    pub fn notice(to: Address, text: impl Into<String>) -> Self {
        Delivery::Deliver {
            to,
            line: Line::server(text),
        }
    }

    /// Server announcement to many
    pub fn announce(to: Vec<Address>, text: impl Into<String>) -> Self {
        Delivery::DeliverMany {
            to,
            line: Line::server(text),
        }
    }

    pub fn line(&self) -> &Line {
        match self {
            Delivery::Deliver { line, .. } | Delivery::DeliverMany { line, .. } => line,
        }
    }

    /// Addresses this delivery reaches
    pub fn recipients(&self) -> &[Address] {
        match self {
            Delivery::Deliver { to, .. } => std::slice::from_ref(to),
            Delivery::DeliverMany { to, .. } => to,
        }
    }

    pub fn reaches(&self, address: Address) -> bool {
        self.recipients().contains(&address)
    }
}
