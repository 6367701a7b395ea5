//! WebSocket protocol messages for the werewolf server.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use werewolf_core::{GamePhase, InboundEvent};

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Join the match under a display name
    Connect { name: String },

    /// Chat, or a ballot during a vote phase
    Message { text: String },

    /// Request the current phase and alive players
    Who,

    /// Ping for keepalive
    Ping,
}

impl ClientMessage {
    /// The match event this message carries, if any
    pub fn into_event(self) -> Option<InboundEvent> {
        match self {
            ClientMessage::Connect { name } => Some(InboundEvent::Connect { name }),
            ClientMessage::Message { text } => Some(InboundEvent::ChatOrVote { text }),
            ClientMessage::Who | ClientMessage::Ping => None,
        }
    }
}

/// Messages sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with the connection's address
    Welcome { address: Uuid },

    /// A line of text from the server or another player
    Message { from: String, text: String },

    /// Answer to `Who`
    Roster { phase: GamePhase, alive: Vec<String> },

    /// Malformed request
    Error { message: String },

    /// Pong response
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_json_shape() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"Connect","payload":{"name":"ada"}}"#).unwrap();
        assert_eq!(msg, ClientMessage::Connect { name: "ada".into() });

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"Who"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Who);
    }

    #[test]
    fn test_into_event() {
        assert_eq!(
            ClientMessage::Message { text: "hi".into() }.into_event(),
            Some(InboundEvent::ChatOrVote { text: "hi".into() })
        );
        assert_eq!(ClientMessage::Ping.into_event(), None);
    }

    #[test]
    fn test_server_message_json_shape() {
        let json = serde_json::to_value(ServerMessage::Message {
            from: "server".into(),
            text: "ada connected".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "Message",
                "payload": { "from": "server", "text": "ada connected" }
            })
        );
    }
}
