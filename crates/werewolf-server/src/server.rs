//! WebSocket server and connection handling.

use crate::protocol::{ClientMessage, ServerMessage};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{error, info, warn};
use uuid::Uuid;
use werewolf_core::{Address, Delivery, InboundEvent, Match};

/// Server state shared by every connection and the game loop.
pub struct ServerState {
    /// The one match this process runs. Every read or write of match state
    /// goes through this lock.
    pub game: Mutex<Match>,
    /// Mapping from connection address to its message sender
    pub player_senders: DashMap<Address, mpsc::UnboundedSender<ServerMessage>>,
    /// Poked when the roster changes so the game loop re-checks quorum
    pub wake: Notify,
}

impl ServerState {
    pub fn new(game: Match) -> Self {
        Self {
            game: Mutex::new(game),
            player_senders: DashMap::new(),
            wake: Notify::new(),
        }
    }

    /// Send a message to a specific connection.
    pub fn send_to_player(&self, address: Address, msg: ServerMessage) {
        if let Some(sender) = self.player_senders.get(&address) {
            let _ = sender.send(msg);
        }
    }

    /// Hand match output to the connections it names.
    ///
    /// Called with the match lock held so players observe messages in the
    /// order the match produced them.
    pub fn deliver(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            let line = delivery.line();
            let msg = ServerMessage::Message {
                from: line.from.clone(),
                text: line.text.clone(),
            };
            for address in delivery.recipients() {
                self.send_to_player(*address, msg.clone());
            }
        }
    }
}

/// Run the WebSocket server.
pub async fn run_server(addr: SocketAddr, state: Arc<ServerState>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Werewolf server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    // Stable address for the lifetime of this connection
    let address = Uuid::new_v4();

    // Routable before any of its events reach the match. The welcome goes
    // through the same queue so it is always the first frame out.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let _ = tx.send(ServerMessage::Welcome { address });
    state.player_senders.insert(address, tx);

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    // Handle incoming messages
    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(address, client_msg, &state).await,
                Err(e) => {
                    warn!("Invalid message from {}: {}", address, text);
                    state.send_to_player(
                        address,
                        ServerMessage::Error {
                            message: e.to_string(),
                        },
                    );
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", address);
                break;
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", address, e);
                break;
            }
            _ => {}
        }
    }

    handle_disconnect(address, &state).await;
    send_task.abort();

    info!("Connection closed for {}", address);
    Ok(())
}

/// Handle a client message.
pub async fn handle_message(address: Address, msg: ClientMessage, state: &ServerState) {
    match msg {
        ClientMessage::Who => {
            let game = state.game.lock().await;
            state.send_to_player(
                address,
                ServerMessage::Roster {
                    phase: game.phase(),
                    alive: game.alive_names().into_iter().collect(),
                },
            );
        }

        ClientMessage::Ping => {
            state.send_to_player(address, ServerMessage::Pong);
        }

        msg => {
            let Some(event) = msg.into_event() else {
                return;
            };
            let roster_changed = matches!(event, InboundEvent::Connect { .. });

            let mut game = state.game.lock().await;
            let deliveries = game.handle(address, event);
            state.deliver(deliveries);
            drop(game);

            if roster_changed {
                state.wake.notify_one();
            }
        }
    }
}

/// Handle a closed connection.
pub async fn handle_disconnect(address: Address, state: &ServerState) {
    {
        let mut game = state.game.lock().await;
        let deliveries = game.handle(address, InboundEvent::Disconnect);
        state.deliver(deliveries);
    }
    state.player_senders.remove(&address);
    state.wake.notify_one();
}
