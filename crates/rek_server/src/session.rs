//! Per-connection session.
//!
//! A [`PlayerSession`] turns the intents of one connection into room
//! commands. A connection sits in at most one room; creating or joining
//! another room leaves the current one first.

use crate::actor::RoomCommand;
use crate::protocol::{Choice, ClientMessage, ConnectionId, ServerMessage};
use crate::registry::{RoomHandle, RoomRegistry};
use crate::room::{LeaveReason, RoomError};
use rek_core::Move;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Dispatcher for one player connection.
#[derive(Debug)]
pub struct PlayerSession {
    id: ConnectionId,
    registry: RoomRegistry,
    room: Option<RoomHandle>,
}

impl PlayerSession {
    /// Opens a connection on `registry` and returns the session with its
    /// outbox.
    pub fn open(registry: RoomRegistry) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (id, outbox) = registry.connect();
        (
            Self {
                id,
                registry,
                room: None,
            },
            outbox,
        )
    }

    /// Connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Room the player currently sits in. A destroyed room no longer counts.
    pub fn room_id(&self) -> Option<&str> {
        self.room
            .as_ref()
            .filter(|h| self.registry.is_current(h))
            .map(RoomHandle::id)
    }

    /// Parses one text frame and handles it. Malformed frames are answered
    /// with `actionRejected`.
    pub async fn handle_text(&mut self, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(message) => self.handle(message).await,
            Err(e) => {
                warn!(conn = %self.id, error = %e, "Malformed client message");
                self.reply(ServerMessage::ActionRejected {
                    reason: format!("Malformed message: {e}"),
                });
            }
        }
    }

    /// Handles one intent.
    #[instrument(skip(self), fields(conn = %self.id))]
    pub async fn handle(&mut self, message: ClientMessage) {
        let conn = self.id;
        self.forget_destroyed_room();
        match message {
            ClientMessage::CreateRoom { room_id, is_public } => {
                if self.room_id() == Some(room_id.as_str()) {
                    self.reject(&room_id, RoomError::AlreadyInRoom);
                    return;
                }
                let handle = match self.registry.create_room(&room_id, is_public) {
                    Ok(handle) => handle,
                    Err(e) => {
                        self.reject(&room_id, e);
                        return;
                    }
                };
                self.leave_current();
                self.enter(handle).await;
            }
            ClientMessage::JoinRoom { room_id } => {
                if self.room_id() == Some(room_id.as_str()) {
                    self.reject(&room_id, RoomError::AlreadyInRoom);
                    return;
                }
                let Some(handle) = self.registry.room(&room_id) else {
                    self.reject(&room_id, RoomError::RoomNotFound);
                    return;
                };
                self.leave_current();
                self.enter(handle).await;
            }
            ClientMessage::PlayWithBot => {
                self.leave_current();
                let handle = self.registry.create_bot_room();
                self.enter(handle).await;
            }
            ClientMessage::GetRoomList => {
                self.reply(ServerMessage::RoomList {
                    rooms: self.registry.room_list(),
                });
            }
            ClientMessage::PlayerReady { room_id } => {
                self.forward(&room_id, RoomCommand::Ready { conn });
            }
            ClientMessage::MakeMove { room_id, from, to } => {
                let mv = Move::new(from, to);
                self.forward(&room_id, RoomCommand::Move { conn, mv });
            }
            ClientMessage::TimeUp { room_id } => {
                self.forward(&room_id, RoomCommand::TimeUp { conn });
            }
            ClientMessage::PlayerChoice { room_id, choice } => {
                let forwarded = self.forward(&room_id, RoomCommand::Choice { conn, choice });
                if forwarded && choice == Choice::Exit {
                    self.room = None;
                }
            }
            ClientMessage::RequestRestart { room_id } => {
                self.forward(&room_id, RoomCommand::RequestRestart { conn });
            }
            ClientMessage::RestartResponse { room_id, accepted } => {
                self.forward(&room_id, RoomCommand::RestartResponse { conn, accepted });
            }
            ClientMessage::SendMessage { room_id, message } => {
                self.forward(&room_id, RoomCommand::Chat { conn, message });
            }
            ClientMessage::ExitLobby { room_id } => {
                let reason = LeaveReason::ExitLobby;
                if self.forward(&room_id, RoomCommand::Leave { conn, reason }) {
                    self.room = None;
                }
            }
        }
    }

    /// Leaves the current room and drops the outbox.
    #[instrument(skip(self), fields(conn = %self.id))]
    pub fn close(&mut self) {
        self.leave_current();
        self.registry.disconnect(self.id);
    }

    async fn enter(&mut self, handle: RoomHandle) {
        match handle.join(self.id).await {
            Ok(color) => {
                info!(room_id = handle.id(), %color, "Entered room");
                self.room = Some(handle);
            }
            Err(e) => self.reject(handle.id(), e),
        }
    }

    fn forget_destroyed_room(&mut self) {
        if let Some(handle) = self.room.take_if(|h| !self.registry.is_current(h)) {
            debug!(room_id = handle.id(), "Room was destroyed, forgetting it");
        }
    }

    fn leave_current(&mut self) {
        if let Some(handle) = self.room.take() {
            let command = RoomCommand::Leave {
                conn: self.id,
                reason: LeaveReason::Disconnect,
            };
            if handle.send(command).is_err() {
                debug!(room_id = handle.id(), "Room already closed");
            }
        }
    }

    /// Sends `command` to the current room if it is `room_id`.
    fn forward(&mut self, room_id: &str, command: RoomCommand) -> bool {
        let Some(handle) = self.room.as_ref().filter(|h| h.id() == room_id) else {
            self.reject(room_id, RoomError::NotInRoom);
            return false;
        };
        match handle.send(command) {
            Ok(()) => true,
            Err(e) => {
                self.room = None;
                self.reject(room_id, e);
                false
            }
        }
    }

    fn reject(&self, room_id: &str, error: RoomError) {
        debug!(room_id, error = %error, "Intent rejected");
        self.reply(error.to_message(room_id));
    }

    fn reply(&self, message: ServerMessage) {
        self.registry.deliver(self.id, message);
    }
}
