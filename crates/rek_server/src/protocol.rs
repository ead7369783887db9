//! JSON wire protocol between players and the server.
//!
//! Every frame is a JSON object tagged by `type`. Boards travel as eight
//! rows of single-character cell codes (`H`, `X`, `R`, `O`, `P`).

use rek_core::{Board, Cell, Color, Coord, Move};
use serde::{Deserialize, Serialize};

/// Identifier of a room, chosen by the client that creates it.
pub type RoomId = String;

/// Identifier of one transport connection.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[display("conn-{}", _0)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

/// Post-game choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Choice {
    /// Vote to play another game in the same room.
    PlayAgain,
    /// End the session for both players.
    Exit,
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameOverReason {
    /// The loser's king was captured.
    KingCaptured,
    /// The loser left mid-game.
    Forfeit,
}

/// Directory entry for a joinable public room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    /// Room id.
    pub id: RoomId,
    /// Number of players currently seated.
    pub player_count: usize,
}

/// Intent sent by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Create a room (joining it if it already exists).
    CreateRoom {
        /// Room to create.
        room_id: RoomId,
        /// Whether the room appears in the public directory.
        #[serde(default)]
        is_public: bool,
    },
    /// Join an existing room.
    JoinRoom {
        /// Room to join.
        room_id: RoomId,
    },
    /// Start a single-player game against the bot.
    PlayWithBot,
    /// Signal readiness to start.
    PlayerReady {
        /// Room the player is in.
        room_id: RoomId,
    },
    /// Slide a piece.
    MakeMove {
        /// Room the player is in.
        room_id: RoomId,
        /// Square the piece leaves.
        from: Coord,
        /// Square the piece lands on.
        to: Coord,
    },
    /// The player's turn clock ran out.
    TimeUp {
        /// Room the player is in.
        room_id: RoomId,
    },
    /// Post-game choice.
    PlayerChoice {
        /// Room the player is in.
        room_id: RoomId,
        /// Play again or exit.
        choice: Choice,
    },
    /// Ask the opponent to restart mid-game.
    RequestRestart {
        /// Room the player is in.
        room_id: RoomId,
    },
    /// Answer an outstanding restart request.
    RestartResponse {
        /// Room the player is in.
        room_id: RoomId,
        /// Whether the restart is accepted.
        accepted: bool,
    },
    /// Chat with the opponent.
    SendMessage {
        /// Room the player is in.
        room_id: RoomId,
        /// Message text.
        message: String,
    },
    /// Leave the room.
    ExitLobby {
        /// Room the player is in.
        room_id: RoomId,
    },
    /// Ask for the public room directory.
    GetRoomList,
}

impl ClientMessage {
    /// Room this intent targets, if any.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            ClientMessage::CreateRoom { room_id, .. }
            | ClientMessage::JoinRoom { room_id }
            | ClientMessage::PlayerReady { room_id }
            | ClientMessage::MakeMove { room_id, .. }
            | ClientMessage::TimeUp { room_id }
            | ClientMessage::PlayerChoice { room_id, .. }
            | ClientMessage::RequestRestart { room_id }
            | ClientMessage::RestartResponse { room_id, .. }
            | ClientMessage::SendMessage { room_id, .. }
            | ClientMessage::ExitLobby { room_id } => Some(room_id),
            ClientMessage::PlayWithBot | ClientMessage::GetRoomList => None,
        }
    }
}

/// Notification pushed to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Greeting sent when the connection opens.
    Connected {
        /// Id assigned to this connection.
        connection_id: ConnectionId,
    },
    /// The player was seated in a room.
    PlayerAssigned {
        /// Room joined.
        room_id: RoomId,
        /// Color assigned for the room's lifetime.
        color: Color,
        /// The man piece of that color.
        piece: Cell,
    },
    /// Both seats are filled; waiting for ready signals.
    BothPlayersJoined,
    /// Countdown before the game starts; `0` is the last tick.
    GameStartCountdown {
        /// Ticks remaining.
        count: u8,
    },
    /// The game has started.
    GameStarted {
        /// Starting board.
        board: Board,
        /// Side to move.
        current_player: Color,
        /// Advisory per-turn clock.
        turn_seconds: u32,
    },
    /// A move was played or a turn forfeited.
    BoardUpdated {
        /// Board after the move.
        board: Board,
        /// Side to move next.
        current_player: Color,
        /// The move just played, `None` after a forfeited turn.
        last_move: Option<Move>,
    },
    /// The game ended.
    GameOver {
        /// Winning side.
        winner: Color,
        /// Final board.
        board: Board,
        /// Last move played, if any.
        last_move: Option<Move>,
        /// How the game ended.
        reason: GameOverReason,
    },
    /// A new game started in the same room.
    GameRestarted {
        /// Fresh board.
        board: Board,
        /// Side to move.
        current_player: Color,
    },
    /// The opponent asked for a restart.
    RestartRequested {
        /// Color of the requester.
        requester: Color,
    },
    /// The opponent accepted this player's restart request.
    RestartRequestAccepted,
    /// The opponent declined this player's restart request.
    RestartRequestDeclined {
        /// Color of the decliner.
        decliner: Color,
    },
    /// Chat line.
    NewMessage {
        /// Sender's color.
        player: Color,
        /// Message text.
        message: String,
    },
    /// Reply to `getRoomList`.
    RoomList {
        /// Joinable public rooms.
        rooms: Vec<RoomSummary>,
    },
    /// The public directory changed.
    RoomListUpdated {
        /// Joinable public rooms.
        rooms: Vec<RoomSummary>,
    },
    /// The opponent left the room.
    OpponentDisconnected,
    /// The room was closed.
    SessionEnded,
    /// This player left the room.
    ExitedLobby,
    /// The room already has two players.
    RoomFull {
        /// Room that was full.
        room_id: RoomId,
    },
    /// No room with that id exists.
    RoomNotFound {
        /// Room that was not found.
        room_id: RoomId,
    },
    /// The intent was rejected and had no effect.
    ActionRejected {
        /// Human-readable reason.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_make_move() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "makeMove",
            "roomId": "ABC123",
            "from": [5, 3],
            "to": [3, 3]
        }))
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::MakeMove {
                room_id: "ABC123".into(),
                from: Coord::new(5, 3),
                to: Coord::new(3, 3),
            }
        );
        assert_eq!(msg.room_id(), Some("ABC123"));
    }

    #[test]
    fn test_parse_player_choice() {
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"playerChoice","roomId":"R1","choice":"playAgain"}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::PlayerChoice {
                choice: Choice::PlayAgain,
                ..
            }
        ));
    }

    #[test]
    fn test_create_room_defaults_to_private() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"createRoom","roomId":"R1"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::CreateRoom {
                room_id: "R1".into(),
                is_public: false
            }
        );
    }

    #[test]
    fn test_board_updated_shape() {
        let msg = ServerMessage::BoardUpdated {
            board: Board::initial(),
            current_player: Color::Red,
            last_move: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "boardUpdated");
        assert_eq!(value["currentPlayer"], "Red");
        assert_eq!(value["lastMove"], serde_json::Value::Null);
        assert_eq!(value["board"][0][0], "X");
    }

    #[test]
    fn test_room_list_shape() {
        let msg = ServerMessage::RoomList {
            rooms: vec![RoomSummary {
                id: "R1".into(),
                player_count: 1,
            }],
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "type": "roomList", "rooms": [{ "id": "R1", "playerCount": 1 }] })
        );
    }

    #[test]
    fn test_unit_variant_shape() {
        assert_eq!(
            serde_json::to_value(ServerMessage::OpponentDisconnected).unwrap(),
            json!({ "type": "opponentDisconnected" })
        );
    }
}
