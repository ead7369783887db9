//! Per-room lifecycle state machine.
//!
//! A [`Room`] owns one board, its two seats and the lifecycle phase. It
//! performs no I/O: every operation returns the [`Effect`]s the caller must
//! carry out (deliver a notification, arm or cancel a timer, destroy the
//! room). The room actor is the only caller in production; tests drive the
//! machine directly.

use crate::protocol::{Choice, ConnectionId, GameOverReason, RoomId, RoomSummary, ServerMessage};
use chrono::{DateTime, Utc};
use derive_new::new;
use rek_core::invariants::{InvariantSet, RekInvariants, Transition};
use rek_core::{BOT_COLOR, Board, Color, Move, apply_move, is_legal, winner};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Reasons an intent is rejected. Rejections never change room state.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum RoomError {
    /// Both seats are taken or the game is already under way.
    #[display("Room is full")]
    RoomFull,
    /// No room with the requested id.
    #[display("Room not found")]
    RoomNotFound,
    /// The move fails the legality check.
    #[display("Illegal move")]
    IllegalMove,
    /// The sender is not the side to move.
    #[display("Not your turn")]
    NotYourTurn,
    /// The action is not allowed in the current phase.
    #[display("Cannot {} right now", action)]
    InvalidPhase {
        /// The rejected action.
        action: &'static str,
    },
    /// The sender is not seated in this room.
    #[display("Not in this room")]
    NotInRoom,
    /// The sender is already seated in this room.
    #[display("Already in this room")]
    AlreadyInRoom,
    /// A restart request is already outstanding.
    #[display("A restart request is already pending")]
    RestartPending,
    /// The room id lies in the namespace kept for bot rooms.
    #[display("Room ids starting with BOT- are reserved")]
    ReservedId,
}

impl RoomError {
    /// Notification telling the requester why the intent failed.
    pub fn to_message(&self, room_id: &str) -> ServerMessage {
        match self {
            RoomError::RoomFull => ServerMessage::RoomFull {
                room_id: room_id.to_string(),
            },
            RoomError::RoomNotFound => ServerMessage::RoomNotFound {
                room_id: room_id.to_string(),
            },
            other => ServerMessage::ActionRejected {
                reason: other.to_string(),
            },
        }
    }
}

/// Who occupies the second seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum RoomMode {
    /// Two human players.
    Multiplayer,
    /// One human playing Blue against the built-in bot.
    Bot,
}

/// Lifecycle phase of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Created, nobody seated yet.
    Empty,
    /// One player seated.
    Waiting,
    /// Two players seated, waiting for both ready signals.
    Paired,
    /// Counting down to the start.
    Countdown {
        /// Ticks still to be announced.
        remaining: u8,
    },
    /// Game in progress.
    Playing,
    /// Game finished; board frozen until play-again or exit.
    GameOver {
        /// Winning side.
        winner: Color,
    },
}

/// Why a player left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// The transport closed.
    Disconnect,
    /// The player asked to leave.
    ExitLobby,
}

/// A seated player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Player {
    /// Connection of the player.
    pub id: ConnectionId,
    /// Color held for the room's lifetime.
    pub color: Color,
}

/// Per-room tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct RoomSettings {
    /// First countdown value announced.
    pub countdown_from: u8,
    /// Advisory per-turn clock sent to clients.
    pub turn_seconds: u32,
    /// Chat messages are truncated to this many characters.
    pub max_chat_len: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self::new(3, 60, 200)
    }
}

/// Side effect requested by a room transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Deliver `message` to one connection.
    Notify {
        /// Recipient.
        to: ConnectionId,
        /// Notification.
        message: ServerMessage,
    },
    /// Call [`Room::tick`] after the countdown interval.
    ScheduleCountdownTick,
    /// Compute the bot's reply on `board` and feed it to [`Room::bot_move`].
    ScheduleBotMove {
        /// Game generation the move belongs to.
        game_id: u64,
        /// Position to search.
        board: Board,
    },
    /// Abandon every pending timer.
    CancelTimers,
    /// The room is finished and must be torn down.
    Destroy,
}

/// Outcome of a room operation.
pub type RoomResult = Result<Vec<Effect>, RoomError>;

/// One game session with its own board, phase and players.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    is_public: bool,
    mode: RoomMode,
    settings: RoomSettings,
    created_at: DateTime<Utc>,
    players: Vec<Player>,
    board: Board,
    current_player: Color,
    phase: Phase,
    last_move: Option<Move>,
    game_id: u64,
    ready: HashSet<ConnectionId>,
    play_again_votes: HashSet<ConnectionId>,
    pending_restart: Option<ConnectionId>,
}

impl Room {
    /// Creates an empty room with the initial layout, Blue to move.
    #[instrument(skip(settings))]
    pub fn new(id: RoomId, is_public: bool, mode: RoomMode, settings: RoomSettings) -> Self {
        info!(room_id = %id, is_public, %mode, "Creating room");
        Self {
            id,
            is_public,
            mode,
            settings,
            created_at: Utc::now(),
            players: Vec::with_capacity(2),
            board: Board::initial(),
            current_player: Color::Blue,
            phase: Phase::Empty,
            last_move: None,
            game_id: 0,
            ready: HashSet::new(),
            play_again_votes: HashSet::new(),
            pending_restart: None,
        }
    }

    /// Room id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the room is listed when joinable.
    pub fn is_public(&self) -> bool {
        self.is_public
    }

    /// Multiplayer or bot room.
    pub fn mode(&self) -> RoomMode {
        self.mode
    }

    /// When the room was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Seated players in join order.
    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Current board.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Side to move.
    pub fn current_player(&self) -> Color {
        self.current_player
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Last move played in the current game, if any.
    pub fn last_move(&self) -> Option<Move> {
        self.last_move
    }

    /// Generation counter, bumped every time a game starts.
    pub fn game_id(&self) -> u64 {
        self.game_id
    }

    /// Connection that has an outstanding restart request.
    pub fn pending_restart(&self) -> Option<ConnectionId> {
        self.pending_restart
    }

    /// Color of `conn`, if seated here.
    pub fn color_of(&self, conn: ConnectionId) -> Option<Color> {
        self.players.iter().find(|p| p.id == conn).map(|p| p.color)
    }

    /// Directory entry, present only while a joiner could take a seat.
    pub fn listing(&self) -> Option<RoomSummary> {
        let joinable = self.is_public
            && self.mode == RoomMode::Multiplayer
            && self.players.len() < 2
            && matches!(self.phase, Phase::Empty | Phase::Waiting);
        joinable.then(|| RoomSummary {
            id: self.id.clone(),
            player_count: self.players.len(),
        })
    }

    /// Seats `conn` in the first free color, Blue before Red.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn join(&mut self, conn: ConnectionId) -> Result<(Color, Vec<Effect>), RoomError> {
        if self.color_of(conn).is_some() {
            return Err(RoomError::AlreadyInRoom);
        }
        let seats = match self.mode {
            RoomMode::Multiplayer => 2,
            RoomMode::Bot => 1,
        };
        if self.players.len() >= seats || !matches!(self.phase, Phase::Empty | Phase::Waiting) {
            warn!(%conn, players = self.players.len(), "Room already full");
            return Err(RoomError::RoomFull);
        }

        let taken: Vec<Color> = self.players.iter().map(|p| p.color).collect();
        let color = [Color::Blue, Color::Red]
            .into_iter()
            .find(|c| !taken.contains(c))
            .ok_or(RoomError::RoomFull)?;
        self.players.push(Player { id: conn, color });
        info!(%conn, %color, "Player joined");

        let mut effects = vec![Effect::Notify {
            to: conn,
            message: ServerMessage::PlayerAssigned {
                room_id: self.id.clone(),
                color,
                piece: color.man(),
            },
        }];

        match (self.mode, self.players.len()) {
            (RoomMode::Bot, _) => effects.extend(self.start_game()),
            (RoomMode::Multiplayer, 1) => self.phase = Phase::Waiting,
            (RoomMode::Multiplayer, _) => {
                self.phase = Phase::Paired;
                effects.extend(self.broadcast(ServerMessage::BothPlayersJoined));
            }
        }
        Ok((color, effects))
    }

    /// Records a ready signal; the countdown starts once both are in.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn ready(&mut self, conn: ConnectionId) -> RoomResult {
        self.seat(conn)?;
        match self.phase {
            Phase::Waiting => return Ok(Vec::new()),
            Phase::Paired => {}
            _ => return Err(RoomError::InvalidPhase { action: "ready" }),
        }

        self.ready.insert(conn);
        if self.ready.len() < 2 {
            debug!(%conn, "Player ready, waiting for opponent");
            return Ok(Vec::new());
        }

        self.ready.clear();
        let count = self.settings.countdown_from;
        info!(count, "Both players ready, starting countdown");
        if count == 0 {
            return Ok(self.start_game());
        }
        self.phase = Phase::Countdown { remaining: count };
        let mut effects = self.broadcast(ServerMessage::GameStartCountdown { count });
        effects.push(Effect::ScheduleCountdownTick);
        Ok(effects)
    }

    /// Advances the countdown by one tick. Stale ticks are ignored.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn tick(&mut self) -> Vec<Effect> {
        let Phase::Countdown { remaining } = self.phase else {
            debug!(phase = ?self.phase, "Ignoring stale countdown tick");
            return Vec::new();
        };

        let count = remaining.saturating_sub(1);
        let mut effects = self.broadcast(ServerMessage::GameStartCountdown { count });
        if count == 0 {
            effects.extend(self.start_game());
        } else {
            self.phase = Phase::Countdown { remaining: count };
            effects.push(Effect::ScheduleCountdownTick);
        }
        effects
    }

    /// Plays a human move.
    #[instrument(skip(self), fields(room_id = %self.id, mv = %mv))]
    pub fn make_move(&mut self, conn: ConnectionId, mv: Move) -> RoomResult {
        let color = self.seat(conn)?;
        if self.phase != Phase::Playing {
            return Err(RoomError::InvalidPhase { action: "move" });
        }
        if color != self.current_player {
            debug!(%conn, %color, "Move out of turn");
            return Err(RoomError::NotYourTurn);
        }
        if !is_legal(&self.board, mv, color) {
            debug!(%conn, "Illegal move rejected");
            return Err(RoomError::IllegalMove);
        }
        Ok(self.play(mv, color))
    }

    /// Applies the bot's reply for game `game_id`.
    ///
    /// Replies for an earlier game, or arriving when it is not the bot's
    /// turn, are dropped. `None` means the bot has no move and passes.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn bot_move(&mut self, game_id: u64, mv: Option<Move>) -> RoomResult {
        if self.mode != RoomMode::Bot
            || game_id != self.game_id
            || self.phase != Phase::Playing
            || self.current_player != BOT_COLOR
        {
            debug!(game_id, current = self.game_id, "Dropping stale bot move");
            return Ok(Vec::new());
        }

        match mv {
            Some(mv) if is_legal(&self.board, mv, BOT_COLOR) => Ok(self.play(mv, BOT_COLOR)),
            Some(mv) => {
                warn!(%mv, "Bot produced an illegal move");
                Err(RoomError::IllegalMove)
            }
            None => {
                info!("Bot has no legal move, passing");
                Ok(self.pass_turn())
            }
        }
    }

    /// Forfeits the current turn on the mover's own signal.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn time_up(&mut self, conn: ConnectionId) -> RoomResult {
        let color = self.seat(conn)?;
        if self.phase != Phase::Playing {
            return Err(RoomError::InvalidPhase { action: "time up" });
        }
        if color != self.current_player {
            return Err(RoomError::NotYourTurn);
        }
        info!(%color, "Turn timed out");
        Ok(self.pass_turn())
    }

    /// Handles the post-game choice.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn player_choice(&mut self, conn: ConnectionId, choice: Choice) -> RoomResult {
        self.seat(conn)?;
        match choice {
            Choice::Exit => {
                info!(%conn, "Player ended the session");
                let mut effects = self.broadcast(ServerMessage::SessionEnded);
                effects.extend([Effect::CancelTimers, Effect::Destroy]);
                Ok(effects)
            }
            Choice::PlayAgain => {
                if !matches!(self.phase, Phase::GameOver { .. }) {
                    return Err(RoomError::InvalidPhase { action: "play again" });
                }
                if self.mode == RoomMode::Bot {
                    return Ok(self.restart());
                }
                if self.players.len() < 2 {
                    return Err(RoomError::InvalidPhase {
                        action: "play again without an opponent",
                    });
                }
                self.play_again_votes.insert(conn);
                let all_voted = self
                    .players
                    .iter()
                    .all(|p| self.play_again_votes.contains(&p.id));
                if all_voted {
                    Ok(self.restart())
                } else {
                    debug!(%conn, "Play-again vote recorded");
                    Ok(Vec::new())
                }
            }
        }
    }

    /// Asks the opponent for a mid-game restart.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn request_restart(&mut self, conn: ConnectionId) -> RoomResult {
        let color = self.seat(conn)?;
        if self.phase != Phase::Playing {
            return Err(RoomError::InvalidPhase { action: "request a restart" });
        }
        if self.pending_restart.is_some() {
            return Err(RoomError::RestartPending);
        }
        if self.mode == RoomMode::Bot {
            return Ok(self.restart());
        }

        self.pending_restart = Some(conn);
        info!(%color, "Restart requested");
        Ok(self
            .opponent_of(conn)
            .map(|to| Effect::Notify {
                to,
                message: ServerMessage::RestartRequested { requester: color },
            })
            .into_iter()
            .collect())
    }

    /// Answers the opponent's outstanding restart request.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn restart_response(&mut self, conn: ConnectionId, accepted: bool) -> RoomResult {
        let color = self.seat(conn)?;
        if self.phase != Phase::Playing {
            return Err(RoomError::InvalidPhase { action: "answer a restart" });
        }
        let requester = match self.pending_restart {
            Some(requester) if requester != conn => requester,
            _ => {
                return Err(RoomError::InvalidPhase {
                    action: "answer a restart that was not requested",
                });
            }
        };
        self.pending_restart = None;

        if accepted {
            info!(%color, "Restart accepted");
            let mut effects = vec![Effect::Notify {
                to: requester,
                message: ServerMessage::RestartRequestAccepted,
            }];
            effects.extend(self.restart());
            Ok(effects)
        } else {
            info!(%color, "Restart declined");
            Ok(vec![Effect::Notify {
                to: requester,
                message: ServerMessage::RestartRequestDeclined { decliner: color },
            }])
        }
    }

    /// Relays a chat line between two seated players.
    #[instrument(skip(self, message), fields(room_id = %self.id))]
    pub fn chat(&mut self, conn: ConnectionId, message: &str) -> RoomResult {
        let color = self.seat(conn)?;
        if self.mode == RoomMode::Bot || self.players.len() < 2 {
            return Err(RoomError::InvalidPhase { action: "chat without an opponent" });
        }
        let text: String = message
            .trim()
            .chars()
            .take(self.settings.max_chat_len)
            .collect();
        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.broadcast(ServerMessage::NewMessage {
            player: color,
            message: text,
        }))
    }

    /// Removes `conn` from the room.
    ///
    /// Leaving mid-game forfeits to the remaining player. Otherwise the room
    /// falls back to `Waiting`, or is destroyed once nobody is left.
    #[instrument(skip(self), fields(room_id = %self.id))]
    pub fn leave(&mut self, conn: ConnectionId, reason: LeaveReason) -> RoomResult {
        let index = self
            .players
            .iter()
            .position(|p| p.id == conn)
            .ok_or(RoomError::NotInRoom)?;
        let leaver = self.players.remove(index);
        info!(%conn, color = %leaver.color, ?reason, phase = ?self.phase, "Player left");

        let mut effects = Vec::new();
        if reason == LeaveReason::ExitLobby {
            effects.push(Effect::Notify {
                to: conn,
                message: ServerMessage::ExitedLobby,
            });
        }

        self.ready.clear();
        self.play_again_votes.clear();
        self.pending_restart = None;

        if self.mode == RoomMode::Bot || self.players.is_empty() {
            let age = Utc::now().signed_duration_since(self.created_at);
            info!(age_secs = age.num_seconds(), "Room is empty, destroying");
            effects.extend([Effect::CancelTimers, Effect::Destroy]);
            return Ok(effects);
        }

        let opponent_left = self.broadcast(ServerMessage::OpponentDisconnected);
        if self.phase == Phase::Playing {
            let winner = leaver.color.opponent();
            info!(%winner, "Game forfeited");
            self.phase = Phase::GameOver { winner };
            effects.extend(opponent_left);
            effects.extend(self.broadcast(ServerMessage::GameOver {
                winner,
                board: self.board.clone(),
                last_move: self.last_move,
                reason: GameOverReason::Forfeit,
            }));
            effects.push(Effect::CancelTimers);
            return Ok(effects);
        }

        if matches!(self.phase, Phase::Countdown { .. }) {
            effects.push(Effect::CancelTimers);
        }
        self.phase = Phase::Waiting;
        self.board = Board::initial();
        self.current_player = Color::Blue;
        self.last_move = None;
        effects.extend(opponent_left);
        Ok(effects)
    }

    fn seat(&self, conn: ConnectionId) -> Result<Color, RoomError> {
        self.color_of(conn).ok_or(RoomError::NotInRoom)
    }

    fn opponent_of(&self, conn: ConnectionId) -> Option<ConnectionId> {
        self.players.iter().find(|p| p.id != conn).map(|p| p.id)
    }

    fn broadcast(&self, message: ServerMessage) -> Vec<Effect> {
        self.players
            .iter()
            .map(|p| Effect::Notify {
                to: p.id,
                message: message.clone(),
            })
            .collect()
    }

    /// Puts a fresh board in play with Blue to move.
    fn reset(&mut self) {
        self.board = Board::initial();
        self.current_player = Color::Blue;
        self.phase = Phase::Playing;
        self.last_move = None;
        self.game_id += 1;
        self.ready.clear();
        self.play_again_votes.clear();
        self.pending_restart = None;
    }

    fn start_game(&mut self) -> Vec<Effect> {
        self.reset();
        info!(game_id = self.game_id, "Game started");
        self.broadcast(ServerMessage::GameStarted {
            board: self.board.clone(),
            current_player: self.current_player,
            turn_seconds: self.settings.turn_seconds,
        })
    }

    fn restart(&mut self) -> Vec<Effect> {
        self.reset();
        info!(game_id = self.game_id, "Game restarted");
        let mut effects = vec![Effect::CancelTimers];
        effects.extend(self.broadcast(ServerMessage::GameRestarted {
            board: self.board.clone(),
            current_player: self.current_player,
        }));
        effects
    }

    /// Applies a move that has already passed the legality check.
    fn play(&mut self, mv: Move, color: Color) -> Vec<Effect> {
        let before = self.board.clone();
        let captures = apply_move(&mut self.board, mv, color);
        debug_assert!(
            RekInvariants::check_all(&Transition {
                before: &before,
                after: &self.board,
                mv,
            })
            .is_ok(),
            "move {mv} broke a board invariant"
        );
        self.last_move = Some(mv);
        info!(%color, %mv, captured = captures.total(), "Move played");

        if let Some(winner) = winner(&self.board) {
            info!(%winner, "King captured, game over");
            self.phase = Phase::GameOver { winner };
            self.pending_restart = None;
            self.play_again_votes.clear();
            let mut effects = self.broadcast(ServerMessage::GameOver {
                winner,
                board: self.board.clone(),
                last_move: self.last_move,
                reason: GameOverReason::KingCaptured,
            });
            effects.push(Effect::CancelTimers);
            return effects;
        }

        self.current_player = color.opponent();
        self.turn_changed()
    }

    fn pass_turn(&mut self) -> Vec<Effect> {
        self.current_player = self.current_player.opponent();
        self.last_move = None;
        self.turn_changed()
    }

    fn turn_changed(&self) -> Vec<Effect> {
        let mut effects = self.broadcast(ServerMessage::BoardUpdated {
            board: self.board.clone(),
            current_player: self.current_player,
            last_move: self.last_move,
        });
        if self.mode == RoomMode::Bot && self.current_player == BOT_COLOR {
            effects.push(Effect::ScheduleBotMove {
                game_id: self.game_id,
                board: self.board.clone(),
            });
        }
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rek_core::{Cell, Coord};

    const BLUE: ConnectionId = ConnectionId(1);
    const RED: ConnectionId = ConnectionId(2);

    fn mv(from: (i8, i8), to: (i8, i8)) -> Move {
        Move::new(Coord::new(from.0, from.1), Coord::new(to.0, to.1))
    }

    fn messages_to(effects: &[Effect], conn: ConnectionId) -> Vec<&ServerMessage> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Notify { to, message } if *to == conn => Some(message),
                _ => None,
            })
            .collect()
    }

    fn paired_room() -> Room {
        let mut room = Room::new("R1".into(), true, RoomMode::Multiplayer, RoomSettings::default());
        room.join(BLUE).unwrap();
        room.join(RED).unwrap();
        room
    }

    fn playing_room() -> Room {
        let mut room = paired_room();
        room.ready(BLUE).unwrap();
        room.ready(RED).unwrap();
        for _ in 0..3 {
            room.tick();
        }
        assert_eq!(room.phase(), Phase::Playing);
        room
    }

    #[test]
    fn test_join_assigns_blue_then_red() {
        let mut room = Room::new("R1".into(), true, RoomMode::Multiplayer, RoomSettings::default());
        assert_eq!(room.listing().unwrap().player_count, 0);

        let (color, effects) = room.join(BLUE).unwrap();
        assert_eq!(color, Color::Blue);
        assert_eq!(room.phase(), Phase::Waiting);
        assert!(matches!(
            messages_to(&effects, BLUE)[..],
            [ServerMessage::PlayerAssigned {
                color: Color::Blue,
                piece: Cell::BlueMan,
                ..
            }]
        ));

        let (color, effects) = room.join(RED).unwrap();
        assert_eq!(color, Color::Red);
        assert_eq!(room.phase(), Phase::Paired);
        assert!(messages_to(&effects, BLUE).contains(&&ServerMessage::BothPlayersJoined));
        assert!(room.listing().is_none());

        assert_eq!(room.join(ConnectionId(3)), Err(RoomError::RoomFull));
        assert_eq!(room.join(BLUE), Err(RoomError::AlreadyInRoom));
    }

    #[test]
    fn test_ready_is_noop_while_waiting() {
        let mut room = Room::new(
            "R1".into(),
            false,
            RoomMode::Multiplayer,
            RoomSettings::default(),
        );
        room.join(BLUE).unwrap();
        assert_eq!(room.ready(BLUE), Ok(Vec::new()));
        room.join(RED).unwrap();
        // The early signal does not count.
        room.ready(RED).unwrap();
        assert_eq!(room.phase(), Phase::Paired);
    }

    #[test]
    fn test_countdown_then_playing() {
        let mut room = paired_room();
        assert!(room.ready(BLUE).unwrap().is_empty());
        let effects = room.ready(RED).unwrap();
        assert_eq!(room.phase(), Phase::Countdown { remaining: 3 });
        assert!(messages_to(&effects, RED)
            .contains(&&ServerMessage::GameStartCountdown { count: 3 }));
        assert!(effects.contains(&Effect::ScheduleCountdownTick));

        let mut counts = Vec::new();
        for _ in 0..3 {
            for message in messages_to(&room.tick(), BLUE) {
                if let ServerMessage::GameStartCountdown { count } = message {
                    counts.push(*count);
                }
            }
        }
        assert_eq!(counts, vec![2, 1, 0]);
        assert_eq!(room.phase(), Phase::Playing);
        assert_eq!(room.current_player(), Color::Blue);
        assert_eq!(room.board(), &Board::initial());

        // Late tick does nothing.
        assert!(room.tick().is_empty());
    }

    #[test]
    fn test_opening_move_flips_turn() {
        let mut room = playing_room();
        let effects = room.make_move(BLUE, mv((5, 3), (3, 3))).unwrap();
        assert_eq!(room.current_player(), Color::Red);
        assert_eq!(room.last_move(), Some(mv((5, 3), (3, 3))));
        assert_eq!(room.board().at(Coord::new(5, 3)), Cell::Empty);
        assert_eq!(room.board().at(Coord::new(3, 3)), Cell::BlueMan);
        for conn in [BLUE, RED] {
            assert!(matches!(
                messages_to(&effects, conn)[..],
                [ServerMessage::BoardUpdated {
                    current_player: Color::Red,
                    ..
                }]
            ));
        }
    }

    #[test]
    fn test_rejected_moves_change_nothing() {
        let mut room = playing_room();
        assert_eq!(
            room.make_move(RED, mv((2, 3), (3, 3))),
            Err(RoomError::NotYourTurn)
        );
        assert_eq!(
            room.make_move(BLUE, mv((5, 3), (4, 4))),
            Err(RoomError::IllegalMove)
        );
        assert_eq!(
            room.make_move(ConnectionId(9), mv((5, 3), (4, 3))),
            Err(RoomError::NotInRoom)
        );
        assert_eq!(room.board(), &Board::initial());
        assert_eq!(room.current_player(), Color::Blue);
    }

    #[test]
    fn test_king_capture_ends_game() {
        let mut room = playing_room();
        // Blue lands between Red's king and a Red man on row 0.
        room.board = Board::from_rows([
            "HXHRHHHH", "HHOHHHHH", "HHHHHHHH", "HHHHHHHH", "HHHHHHHH", "HHHHHHHH", "HHHHHHHH",
            "PHHHHHHH",
        ])
        .unwrap();
        let effects = room.make_move(BLUE, mv((1, 2), (0, 2))).unwrap();
        assert_eq!(
            room.phase(),
            Phase::GameOver {
                winner: Color::Blue
            }
        );
        assert!(matches!(
            messages_to(&effects, RED)[..],
            [ServerMessage::GameOver {
                winner: Color::Blue,
                reason: GameOverReason::KingCaptured,
                ..
            }]
        ));
        let frozen = room.board().clone();
        assert!(matches!(
            room.make_move(RED, mv((0, 1), (1, 1))),
            Err(RoomError::InvalidPhase { .. })
        ));
        assert_eq!(room.board(), &frozen);
    }

    #[test]
    fn test_time_up_only_from_current_player() {
        let mut room = playing_room();
        assert_eq!(room.time_up(RED), Err(RoomError::NotYourTurn));

        room.make_move(BLUE, mv((5, 3), (4, 3))).unwrap();
        let board = room.board().clone();
        let effects = room.time_up(RED).unwrap();
        assert_eq!(room.current_player(), Color::Blue);
        assert_eq!(room.board(), &board);
        assert_eq!(room.last_move(), None);
        assert!(matches!(
            messages_to(&effects, BLUE)[..],
            [ServerMessage::BoardUpdated { last_move: None, .. }]
        ));
    }

    #[test]
    fn test_play_again_needs_both_votes() {
        let mut room = playing_room();
        room.phase = Phase::GameOver { winner: Color::Red };
        room.make_move(BLUE, mv((5, 3), (4, 3))).unwrap_err();

        assert!(room.player_choice(BLUE, Choice::PlayAgain).unwrap().is_empty());
        assert!(matches!(room.phase(), Phase::GameOver { .. }));

        let effects = room.player_choice(RED, Choice::PlayAgain).unwrap();
        assert_eq!(room.phase(), Phase::Playing);
        assert_eq!(room.current_player(), Color::Blue);
        assert!(messages_to(&effects, BLUE)
            .iter()
            .any(|m| matches!(m, ServerMessage::GameRestarted { .. })));
    }

    #[test]
    fn test_play_again_rejected_mid_game() {
        let mut room = playing_room();
        assert!(matches!(
            room.player_choice(BLUE, Choice::PlayAgain),
            Err(RoomError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn test_exit_destroys_room_in_any_phase() {
        let mut room = paired_room();
        let effects = room.player_choice(RED, Choice::Exit).unwrap();
        assert!(messages_to(&effects, BLUE).contains(&&ServerMessage::SessionEnded));
        assert!(messages_to(&effects, RED).contains(&&ServerMessage::SessionEnded));
        assert_eq!(effects.last(), Some(&Effect::Destroy));
    }

    #[test]
    fn test_restart_declined_keeps_board() {
        let mut room = playing_room();
        room.make_move(BLUE, mv((5, 3), (4, 3))).unwrap();
        let board = room.board().clone();

        let effects = room.request_restart(BLUE).unwrap();
        assert!(matches!(
            messages_to(&effects, RED)[..],
            [ServerMessage::RestartRequested {
                requester: Color::Blue
            }]
        ));
        assert_eq!(room.request_restart(RED), Err(RoomError::RestartPending));
        assert!(room.restart_response(BLUE, true).is_err());

        let effects = room.restart_response(RED, false).unwrap();
        assert_eq!(
            messages_to(&effects, BLUE),
            vec![&ServerMessage::RestartRequestDeclined {
                decliner: Color::Red
            }]
        );
        assert!(messages_to(&effects, RED).is_empty());
        assert_eq!(room.board(), &board);
        assert_eq!(room.current_player(), Color::Red);
        assert_eq!(room.pending_restart(), None);
    }

    #[test]
    fn test_restart_accepted_resets_board() {
        let mut room = playing_room();
        room.make_move(BLUE, mv((5, 3), (4, 3))).unwrap();
        let game = room.game_id();
        room.request_restart(RED).unwrap();

        let effects = room.restart_response(BLUE, true).unwrap();
        assert!(messages_to(&effects, RED).contains(&&ServerMessage::RestartRequestAccepted));
        assert_eq!(room.board(), &Board::initial());
        assert_eq!(room.current_player(), Color::Blue);
        assert_eq!(room.game_id(), game + 1);
    }

    #[test]
    fn test_disconnect_mid_game_forfeits() {
        let mut room = playing_room();
        let effects = room.leave(BLUE, LeaveReason::Disconnect).unwrap();
        assert_eq!(room.phase(), Phase::GameOver { winner: Color::Red });
        let to_red = messages_to(&effects, RED);
        assert_eq!(to_red[0], &ServerMessage::OpponentDisconnected);
        assert!(matches!(
            to_red[1],
            ServerMessage::GameOver {
                winner: Color::Red,
                reason: GameOverReason::Forfeit,
                ..
            }
        ));
        assert!(!effects.contains(&Effect::Destroy));

        let effects = room.leave(RED, LeaveReason::Disconnect).unwrap();
        assert_eq!(effects.last(), Some(&Effect::Destroy));
    }

    #[test]
    fn test_disconnect_in_lobby_returns_to_waiting() {
        let mut room = paired_room();
        room.ready(BLUE).unwrap();
        let effects = room.leave(BLUE, LeaveReason::ExitLobby).unwrap();
        assert_eq!(messages_to(&effects, BLUE), vec![&ServerMessage::ExitedLobby]);
        assert_eq!(
            messages_to(&effects, RED),
            vec![&ServerMessage::OpponentDisconnected]
        );
        assert_eq!(room.phase(), Phase::Waiting);
        assert_eq!(room.listing().unwrap().player_count, 1);

        // A newcomer takes the free Blue seat.
        let (color, _) = room.join(ConnectionId(3)).unwrap();
        assert_eq!(color, Color::Blue);
    }

    #[test]
    fn test_disconnect_during_countdown_cancels_timers() {
        let mut room = paired_room();
        room.ready(BLUE).unwrap();
        room.ready(RED).unwrap();
        let effects = room.leave(RED, LeaveReason::Disconnect).unwrap();
        assert!(effects.contains(&Effect::CancelTimers));
        assert_eq!(room.phase(), Phase::Waiting);
        assert!(room.tick().is_empty());
    }

    #[test]
    fn test_chat_trimmed_and_truncated() {
        let mut room = Room::new(
            "R1".into(),
            false,
            RoomMode::Multiplayer,
            RoomSettings::new(3, 60, 5),
        );
        room.join(BLUE).unwrap();
        assert!(room.chat(BLUE, "hello").is_err());
        room.join(RED).unwrap();

        assert!(room.chat(BLUE, "   ").unwrap().is_empty());
        let effects = room.chat(RED, "  good game  ").unwrap();
        assert_eq!(
            messages_to(&effects, BLUE),
            vec![&ServerMessage::NewMessage {
                player: Color::Red,
                message: "good ".into()
            }]
        );
    }

    #[test]
    fn test_bot_room_starts_immediately() {
        let mut room = Room::new("BOT-1".into(), false, RoomMode::Bot, RoomSettings::default());
        let (color, effects) = room.join(BLUE).unwrap();
        assert_eq!(color, Color::Blue);
        assert_eq!(room.phase(), Phase::Playing);
        assert!(messages_to(&effects, BLUE)
            .iter()
            .any(|m| matches!(m, ServerMessage::GameStarted { .. })));
        assert_eq!(room.join(RED), Err(RoomError::RoomFull));
        assert!(room.listing().is_none());

        let effects = room.make_move(BLUE, mv((5, 3), (4, 3))).unwrap();
        let game_id = room.game_id();
        assert!(effects.iter().any(|e| matches!(
            e,
            Effect::ScheduleBotMove { game_id: g, .. } if *g == game_id
        )));

        // A reply from a previous game is dropped.
        assert!(room.bot_move(game_id - 1, Some(mv((2, 3), (3, 3)))).unwrap().is_empty());
        assert_eq!(room.current_player(), Color::Red);

        let effects = room.bot_move(game_id, Some(mv((2, 3), (3, 3)))).unwrap();
        assert_eq!(room.current_player(), Color::Blue);
        assert!(!effects
            .iter()
            .any(|e| matches!(e, Effect::ScheduleBotMove { .. })));
    }

    #[test]
    fn test_bot_room_restart_is_immediate() {
        let mut room = Room::new("BOT-1".into(), false, RoomMode::Bot, RoomSettings::default());
        room.join(BLUE).unwrap();
        room.make_move(BLUE, mv((5, 3), (4, 3))).unwrap();
        let effects = room.request_restart(BLUE).unwrap();
        assert!(effects.contains(&Effect::CancelTimers));
        assert_eq!(room.board(), &Board::initial());
        assert_eq!(room.current_player(), Color::Blue);

        let effects = room.leave(BLUE, LeaveReason::Disconnect).unwrap();
        assert_eq!(effects.last(), Some(&Effect::Destroy));
    }

    #[test]
    fn test_error_messages_target_requester_shape() {
        assert_eq!(
            RoomError::RoomFull.to_message("R1"),
            ServerMessage::RoomFull {
                room_id: "R1".into()
            }
        );
        assert_eq!(
            RoomError::NotYourTurn.to_message("R1"),
            ServerMessage::ActionRejected {
                reason: "Not your turn".into()
            }
        );
    }
}
