//! One task per room.
//!
//! The actor owns its [`Room`] and applies commands strictly in receipt
//! order. Countdown and bot timers are spawned tasks that report back
//! through the same queue; they are aborted whenever the room cancels
//! timers or shuts down, and a late report is ignored by the room itself.

use crate::protocol::{Choice, ConnectionId, RoomSummary};
use crate::registry::RoomRegistry;
use crate::room::{Effect, LeaveReason, Room, RoomError, RoomResult};
use rand::Rng;
use rek_core::{Board, Color, Move, Searcher};
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Command accepted by a room actor.
#[derive(Debug)]
pub enum RoomCommand {
    /// Seat a player; the assigned color is sent back on `reply`.
    Join {
        /// Joining connection.
        conn: ConnectionId,
        /// Receives the outcome.
        reply: oneshot::Sender<Result<Color, RoomError>>,
    },
    /// Ready signal.
    Ready {
        /// Sender.
        conn: ConnectionId,
    },
    /// Human move.
    Move {
        /// Sender.
        conn: ConnectionId,
        /// Requested move.
        mv: Move,
    },
    /// The sender's turn clock ran out.
    TimeUp {
        /// Sender.
        conn: ConnectionId,
    },
    /// Post-game choice.
    Choice {
        /// Sender.
        conn: ConnectionId,
        /// Play again or exit.
        choice: Choice,
    },
    /// Mid-game restart request.
    RequestRestart {
        /// Sender.
        conn: ConnectionId,
    },
    /// Answer to a restart request.
    RestartResponse {
        /// Sender.
        conn: ConnectionId,
        /// Whether the restart is accepted.
        accepted: bool,
    },
    /// Chat line.
    Chat {
        /// Sender.
        conn: ConnectionId,
        /// Message text.
        message: String,
    },
    /// Player leaves the room.
    Leave {
        /// Leaving connection.
        conn: ConnectionId,
        /// Why the player left.
        reason: LeaveReason,
    },
    /// Countdown timer fired.
    CountdownTick,
    /// Bot search finished.
    BotMove {
        /// Game the move was computed for.
        game_id: u64,
        /// Chosen move, `None` if the bot cannot move.
        mv: Option<Move>,
    },
}

pub(crate) struct RoomActor {
    room: Room,
    registry: RoomRegistry,
    instance: u64,
    tx: mpsc::UnboundedSender<RoomCommand>,
    countdown: Option<JoinHandle<()>>,
    bot: Option<JoinHandle<()>>,
    published: Option<RoomSummary>,
}

impl RoomActor {
    pub(crate) fn new(
        room: Room,
        registry: RoomRegistry,
        instance: u64,
        tx: mpsc::UnboundedSender<RoomCommand>,
    ) -> Self {
        Self {
            room,
            registry,
            instance,
            tx,
            countdown: None,
            bot: None,
            published: None,
        }
    }

    /// Processes commands until the room is destroyed.
    #[instrument(skip_all, fields(room_id = %self.room.id(), instance = self.instance))]
    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<RoomCommand>) {
        debug!("Room actor started");
        self.publish();

        while let Some(command) = rx.recv().await {
            if self.handle(command).is_break() {
                break;
            }
        }

        rx.close();
        self.cancel_timers();
        self.retire();
        info!("Room actor stopped");
    }

    fn handle(&mut self, command: RoomCommand) -> ControlFlow<()> {
        let (requester, result) = match command {
            RoomCommand::Join { conn, reply } => {
                return match self.room.join(conn) {
                    Ok((color, effects)) => {
                        let _ = reply.send(Ok(color));
                        self.apply(effects)
                    }
                    Err(e) => {
                        let _ = reply.send(Err(e));
                        ControlFlow::Continue(())
                    }
                };
            }
            RoomCommand::Ready { conn } => (Some(conn), self.room.ready(conn)),
            RoomCommand::Move { conn, mv } => (Some(conn), self.room.make_move(conn, mv)),
            RoomCommand::TimeUp { conn } => (Some(conn), self.room.time_up(conn)),
            RoomCommand::Choice { conn, choice } => {
                (Some(conn), self.room.player_choice(conn, choice))
            }
            RoomCommand::RequestRestart { conn } => (Some(conn), self.room.request_restart(conn)),
            RoomCommand::RestartResponse { conn, accepted } => {
                (Some(conn), self.room.restart_response(conn, accepted))
            }
            RoomCommand::Chat { conn, message } => (Some(conn), self.room.chat(conn, &message)),
            RoomCommand::Leave { conn, reason } => (None, self.room.leave(conn, reason)),
            RoomCommand::CountdownTick => (None, Ok(self.room.tick())),
            RoomCommand::BotMove { game_id, mv } => (None, self.room.bot_move(game_id, mv)),
        };
        self.settle(requester, result)
    }

    fn settle(&mut self, requester: Option<ConnectionId>, result: RoomResult) -> ControlFlow<()> {
        match result {
            Ok(effects) => self.apply(effects),
            Err(e) => {
                debug!(error = %e, "Action rejected");
                if let Some(conn) = requester {
                    self.registry.deliver(conn, e.to_message(self.room.id()));
                }
                ControlFlow::Continue(())
            }
        }
    }

    fn apply(&mut self, effects: Vec<Effect>) -> ControlFlow<()> {
        // The id is freed before the final notifications reach the players.
        let destroyed = effects.iter().any(|e| matches!(e, Effect::Destroy));
        if destroyed {
            self.retire();
        }
        for effect in effects {
            match effect {
                Effect::Notify { to, message } => self.registry.deliver(to, message),
                Effect::ScheduleCountdownTick => self.arm_countdown(),
                Effect::ScheduleBotMove { game_id, board } => self.arm_bot(game_id, board),
                Effect::CancelTimers => self.cancel_timers(),
                Effect::Destroy => {}
            }
        }
        if destroyed {
            return ControlFlow::Break(());
        }
        self.publish();
        ControlFlow::Continue(())
    }

    fn publish(&mut self) {
        let summary = self.room.listing();
        if summary != self.published {
            self.registry
                .publish_summary(self.room.id(), self.instance, summary.clone());
            self.published = summary;
        }
    }

    /// Drops this instance from the room table and the directory. Safe to
    /// call more than once.
    fn retire(&mut self) {
        let id = self.room.id().to_string();
        self.registry.remove_room(&id, self.instance);
        self.registry.publish_summary(&id, self.instance, None);
        self.published = None;
    }

    fn arm_countdown(&mut self) {
        let interval = self.registry.config().countdown_interval();
        let tx = self.tx.clone();
        if let Some(previous) = self.countdown.replace(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let _ = tx.send(RoomCommand::CountdownTick);
        })) {
            previous.abort();
        }
    }

    fn arm_bot(&mut self, game_id: u64, board: Board) {
        let config = self.registry.config();
        let delay = Duration::from_millis(
            rand::thread_rng().gen_range(*config.bot_delay_min_ms()..=*config.bot_delay_max_ms()),
        );
        let searcher = Searcher::new(*config.bot_depth());
        let tx = self.tx.clone();
        debug!(game_id, delay_ms = delay.as_millis() as u64, "Bot move scheduled");

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match tokio::task::spawn_blocking(move || searcher.best_move(&board)).await {
                Ok(mv) => {
                    let _ = tx.send(RoomCommand::BotMove { game_id, mv });
                }
                Err(e) => warn!(error = %e, "Bot search failed"),
            }
        });
        if let Some(previous) = self.bot.replace(task) {
            previous.abort();
        }
    }

    fn cancel_timers(&mut self) {
        for timer in [self.countdown.take(), self.bot.take()].into_iter().flatten() {
            timer.abort();
        }
    }
}
