//! Rek game server: rooms, public directory, bot games and transport.
//!
//! # Architecture
//!
//! - **Room**: pure per-room lifecycle state machine producing effects
//! - **Actor**: one task per room serializing its commands and timers
//! - **Registry**: rooms, connection outboxes and the public directory
//! - **Session**: per-connection dispatcher of client intents
//! - **Server**: axum WebSocket endpoint and JSON routes
//!
//! # Example
//!
//! ```no_run
//! use rek_server::{serve, ServerConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServerConfig::default().with_port(4000);
//! serve(config).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod actor;
mod config;
mod protocol;
mod registry;
mod room;
mod server;
mod session;

// Crate-level exports - Configuration
pub use config::{ConfigError, ServerConfig};

// Crate-level exports - Wire protocol
pub use protocol::{
    Choice, ClientMessage, ConnectionId, GameOverReason, RoomId, RoomSummary, ServerMessage,
};

// Crate-level exports - Rooms
pub use actor::RoomCommand;
pub use registry::{BOT_ROOM_PREFIX, RoomHandle, RoomRegistry};
pub use room::{
    Effect, LeaveReason, Phase, Player, Room, RoomError, RoomMode, RoomResult, RoomSettings,
};

// Crate-level exports - Transport
pub use server::{router, serve};
pub use session::PlayerSession;
