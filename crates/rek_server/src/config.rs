//! Server configuration.

use crate::room::RoomSettings;
use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Configuration for the game server.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Setters, Serialize, Deserialize)]
#[setters(prefix = "with_")]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    #[setters(into)]
    host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    port: u16,

    /// First countdown value announced once both players are ready.
    #[serde(default = "default_countdown_from")]
    countdown_from: u8,

    /// Delay between countdown ticks, in milliseconds.
    #[serde(default = "default_countdown_interval_ms")]
    countdown_interval_ms: u64,

    /// Lower bound of the bot's pacing delay, in milliseconds.
    #[serde(default = "default_bot_delay_min_ms")]
    bot_delay_min_ms: u64,

    /// Upper bound of the bot's pacing delay, in milliseconds.
    #[serde(default = "default_bot_delay_max_ms")]
    bot_delay_max_ms: u64,

    /// Minimax depth below each root move.
    #[serde(default = "default_bot_depth")]
    bot_depth: u8,

    /// Advisory per-turn clock sent to clients.
    #[serde(default = "default_turn_seconds")]
    turn_seconds: u32,

    /// Chat messages are truncated to this many characters.
    #[serde(default = "default_max_chat_len")]
    max_chat_len: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_countdown_from() -> u8 {
    3
}

fn default_countdown_interval_ms() -> u64 {
    1000
}

fn default_bot_delay_min_ms() -> u64 {
    1000
}

fn default_bot_delay_max_ms() -> u64 {
    2000
}

fn default_bot_depth() -> u8 {
    3
}

fn default_turn_seconds() -> u32 {
    60
}

fn default_max_chat_len() -> usize {
    200
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            countdown_from: default_countdown_from(),
            countdown_interval_ms: default_countdown_interval_ms(),
            bot_delay_min_ms: default_bot_delay_min_ms(),
            bot_delay_max_ms: default_bot_delay_max_ms(),
            bot_depth: default_bot_depth(),
            turn_seconds: default_turn_seconds(),
            max_chat_len: default_max_chat_len(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(host = %config.host, port = config.port, "Config loaded successfully");
        Ok(config)
    }

    /// Loads the effective configuration: the file if given, then the
    /// `PORT` environment variable, then validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_sources(path, std::env::var("PORT").ok())
    }

    /// Like [`ServerConfig::load`] with an explicit `PORT` value.
    #[instrument(skip(path))]
    pub fn from_sources(
        path: Option<&Path>,
        port_env: Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };

        if let Some(port) = port_env {
            config.port = port
                .trim()
                .parse()
                .map_err(|e| ConfigError::new(format!("Invalid PORT {:?}: {}", port, e)))?;
            debug!(port = config.port, "Port taken from environment");
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_delay_min_ms > self.bot_delay_max_ms {
            return Err(ConfigError::new(format!(
                "bot_delay_min_ms ({}) exceeds bot_delay_max_ms ({})",
                self.bot_delay_min_ms, self.bot_delay_max_ms
            )));
        }
        if self.bot_depth == 0 {
            return Err(ConfigError::new("bot_depth must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Renders the configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::new(format!("Failed to serialize config: {}", e)))
    }

    /// Per-room tunables derived from this configuration.
    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings::new(self.countdown_from, self.turn_seconds, self.max_chat_len)
    }

    /// Delay between countdown ticks.
    pub fn countdown_interval(&self) -> Duration {
        Duration::from_millis(self.countdown_interval_ms)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
