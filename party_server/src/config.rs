//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use party_engine::{RoomConfig, SERVER_ACTOR};
use std::{collections::HashSet, path::PathBuf};

const DEFAULT_HOST_ID: &str = "host";

/// Complete server configuration loaded from flags and environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Path of the game configuration document
    pub game_path: PathBuf,
    /// Actor id treated as the host
    pub host_id: String,
    /// Players joined before the first command is read
    pub players: Vec<String>,
    /// Limits of the hosted room
    pub room: RoomConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// CLI flags, when given, take precedence over their environment
    /// variable.
    ///
    /// # Errors
    ///
    /// Returns error if the game document path is missing
    pub fn from_env(
        game_override: Option<PathBuf>,
        host_override: Option<String>,
        players_override: Option<String>,
        seed_override: Option<u64>,
    ) -> Result<Self, ConfigError> {
        let game_path = game_override
            .or_else(|| std::env::var("PARTY_GAME_CONFIG").ok().map(PathBuf::from))
            .ok_or_else(|| ConfigError::MissingRequired {
                var: "PARTY_GAME_CONFIG".to_string(),
                hint: "Pass --game games/quiz.json or set it in .env".to_string(),
            })?;

        let host_id = host_override
            .or_else(|| std::env::var("PARTY_HOST_ID").ok())
            .unwrap_or_else(|| DEFAULT_HOST_ID.to_string());

        let players = players_override
            .or_else(|| std::env::var("PARTY_PLAYERS").ok())
            .map(|list| parse_list(&list))
            .unwrap_or_default();

        let defaults = RoomConfig::default();
        let room = RoomConfig {
            max_players: parse_env_or("PARTY_MAX_PLAYERS", defaults.max_players),
            inbox_capacity: parse_env_or("PARTY_INBOX_CAPACITY", defaults.inbox_capacity),
            subscriber_capacity: parse_env_or(
                "PARTY_SUBSCRIBER_CAPACITY",
                defaults.subscriber_capacity,
            ),
            rng_seed: seed_override.or_else(|| {
                std::env::var("PARTY_RNG_SEED")
                    .ok()
                    .and_then(|v| v.parse().ok())
            }),
        };

        Ok(ServerConfig {
            game_path,
            host_id,
            players,
            room,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host_id.trim().is_empty() {
            return Err(ConfigError::Invalid {
                var: "PARTY_HOST_ID".to_string(),
                reason: "Must not be empty".to_string(),
            });
        }

        if self.host_id == SERVER_ACTOR {
            return Err(ConfigError::Invalid {
                var: "PARTY_HOST_ID".to_string(),
                reason: format!("'{SERVER_ACTOR}' is reserved for the engine"),
            });
        }

        let mut seen = HashSet::new();
        for player in &self.players {
            if player == SERVER_ACTOR || *player == self.host_id {
                return Err(ConfigError::Invalid {
                    var: "PARTY_PLAYERS".to_string(),
                    reason: format!("'{player}' cannot join as a player"),
                });
            }
            if !seen.insert(player) {
                return Err(ConfigError::Invalid {
                    var: "PARTY_PLAYERS".to_string(),
                    reason: format!("'{player}' is listed twice"),
                });
            }
        }

        if self.players.len() > self.room.max_players {
            return Err(ConfigError::Invalid {
                var: "PARTY_MAX_PLAYERS".to_string(),
                reason: format!(
                    "Room holds {} players but {} were given",
                    self.room.max_players,
                    self.players.len()
                ),
            });
        }

        self.room.validate().map_err(|e| ConfigError::Invalid {
            var: "PARTY_MAX_PLAYERS".to_string(),
            reason: e.to_string(),
        })
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Splits a comma separated id list, dropping blanks
pub fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
