//! Room configuration models.

use super::errors::RoomError;
use serde::{Deserialize, Serialize};

/// Per-room limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Maximum players in the roster (default: 16)
    pub max_players: usize,

    /// Capacity of the actor's message inbox (default: 100)
    pub inbox_capacity: usize,

    /// Capacity of each subscriber's event channel (default: 64)
    pub subscriber_capacity: usize,

    /// Seed for the game's RNG; random when absent
    pub rng_seed: Option<u64>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            max_players: 16,
            inbox_capacity: 100,
            subscriber_capacity: 64,
            rng_seed: None,
        }
    }
}

impl RoomConfig {
    pub fn validate(&self) -> Result<(), RoomError> {
        if self.max_players == 0 || self.max_players > 256 {
            return Err(RoomError::InvalidConfig(
                "Max players must be between 1 and 256".to_string(),
            ));
        }

        if self.inbox_capacity == 0 {
            return Err(RoomError::InvalidConfig(
                "Inbox capacity must be positive".to_string(),
            ));
        }

        if self.subscriber_capacity == 0 {
            return Err(RoomError::InvalidConfig(
                "Subscriber capacity must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Game-imposed `maxPlayers` caps the room limit.
    pub fn effective_max_players(&self, game_max: Option<usize>) -> usize {
        game_max.map_or(self.max_players, |max| max.min(self.max_players))
    }
}
