//! Room module hosting running games behind async actors.
//!
//! This module implements:
//! - RoomActor: Async actor owning one game engine and its pending timer
//! - RoomManager: Registry of rooms keyed by a four-letter join code
//! - Message-based communication with tokio channels
//!
//! ## Architecture
//!
//! Each room runs in its own Tokio task with an mpsc inbox. The actor's loop
//! waits on the inbox and on the game's timer deadline. Because the deadline
//! is re-read from the engine on every iteration, a cancelled or replaced
//! timer can never fire.
//!
//! ## Example
//!
//! ```no_run
//! use party_engine::game::{GameConfig, Player, PlayerAction};
//! use party_engine::room::{RoomConfig, RoomManager};
//! use std::sync::Arc;
//!
//! # async fn demo(document: &str) -> Result<(), Box<dyn std::error::Error>> {
//! let game = Arc::new(GameConfig::from_json(document)?);
//! let manager = RoomManager::new(RoomConfig::default());
//!
//! let room = manager.create_room(game, "host", None).await?;
//! room.join(Player::new("p1", "Ann")).await?;
//! room.start().await?;
//! room.action("host", PlayerAction::new("startGame", serde_json::Value::Null)).await?;
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod errors;
pub mod manager;
pub mod messages;

pub use actor::{GameEndHook, RoomActor, RoomHandle};
pub use config::RoomConfig;
pub use errors::RoomError;
pub use manager::RoomManager;
pub use messages::{RoomEvent, RoomMessage, RoomResponse, RoomSnapshot};
