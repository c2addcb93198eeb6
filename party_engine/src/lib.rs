//! # Party Engine
//!
//! A configurable party-game interpreter. Games are not written in code:
//! a JSON document declares the states, the permissioned actions players,
//! the host or the engine may take, the transitions between states and the
//! effects that mutate a shared game-state tree.
//!
//! ## Architecture
//!
//! - **Expression resolver** ([`expr`]): a closed expression grammar and
//!   `{{ expr }}` templating over a read-only context snapshot
//! - **Effect interpreter** ([`effects`]): a fixed set of primitives plus
//!   `runAction` indirection and `forEachPlayer` loops
//! - **State machine** ([`game`]): permissions, transitions, `onEnter`
//!   effects, the single pending timer and per-viewer UI projection
//! - **Rooms** ([`room`]): one Tokio actor per running game, addressed by a
//!   four-letter code
//!
//! ## Example
//!
//! ```
//! use party_engine::game::{EngineEvent, GameConfig, GameEngine, Player};
//! use serde_json::{Value, json};
//! use std::sync::Arc;
//!
//! let config = GameConfig::from_value(json!({
//!     "initialState": "LOBBY",
//!     "states": {
//!         "LOBBY": { "ui": { "host": { "joined": "{{ players.length }} players" } } }
//!     },
//!     "playerActions": { "finish": { "permissions": ["host"] } },
//!     "transitions": [{ "from": "LOBBY", "action": "finish", "to": "FINISHED" }]
//! }))
//! .unwrap();
//!
//! let mut game = GameEngine::new("ABCD", Arc::new(config), "host");
//! game.add_player(Player::new("p1", "Ann"));
//! game.start().unwrap();
//! assert_eq!(game.projection().host_view, json!({ "joined": "1 players" }));
//!
//! game.handle_action("host", "finish", Value::Null).unwrap();
//! assert!(game.is_finished());
//! assert!(matches!(game.drain_events().back(), Some(EngineEvent::GameEnded { .. })));
//! ```

pub mod effects;
pub mod expr;
pub mod game;
pub mod room;

pub use game::{
    GameConfig, GameEngine,
    constants::{self, FINISHED, SERVER_ACTOR},
    entities::{self, Broadcast, EngineEvent, Player, PlayerAction, Projection, Role},
};
pub use room::{RoomConfig, RoomHandle, RoomManager};
