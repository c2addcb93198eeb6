//! Game engine - configured FSM, state tree, timer and UI projection.
//!
//! This module provides:
//! - The configuration document a game is defined by
//! - The mutable state tree and its dotted-path addressing
//! - The dispatcher that checks permissions, runs effects and takes transitions
//! - The single pending timer per game
//! - Per-viewer UI projection

pub mod config;
pub mod constants;
pub mod entities;
pub mod errors;
pub mod machine;
pub mod projector;
pub mod state;
pub mod timer;

pub use config::{ActionDefinition, GameConfig, StateDefinition, Transition, ViewTemplates};
pub use entities::{
    ActionOutcome, Broadcast, EngineEvent, Player, PlayerAction, PlayerId, Projection, Role,
};
pub use errors::{ConfigError, DispatchError, StateError};
pub use machine::GameEngine;
pub use projector::Projector;
pub use state::GameState;
pub use timer::{PendingTimer, StateTimer};
