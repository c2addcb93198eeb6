//! Game error types.

use super::entities::Role;
use thiserror::Error;

/// Reference errors found in a game configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not a structurally valid configuration
    #[error("Invalid game document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Initial state '{0}' is not defined")]
    UnknownInitialState(String),

    #[error("Transition #{index} references unknown state '{state}'")]
    UnknownTransitionState { index: usize, state: String },

    #[error("State '{state}' allows unknown action '{action}'")]
    UnknownAllowedAction { state: String, action: String },

    #[error("minPlayers ({min}) exceeds maxPlayers ({max})")]
    PlayerBounds { min: usize, max: usize },
}

/// Reasons an action was rejected by the dispatcher. None of them change state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("game has not started")]
    GameNotStarted,

    #[error("game already started")]
    AlreadyStarted,

    #[error("need {required}+ players, have {actual}")]
    NotEnoughPlayers { required: usize, actual: usize },

    #[error("game is finished")]
    GameFinished,

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("{role} may not perform '{action}'")]
    NotPermitted { action: String, role: Role },

    #[error("'{action}' is not allowed in state '{state}'")]
    NotAllowedInState { action: String, state: String },
}

/// Errors addressing the game-state tree by path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("empty path")]
    EmptyPath,

    #[error("'{0}' is managed by the state machine")]
    ProtectedPath(String),

    #[error("cannot descend into '{segment}' of '{path}': not a container")]
    NotAContainer { path: String, segment: String },

    #[error("index '{segment}' out of bounds in '{path}'")]
    IndexOutOfBounds { path: String, segment: String },
}
