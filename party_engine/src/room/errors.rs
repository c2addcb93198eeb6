use crate::game::errors::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room '{0}' not found")]
    NotFound(String),

    #[error("Room is closed")]
    Closed,

    #[error("Room did not respond")]
    NoResponse,

    #[error("Invalid room configuration: {0}")]
    InvalidConfig(String),

    #[error("Could not allocate a free room code")]
    CodesExhausted,

    #[error(transparent)]
    Game(#[from] ConfigError),
}
