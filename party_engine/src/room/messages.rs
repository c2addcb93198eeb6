//! Room actor message types.

use crate::game::{
    entities::{Broadcast, Player, PlayerAction, PlayerId, Projection},
    errors::DispatchError,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

/// Messages that can be sent to a RoomActor
#[derive(Debug)]
pub enum RoomMessage {
    /// Add a player to the roster, or refresh their record
    Join {
        player: Player,
        response: oneshot::Sender<RoomResponse>,
    },

    Leave {
        player_id: PlayerId,
        response: oneshot::Sender<RoomResponse>,
    },

    /// Enter the game's initial state
    Start {
        response: oneshot::Sender<RoomResponse>,
    },

    /// Host or player action
    Action {
        player_id: PlayerId,
        action: PlayerAction,
        response: oneshot::Sender<RoomResponse>,
    },

    GetSnapshot {
        response: oneshot::Sender<RoomSnapshot>,
    },

    /// Subscribe to room events
    Subscribe {
        subscriber_id: String,
        sender: mpsc::Sender<RoomEvent>,
    },

    Unsubscribe { subscriber_id: String },

    Close {
        response: oneshot::Sender<RoomResponse>,
    },
}

/// Events pushed to subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// `gameStateUpdate` broadcast
    StateChanged(Broadcast),
    /// The game reached `FINISHED`; sent once
    GameEnded { room_code: String, final_state: Value },
}

/// Response from room operations
#[derive(Debug, Clone, PartialEq)]
pub enum RoomResponse {
    Success,

    /// Action accepted and the game moved to this state
    Transitioned(String),

    RoomFull,

    NotInRoom,

    /// The game rejected the request
    Rejected(DispatchError),
}

impl RoomResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, RoomResponse::Success | RoomResponse::Transitioned(_))
    }

    pub fn error_message(&self) -> Option<String> {
        match self {
            RoomResponse::RoomFull => Some("Room is full".to_string()),
            RoomResponse::NotInRoom => Some("Not in room".to_string()),
            RoomResponse::Rejected(e) => Some(e.to_string()),
            _ => None,
        }
    }
}

impl From<DispatchError> for RoomResponse {
    fn from(error: DispatchError) -> Self {
        RoomResponse::Rejected(error)
    }
}

/// Point-in-time view of a room
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub code: String,
    pub game_name: Option<String>,
    pub status: String,
    pub host_id: PlayerId,
    pub players: Vec<Player>,
    pub started: bool,
    pub finished: bool,
    /// Time until the pending timer fires
    pub timer_remaining_ms: Option<u64>,
    pub projection: Projection,
}
