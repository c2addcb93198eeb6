//! Players, roles and the projected views handed to the room layer.

use super::constants::{SERVER_ACTOR, STATE_UPDATE_EVENT};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

pub type PlayerId = String;

/// Who is issuing an action, as far as permissions are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Player,
    Server,
}

impl Role {
    /// `"server"` is always the server; the host id is the host; anyone else
    /// is a player.
    pub fn of(actor_id: &str, host_id: &str) -> Self {
        if actor_id == SERVER_ACTOR {
            Self::Server
        } else if actor_id == host_id {
            Self::Host
        } else {
            Self::Player
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Host => write!(f, "host"),
            Role::Player => write!(f, "player"),
            Role::Server => write!(f, "server"),
        }
    }
}

/// A participant as known to the room layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Avatar, team, role or any other display metadata.
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Player {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            metadata: Map::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn to_value(&self) -> Value {
        let mut record = self.metadata.clone();
        record.insert("id".to_string(), Value::String(self.id.clone()));
        record.insert("name".to_string(), Value::String(self.name.clone()));
        Value::Object(record)
    }

    /// The player's record with their per-player attributes layered on top.
    /// `id` and `name` always come from the record.
    pub fn merged_with(&self, attributes: Option<&Value>) -> Value {
        let mut merged = Map::new();
        if let Some(Value::Object(attributes)) = attributes {
            merged.extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        if let Value::Object(record) = self.to_value() {
            merged.extend(record);
        }
        Value::Object(merged)
    }
}

/// An action as submitted by a client: `{"type": "...", "payload": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl PlayerAction {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Interpolated UI for every viewer of one game.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub host_view: Value,
    pub player_views: Map<String, Value>,
}

impl Projection {
    pub fn player_view(&self, player_id: &str) -> Option<&Value> {
        self.player_views.get(player_id)
    }
}

/// One state broadcast, ready for the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub event: String,
    pub status: String,
    pub projection: Projection,
}

impl Broadcast {
    pub fn state_update(status: impl Into<String>, projection: Projection) -> Self {
        Self {
            event: STATE_UPDATE_EVENT.to_string(),
            status: status.into(),
            projection,
        }
    }

    /// Payload of the `gameStateUpdate` event.
    pub fn payload(&self) -> Value {
        json!({
            "status": self.status,
            "hostView": self.projection.host_view,
            "playerViews": self.projection.player_views,
        })
    }
}

/// Notifications buffered by the engine for its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Broadcast the projected state.
    StateChanged(Broadcast),
    /// Status just became `FINISHED`. Emitted exactly once per game.
    GameEnded { final_state: Value },
}

/// What a handled action did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Target state, if a transition fired.
    pub transitioned_to: Option<String>,
    /// Whether the action ran effects or changed state and was broadcast.
    pub broadcast: bool,
}
