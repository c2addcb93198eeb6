//! The read-only evaluation context handed to expressions.

use super::eval::Bindings;
use crate::game::entities::Player;
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::time::Duration;

/// Snapshot of everything an expression may read.
///
/// Built fresh for every resolve call and dropped right after; nothing here
/// is retained between calls.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub game_state: &'a Value,
    pub game_data: &'a Value,
    pub players: &'a [Player],
    pub host_id: &'a str,
    pub time_in_state: Duration,
    /// Per-invocation bindings such as `actorId`, `payload` or a loop variable.
    pub extras: &'a Map<String, Value>,
}

impl<'a> EvalContext<'a> {
    /// Same context with different extra bindings.
    pub fn with_extras(self, extras: &'a Map<String, Value>) -> Self {
        Self { extras, ..self }
    }
}

impl Bindings for EvalContext<'_> {
    fn lookup(&self, name: &str) -> Option<Cow<'_, Value>> {
        if let Some(value) = self.extras.get(name) {
            return Some(Cow::Borrowed(value));
        }

        match name {
            "gameState" => Some(Cow::Borrowed(self.game_state)),
            "status" => Some(
                self.game_state
                    .get("status")
                    .map_or(Cow::Owned(Value::Null), Cow::Borrowed),
            ),
            "playerAttributes" => Some(
                self.game_state
                    .get("playerAttributes")
                    .map_or_else(|| Cow::Owned(Value::Object(Map::new())), Cow::Borrowed),
            ),
            "gameData" => Some(Cow::Borrowed(self.game_data)),
            "players" => Some(Cow::Owned(Value::Array(
                self.players.iter().map(Player::to_value).collect(),
            ))),
            "hostId" => Some(Cow::Owned(Value::String(self.host_id.to_string()))),
            "timeInState" => Some(Cow::Owned(Value::from(
                u64::try_from(self.time_in_state.as_millis()).unwrap_or(u64::MAX),
            ))),
            _ => None,
        }
    }
}
