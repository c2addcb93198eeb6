//! Newline-delimited JSON commands read from stdin, and the JSON lines
//! written back.

use anyhow::Error;
use party_engine::{
    Player, PlayerAction, RoomHandle,
    room::{RoomEvent, RoomResponse},
};
use serde::Deserialize;
use serde_json::{Value, json};

/// One line of input, e.g. `{"cmd":"action","player":"p1","type":"submitAnswer","payload":{"choice":"Paris"}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "camelCase")]
pub enum Command {
    Join {
        id: String,
        #[serde(default)]
        name: Option<String>,
    },
    Leave {
        id: String,
    },
    Start,
    Action {
        player: String,
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        payload: Value,
    },
    Snapshot,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Sends the command to the room and renders the reply line.
    /// `Quit` is handled by the caller and renders nothing.
    pub async fn execute(self, room: &RoomHandle) -> Result<Option<Value>, Error> {
        let response = match self {
            Command::Join { id, name } => {
                let name = name.unwrap_or_else(|| id.clone());
                room.join(Player::new(id, name)).await?
            }
            Command::Leave { id } => room.leave(id).await?,
            Command::Start => room.start().await?,
            Command::Action {
                player,
                kind,
                payload,
            } => room.action(player, PlayerAction::new(kind, payload)).await?,
            Command::Snapshot => {
                let snapshot = serde_json::to_value(room.snapshot().await?)?;
                return Ok(Some(json!({ "snapshot": snapshot })));
            }
            Command::Quit => return Ok(None),
        };
        Ok(Some(render_response(&response)))
    }
}

pub fn render_response(response: &RoomResponse) -> Value {
    let mut reply = json!({ "ok": response.is_success() });
    if let RoomResponse::Transitioned(state) = response {
        reply["transitionedTo"] = Value::String(state.clone());
    }
    if let Some(error) = response.error_message() {
        reply["error"] = Value::String(error);
    }
    reply
}

pub fn render_event(event: &RoomEvent) -> Value {
    match event {
        RoomEvent::StateChanged(broadcast) => json!({
            "event": broadcast.event,
            "payload": broadcast.payload(),
        }),
        RoomEvent::GameEnded {
            room_code,
            final_state,
        } => json!({
            "event": "gameEnded",
            "roomCode": room_code,
            "finalState": final_state,
        }),
    }
}

/// Reply for a line that is not a valid command
pub fn render_parse_error(error: &serde_json::Error) -> Value {
    json!({ "ok": false, "error": format!("Invalid command: {error}") })
}
