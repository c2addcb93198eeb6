//! Game configuration document.
//!
//! A game is described entirely by this document: its states, the actions
//! players, the host or the engine may take, the transitions between states,
//! reusable effect lists, initial data and per-state UI templates.

use super::{
    constants::FINISHED,
    entities::Role,
    errors::ConfigError,
};
use crate::effects::EffectList;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A complete game definition. Immutable for the life of a game instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub min_players: Option<usize>,

    #[serde(default)]
    pub max_players: Option<usize>,

    pub initial_state: String,

    pub states: HashMap<String, StateDefinition>,

    /// Action types that actors may issue, keyed by name.
    #[serde(default)]
    pub player_actions: HashMap<String, ActionDefinition>,

    /// Checked in order; the first match wins.
    #[serde(default)]
    pub transitions: Vec<Transition>,

    /// Reusable effect lists reachable through `runAction`.
    #[serde(default)]
    pub actions: HashMap<String, EffectList>,

    #[serde(default)]
    pub initial_game_state: Map<String, Value>,

    /// Template copied into `playerAttributes[id]` for every new player.
    #[serde(default)]
    pub initial_player_attributes: Map<String, Value>,

    /// Static data exposed to expressions as `gameData`.
    #[serde(default)]
    pub game_data: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateDefinition {
    #[serde(default)]
    pub on_enter: EffectList,

    /// When present, only these actions are accepted in this state.
    #[serde(default)]
    pub allowed_actions: Option<Vec<String>>,

    #[serde(default)]
    pub ui: ViewTemplates,
}

/// UI trees for one state; every string leaf may hold `{{ }}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewTemplates {
    #[serde(default)]
    pub host: Value,

    #[serde(default)]
    pub player: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefinition {
    #[serde(default = "default_permissions")]
    pub permissions: Vec<Role>,

    #[serde(default)]
    pub effects: EffectList,
}

fn default_permissions() -> Vec<Role> {
    vec![Role::Host, Role::Player]
}

impl ActionDefinition {
    pub fn permits(&self, role: Role) -> bool {
        self.permissions.contains(&role)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Value>,
    pub to: String,
}

impl GameConfig {
    /// Parses a configuration document from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Every configured state plus the implicit terminal state.
    pub fn is_known_state(&self, name: &str) -> bool {
        name == FINISHED || self.states.contains_key(name)
    }

    /// Whether some transition is keyed on `action`.
    pub fn is_transition_event(&self, action: &str) -> bool {
        self.transitions.iter().any(|t| t.action == action)
    }

    /// Validate references between parts of the document.
    ///
    /// Shape validity is assumed; this only checks that names used in one
    /// place are defined in another.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_known_state(&self.initial_state) {
            return Err(ConfigError::UnknownInitialState(
                self.initial_state.clone(),
            ));
        }

        for (index, transition) in self.transitions.iter().enumerate() {
            for state in [&transition.from, &transition.to] {
                if !self.is_known_state(state) {
                    return Err(ConfigError::UnknownTransitionState {
                        index,
                        state: state.clone(),
                    });
                }
            }
        }

        for (name, state) in &self.states {
            for action in state.allowed_actions.iter().flatten() {
                if !self.player_actions.contains_key(action) && !self.is_transition_event(action) {
                    return Err(ConfigError::UnknownAllowedAction {
                        state: name.clone(),
                        action: action.clone(),
                    });
                }
            }
        }

        if let (Some(min), Some(max)) = (self.min_players, self.max_players)
            && min > max
        {
            return Err(ConfigError::PlayerBounds { min, max });
        }

        Ok(())
    }
}
