//! Effect documents as they appear in a game configuration.

use crate::game::constants::DEFAULT_LOOP_BINDING;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Deref;

/// One configured instruction.
///
/// Shapes are tried in declaration order, so an object carrying both
/// `runAction` and `function` is an indirection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Effect {
    RunAction {
        /// Name of a reusable action; may itself be a template.
        #[serde(rename = "runAction")]
        run_action: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Value>,
    },
    ForEachPlayer {
        #[serde(rename = "forEachPlayer")]
        for_each_player: ForEachPlayer,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Value>,
    },
    Call {
        function: String,
        #[serde(default)]
        args: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<Value>,
    },
}

impl Effect {
    pub fn condition(&self) -> Option<&Value> {
        match self {
            Effect::RunAction { condition, .. }
            | Effect::ForEachPlayer { condition, .. }
            | Effect::Call { condition, .. } => condition.as_ref(),
        }
    }

    /// Short label for log lines.
    pub fn label(&self) -> String {
        match self {
            Effect::RunAction { run_action, .. } => format!("runAction {run_action}"),
            Effect::ForEachPlayer { .. } => "forEachPlayer".to_string(),
            Effect::Call { function, .. } => function.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEachPlayer {
    #[serde(default)]
    pub effects: EffectList,

    /// Name the current player is bound to inside `effects`.
    #[serde(rename = "as", default = "default_binding")]
    pub binding: String,
}

fn default_binding() -> String {
    DEFAULT_LOOP_BINDING.to_string()
}

/// An ordered list of effects. Accepts a bare effect wherever a list is
/// expected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct EffectList(Vec<Effect>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Effect>),
    One(Box<Effect>),
    Nothing(()),
}

impl From<OneOrMany> for EffectList {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::Many(effects) => Self(effects),
            OneOrMany::One(effect) => Self(vec![*effect]),
            OneOrMany::Nothing(()) => Self::default(),
        }
    }
}

impl From<Vec<Effect>> for EffectList {
    fn from(effects: Vec<Effect>) -> Self {
        Self(effects)
    }
}

impl Deref for EffectList {
    type Target = [Effect];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
