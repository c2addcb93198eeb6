//! Runs effect lists against one game instance.

use super::{
    effect::{Effect, ForEachPlayer},
    primitives::{Apply, EffectTarget, Primitive},
};
use crate::{
    expr::{EvalContext, Resolver},
    game::{config::GameConfig, constants::MAX_EFFECT_DEPTH},
};
use log::{debug, warn};
use serde_json::{Map, Value};

/// Executes effects with a borrowed view of the engine.
///
/// Every failure is local to the effect that caused it: it is logged and
/// the remaining effects still run.
#[derive(Debug)]
pub struct EffectRunner<'e> {
    config: &'e GameConfig,
    host_id: &'e str,
    target: EffectTarget<'e>,
}

impl<'e> EffectRunner<'e> {
    pub fn new(config: &'e GameConfig, host_id: &'e str, target: EffectTarget<'e>) -> Self {
        Self {
            config,
            host_id,
            target,
        }
    }

    /// Runs `effects` in order with `extras` as the per-invocation bindings.
    /// Returns how many effects were applied.
    pub fn run(&mut self, effects: &[Effect], extras: &Map<String, Value>) -> usize {
        self.run_at_depth(effects, extras, 0)
    }

    fn run_at_depth(&mut self, effects: &[Effect], extras: &Map<String, Value>, depth: usize) -> usize {
        effects
            .iter()
            .filter(|effect| self.run_one(effect, extras, depth))
            .count()
    }

    fn run_one(&mut self, effect: &Effect, extras: &Map<String, Value>, depth: usize) -> bool {
        if let Some(condition) = effect.condition()
            && !self.resolver(extras).test(condition)
        {
            debug!("Skipping {}: condition {condition} is false", effect.label());
            return false;
        }

        match effect {
            Effect::RunAction { run_action, .. } => self.run_action(run_action, extras, depth),
            Effect::ForEachPlayer {
                for_each_player, ..
            } => self.for_each_player(for_each_player, extras, depth),
            Effect::Call { function, args, .. } => {
                let primitive = Primitive::from_call(function, args, &self.resolver(extras));
                match primitive.and_then(|primitive| primitive.apply(&mut self.target)) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Effect {function} skipped: {e}");
                        false
                    }
                }
            }
        }
    }

    fn run_action(&mut self, name: &Value, extras: &Map<String, Value>, depth: usize) -> bool {
        let config = self.config;
        let resolved = self.resolver(extras).resolve(name);
        let Some(name) = resolved.as_str() else {
            warn!("runAction name {name} did not resolve to a string");
            return false;
        };
        let Some(effects) = config.actions.get(name) else {
            warn!("runAction: unknown action '{name}'");
            return false;
        };
        if depth >= MAX_EFFECT_DEPTH {
            warn!("runAction '{name}' exceeds nesting depth {MAX_EFFECT_DEPTH}, skipped");
            return false;
        }
        self.run_at_depth(effects, extras, depth + 1);
        true
    }

    /// Each iteration gets its own copy of `extras` with the loop binding,
    /// built from the player's attributes as they are at that moment.
    fn for_each_player(&mut self, each: &ForEachPlayer, extras: &Map<String, Value>, depth: usize) -> bool {
        if depth >= MAX_EFFECT_DEPTH {
            warn!("forEachPlayer exceeds nesting depth {MAX_EFFECT_DEPTH}, skipped");
            return false;
        }
        let players = self.target.players;
        for player in players {
            let mut scoped = extras.clone();
            let attributes = self.target.state.player_attributes(&player.id);
            scoped.insert(each.binding.clone(), player.merged_with(attributes));
            self.run_at_depth(&each.effects, &scoped, depth + 1);
        }
        true
    }

    fn resolver<'s>(&'s self, extras: &'s Map<String, Value>) -> Resolver<'s> {
        Resolver::new(EvalContext {
            game_state: self.target.state.as_value(),
            game_data: &self.config.game_data,
            players: self.target.players,
            host_id: self.host_id,
            time_in_state: self.target.time_in_state(),
            extras,
        })
    }
}
