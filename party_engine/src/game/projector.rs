//! Per-viewer UI projection.

use super::{
    config::ViewTemplates,
    constants::DEFAULT_LOOP_BINDING,
    entities::{Player, Projection},
};
use crate::expr::{EvalContext, Resolver};
use serde_json::{Map, Value};

/// Interpolates the current state's UI templates for the host and every
/// player.
///
/// Nothing is redacted here: a view can only show what its template
/// references.
#[derive(Debug, Clone, Copy)]
pub struct Projector<'a> {
    context: EvalContext<'a>,
}

impl<'a> Projector<'a> {
    pub fn new(context: EvalContext<'a>) -> Self {
        Self { context }
    }

    pub fn project(&self, views: Option<&ViewTemplates>) -> Projection {
        let Some(views) = views else {
            return Projection {
                host_view: Value::Null,
                player_views: self
                    .context
                    .players
                    .iter()
                    .map(|p| (p.id.clone(), Value::Null))
                    .collect(),
            };
        };

        let host_view = Resolver::new(self.context).interpolate(&views.host);
        let player_views = self
            .context
            .players
            .iter()
            .map(|player| (player.id.clone(), self.player_view(&views.player, player)))
            .collect();

        Projection {
            host_view,
            player_views,
        }
    }

    fn player_view(&self, template: &Value, player: &Player) -> Value {
        let attributes = self
            .context
            .game_state
            .get("playerAttributes")
            .and_then(|all| all.get(&player.id));
        let mut extras: Map<String, Value> = self.context.extras.clone();
        extras.insert(DEFAULT_LOOP_BINDING.to_string(), player.merged_with(attributes));
        Resolver::new(self.context.with_extras(&extras)).interpolate(template)
    }
}
