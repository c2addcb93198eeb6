/// Terminal state; reaching it ends the game.
pub const FINISHED: &str = "FINISHED";

/// Actor id used for actions issued by the engine itself.
pub const SERVER_ACTOR: &str = "server";

/// Event name of the per-action state broadcast.
pub const STATE_UPDATE_EVENT: &str = "gameStateUpdate";

/// Default binding name of the `forEachPlayer` loop variable.
pub const DEFAULT_LOOP_BINDING: &str = "player";

/// Maximum nesting of `runAction`/`forEachPlayer`.
pub const MAX_EFFECT_DEPTH: usize = 32;

/// Maximum `dispatchEvent` actions drained after one external action.
pub const MAX_QUEUED_EVENTS: usize = 64;
