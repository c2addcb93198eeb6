//! The state machine and action dispatcher of one game instance.

use super::{
    config::GameConfig,
    constants::{FINISHED, MAX_QUEUED_EVENTS, SERVER_ACTOR},
    entities::{ActionOutcome, Broadcast, EngineEvent, Player, PlayerAction, PlayerId, Projection, Role},
    errors::DispatchError,
    projector::Projector,
    state::GameState,
    timer::StateTimer,
};
use crate::{
    effects::{Effect, EffectRunner, EffectTarget},
    expr::{EvalContext, Resolver},
};
use log::{debug, info, warn};
use rand::{SeedableRng, rngs::StdRng};
use serde_json::{Map, Value};
use std::{collections::VecDeque, sync::Arc, time::Duration};
use tokio::time::Instant;

/// One running game.
///
/// Single owner, single threaded: every call runs to completion (effects,
/// transition, queued `dispatchEvent`s, broadcast) before it returns. The
/// engine never sleeps; its owner polls [`Self::timer_deadline`] and calls
/// [`Self::fire_due_timer`] once it has passed.
#[derive(Debug)]
pub struct GameEngine {
    id: String,
    config: Arc<GameConfig>,
    state: GameState,
    players: Vec<Player>,
    host_id: PlayerId,
    timer: StateTimer,
    /// Actions queued by `dispatchEvent`.
    queue: VecDeque<String>,
    events: VecDeque<EngineEvent>,
    rng: StdRng,
    started: bool,
    ended: bool,
}

impl GameEngine {
    pub fn new(id: impl Into<String>, config: Arc<GameConfig>, host_id: impl Into<PlayerId>) -> Self {
        let state = GameState::new(&config);
        Self {
            id: id.into(),
            config,
            state,
            players: Vec::new(),
            host_id: host_id.into(),
            timer: StateTimer::new(Instant::now()),
            queue: VecDeque::new(),
            events: VecDeque::new(),
            rng: StdRng::from_os_rng(),
            started: false,
            ended: false,
        }
    }

    /// Makes `shuffleArray` reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn status(&self) -> &str {
        self.state.status()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.ended
    }

    pub fn time_in_state(&self) -> Duration {
        self.timer.elapsed(Instant::now())
    }

    /// When the pending timer is due, if there is one.
    pub fn timer_deadline(&self) -> Option<Instant> {
        if self.ended {
            return None;
        }
        self.timer.deadline()
    }

    /// Adds a player to the roster, or refreshes their record if already
    /// present. Attributes are seeded from `initialPlayerAttributes` unless
    /// the player already has some.
    pub fn add_player(&mut self, player: Player) -> bool {
        self.state
            .seed_player(&player.id, &self.config.initial_player_attributes);
        match self.players.iter_mut().find(|p| p.id == player.id) {
            Some(existing) => {
                *existing = player;
                false
            }
            None => {
                debug!("Game {}: player {} joined", self.id, player.id);
                self.players.push(player);
                true
            }
        }
    }

    /// Drops a player from the roster. Their attributes stay so a rejoin
    /// picks up where they left off.
    pub fn remove_player(&mut self, player_id: &str) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == player_id)?;
        debug!("Game {}: player {player_id} left", self.id);
        Some(self.players.remove(index))
    }

    /// Enters the initial state, running its `onEnter` effects, and
    /// broadcasts.
    pub fn start(&mut self) -> Result<(), DispatchError> {
        if self.started {
            return Err(DispatchError::AlreadyStarted);
        }
        if let Some(required) = self.config.min_players
            && self.players.len() < required
        {
            return Err(DispatchError::NotEnoughPlayers {
                required,
                actual: self.players.len(),
            });
        }

        self.started = true;
        let initial = self.config.initial_state.clone();
        info!("Game {} starting in {initial}", self.id);
        self.enter_state(&initial, &server_extras());
        self.finish_step(true);
        self.drain_queue();
        Ok(())
    }

    pub fn handle_player_action(
        &mut self,
        player_id: &str,
        action: PlayerAction,
    ) -> Result<ActionOutcome, DispatchError> {
        self.handle_action(player_id, &action.kind, action.payload)
    }

    /// Dispatches one action, then any actions it queued via
    /// `dispatchEvent`. Rejections are logged and leave the state as it was.
    pub fn handle_action(
        &mut self,
        actor_id: &str,
        action: &str,
        payload: Value,
    ) -> Result<ActionOutcome, DispatchError> {
        let outcome = self.process(actor_id, action, payload);
        if let Err(e) = &outcome {
            match e {
                DispatchError::GameFinished => debug!("Game {}: ignoring '{action}', game is over", self.id),
                other => warn!("Game {}: rejected '{action}' from {actor_id}: {other}", self.id),
            }
        }
        self.drain_queue();
        outcome
    }

    /// Runs the pending timer's effects if it is due. Returns whether it
    /// fired.
    pub fn fire_due_timer(&mut self) -> bool {
        if !self.started || self.ended {
            return false;
        }
        let Some(timer) = self.timer.take_due(Instant::now()) else {
            return false;
        };
        debug!("Game {}: timer {} fired", self.id, timer.id);
        let mut extras = server_extras();
        extras.insert("payload".to_string(), timer.payload);
        self.run_effects(&timer.effects, &extras);
        self.finish_step(true);
        self.drain_queue();
        true
    }

    /// The UI of the current state as seen by the host and by each player.
    pub fn projection(&self) -> Projection {
        let extras = Map::new();
        let views = self
            .config
            .states
            .get(self.state.status())
            .map(|state| &state.ui);
        Projector::new(self.context(&extras)).project(views)
    }

    /// Queues a broadcast of the current projection.
    pub fn broadcast_now(&mut self) {
        let broadcast = Broadcast::state_update(self.state.status(), self.projection());
        self.events.push_back(EngineEvent::StateChanged(broadcast));
    }

    pub fn drain_events(&mut self) -> VecDeque<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    fn process(&mut self, actor_id: &str, action: &str, payload: Value) -> Result<ActionOutcome, DispatchError> {
        if !self.started {
            return Err(DispatchError::GameNotStarted);
        }
        if self.ended || self.state.status() == FINISHED {
            return Err(DispatchError::GameFinished);
        }

        let config = Arc::clone(&self.config);
        let role = Role::of(actor_id, &self.host_id);
        let definition = config.player_actions.get(action);
        match definition {
            Some(definition) if !definition.permits(role) => {
                return Err(DispatchError::NotPermitted {
                    action: action.to_string(),
                    role,
                });
            }
            Some(_) => {}
            // Referenced only by transitions: an engine-internal event.
            None if config.is_transition_event(action) => {
                if role != Role::Server {
                    return Err(DispatchError::NotPermitted {
                        action: action.to_string(),
                        role,
                    });
                }
            }
            None => return Err(DispatchError::UnknownAction(action.to_string())),
        }

        let status = self.state.status().to_string();
        if let Some(allowed) = config
            .states
            .get(&status)
            .and_then(|state| state.allowed_actions.as_ref())
            && !allowed.iter().any(|a| a == action)
        {
            return Err(DispatchError::NotAllowedInState {
                action: action.to_string(),
                state: status,
            });
        }

        let mut extras = Map::new();
        extras.insert("actorId".to_string(), Value::String(actor_id.to_string()));
        extras.insert("payload".to_string(), payload);

        debug!("Game {}: {actor_id} performs '{action}' in {status}", self.id);
        let applied = match definition {
            Some(definition) => self.run_effects(&definition.effects, &extras),
            None => 0,
        };

        let target = config
            .transitions
            .iter()
            .filter(|t| t.from == status && t.action == action)
            .find(|t| {
                t.condition
                    .as_ref()
                    .is_none_or(|condition| Resolver::new(self.context(&extras)).test(condition))
            })
            .map(|t| t.to.clone());

        let transitioned_to = match target {
            Some(to) if config.is_known_state(&to) => {
                info!("Game {}: {status} -> {to} on '{action}'", self.id);
                self.enter_state(&to, &extras);
                Some(to)
            }
            Some(to) => {
                warn!("Game {}: transition on '{action}' targets unknown state '{to}'", self.id);
                None
            }
            None => None,
        };

        let broadcast = applied > 0 || transitioned_to.is_some();
        self.finish_step(broadcast);
        Ok(ActionOutcome {
            transitioned_to,
            broadcast,
        })
    }

    /// Cancels the previous state's timer before anything of the new state
    /// runs.
    fn enter_state(&mut self, name: &str, extras: &Map<String, Value>) {
        self.timer.on_state_enter(Instant::now());
        self.state.set_status(name);

        let config = Arc::clone(&self.config);
        if let Some(state) = config.states.get(name) {
            self.run_effects(&state.on_enter, extras);
        }
    }

    /// Broadcasts if something changed and signals the end of the game the
    /// first time `FINISHED` is reached.
    fn finish_step(&mut self, broadcast: bool) {
        if broadcast {
            self.broadcast_now();
        }
        if self.state.status() == FINISHED && !self.ended {
            self.ended = true;
            self.timer.cancel();
            self.queue.clear();
            info!("Game {} finished", self.id);
            self.events.push_back(EngineEvent::GameEnded {
                final_state: self.state.as_value().clone(),
            });
        }
    }

    fn drain_queue(&mut self) {
        let mut processed = 0;
        while let Some(action) = self.queue.pop_front() {
            if processed == MAX_QUEUED_EVENTS {
                warn!(
                    "Game {}: more than {MAX_QUEUED_EVENTS} queued events, dropping {}",
                    self.id,
                    self.queue.len() + 1
                );
                self.queue.clear();
                break;
            }
            processed += 1;
            if let Err(e) = self.process(SERVER_ACTOR, &action, Value::Null) {
                warn!("Game {}: queued event '{action}' rejected: {e}", self.id);
            }
        }
    }

    fn run_effects(&mut self, effects: &[Effect], extras: &Map<String, Value>) -> usize {
        let mut runner = EffectRunner::new(
            &self.config,
            &self.host_id,
            EffectTarget {
                state: &mut self.state,
                players: &self.players,
                timer: &mut self.timer,
                events: &mut self.queue,
                rng: &mut self.rng,
                now: Instant::now(),
            },
        );
        runner.run(effects, extras)
    }

    fn context<'s>(&'s self, extras: &'s Map<String, Value>) -> EvalContext<'s> {
        EvalContext {
            game_state: self.state.as_value(),
            game_data: &self.config.game_data,
            players: &self.players,
            host_id: &self.host_id,
            time_in_state: self.time_in_state(),
            extras,
        }
    }
}

fn server_extras() -> Map<String, Value> {
    let mut extras = Map::new();
    extras.insert("actorId".to_string(), Value::String(SERVER_ACTOR.to_string()));
    extras
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Arc<GameConfig> {
        Arc::new(
            GameConfig::from_value(json!({
                "initialState": "LOBBY",
                "states": {
                    "LOBBY": { "ui": { "host": { "title": "Waiting ({{ players.length }})" } } },
                    "QUESTION": {
                        "onEnter": [
                            { "function": "setProperty", "args": { "path": "answers", "value": [] } },
                            { "function": "startTimer", "args": {
                                "durationSeconds": 10,
                                "onExpireEffects": { "function": "dispatchEvent", "args": { "actionName": "timeUp" } }
                            } }
                        ],
                        "allowedActions": ["answer", "timeUp"],
                        "ui": {
                            "host": { "answers": "{{ gameState.answers.length }}" },
                            "player": { "score": "{{ player.score }}" }
                        }
                    },
                    "REVEAL": {
                        "ui": { "host": { "correct": "{{ gameState.correct }}" } }
                    },
                    "FINISHED": {
                        "onEnter": { "function": "calculateWinner" }
                    }
                },
                "playerActions": {
                    "startGame": { "permissions": ["host"] },
                    "answer": {
                        "permissions": ["player"],
                        "effects": [
                            { "function": "arrayPush", "args": { "path": "answers", "value": "{{ actorId }}" } },
                            { "function": "incrementProperty", "args": {
                                "path": "playerAttributes.{{ actorId }}.score",
                                "amount": "{{ payload.points }}"
                            } }
                        ]
                    },
                    "next": { "permissions": ["host"] },
                    "ping": { "permissions": ["host", "player"] }
                },
                "transitions": [
                    { "from": "LOBBY", "action": "startGame", "to": "QUESTION" },
                    { "from": "QUESTION", "action": "answer", "condition": "{{ gameState.answers.length >= players.length }}", "to": "REVEAL" },
                    { "from": "QUESTION", "action": "timeUp", "to": "REVEAL" },
                    { "from": "REVEAL", "action": "next", "to": "FINISHED" }
                ],
                "initialGameState": { "answers": [] },
                "initialPlayerAttributes": { "score": 0 }
            }))
            .unwrap(),
        )
    }

    fn engine() -> GameEngine {
        let mut engine = GameEngine::new("game-1", config(), "host").with_seed(3);
        engine.add_player(Player::new("p1", "Ann"));
        engine.add_player(Player::new("p2", "Ben"));
        engine
    }

    fn answer(engine: &mut GameEngine, who: &str, points: i64) -> Result<ActionOutcome, DispatchError> {
        engine.handle_player_action(who, PlayerAction::new("answer", json!({ "points": points })))
    }

    #[test]
    fn test_actions_before_start_are_rejected() {
        let mut engine = engine();
        assert_eq!(
            engine.handle_action("host", "startGame", Value::Null),
            Err(DispatchError::GameNotStarted)
        );
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_start_enters_initial_state_and_broadcasts() {
        let mut engine = engine();
        engine.start().unwrap();
        assert_eq!(engine.status(), "LOBBY");
        assert_eq!(engine.start(), Err(DispatchError::AlreadyStarted));

        let events = engine.drain_events();
        assert_eq!(events.len(), 1);
        let EngineEvent::StateChanged(broadcast) = &events[0] else {
            panic!("expected a broadcast");
        };
        assert_eq!(broadcast.projection.host_view, json!({ "title": "Waiting (2)" }));
    }

    #[test]
    fn test_min_players() {
        let mut doc = serde_json::to_value(config().as_ref()).unwrap();
        doc["minPlayers"] = json!(3);
        let mut engine = GameEngine::new("g", Arc::new(GameConfig::from_value(doc).unwrap()), "host");
        engine.add_player(Player::new("p1", "Ann"));
        assert_eq!(
            engine.start(),
            Err(DispatchError::NotEnoughPlayers { required: 3, actual: 1 })
        );
        assert!(!engine.is_started());
    }

    #[test]
    fn test_permissions() {
        let mut engine = engine();
        engine.start().unwrap();
        engine.drain_events();

        assert_eq!(
            engine.handle_action("p1", "startGame", Value::Null),
            Err(DispatchError::NotPermitted { action: "startGame".to_string(), role: Role::Player })
        );
        assert_eq!(
            engine.handle_action("p1", "timeUp", Value::Null),
            Err(DispatchError::NotPermitted { action: "timeUp".to_string(), role: Role::Player })
        );
        assert_eq!(
            engine.handle_action("host", "dance", Value::Null),
            Err(DispatchError::UnknownAction("dance".to_string()))
        );
        assert_eq!(engine.status(), "LOBBY");
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_action_without_effect_or_transition_is_not_broadcast() {
        let mut engine = engine();
        engine.start().unwrap();
        engine.drain_events();
        let outcome = engine.handle_action("p1", "ping", Value::Null).unwrap();
        assert_eq!(outcome, ActionOutcome::default());
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_allowed_actions() {
        let mut engine = engine();
        engine.start().unwrap();
        engine.handle_action("host", "startGame", Value::Null).unwrap();
        assert_eq!(
            engine.handle_action("p1", "ping", Value::Null),
            Err(DispatchError::NotAllowedInState { action: "ping".to_string(), state: "QUESTION".to_string() })
        );
    }

    #[test]
    fn test_conditional_transition_after_all_answers() {
        let mut engine = engine();
        engine.start().unwrap();
        let outcome = engine.handle_action("host", "startGame", Value::Null).unwrap();
        assert_eq!(outcome.transitioned_to.as_deref(), Some("QUESTION"));
        assert!(engine.timer_deadline().is_some());
        engine.drain_events();

        let first = answer(&mut engine, "p1", 100).unwrap();
        assert_eq!(first, ActionOutcome { transitioned_to: None, broadcast: true });
        assert_eq!(engine.status(), "QUESTION");

        let second = answer(&mut engine, "p2", 50).unwrap();
        assert_eq!(second.transitioned_to.as_deref(), Some("REVEAL"));
        assert!(engine.timer_deadline().is_none());
        assert_eq!(engine.state().get("playerAttributes.p1.score"), Some(&json!(100)));
        assert_eq!(engine.state().get("answers"), Some(&json!(["p1", "p2"])));

        // one broadcast per handled action
        assert_eq!(engine.drain_events().len(), 2);
    }

    #[test]
    fn test_player_projection() {
        let mut engine = engine();
        engine.start().unwrap();
        engine.handle_action("host", "startGame", Value::Null).unwrap();
        answer(&mut engine, "p1", 30).unwrap();
        let projection = engine.projection();
        assert_eq!(projection.host_view, json!({ "answers": 1 }));
        assert_eq!(projection.player_view("p1"), Some(&json!({ "score": 30 })));
        assert_eq!(projection.player_view("p2"), Some(&json!({ "score": 0 })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_dispatches_event() {
        let mut engine = engine();
        engine.start().unwrap();
        engine.handle_action("host", "startGame", Value::Null).unwrap();
        engine.drain_events();

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!engine.fire_due_timer());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(engine.fire_due_timer());
        assert_eq!(engine.status(), "REVEAL");
        assert!(!engine.fire_due_timer());

        let events = engine.drain_events();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_finished_is_terminal() {
        let mut engine = engine();
        engine.start().unwrap();
        engine.handle_action("host", "startGame", Value::Null).unwrap();
        answer(&mut engine, "p1", 100).unwrap();
        answer(&mut engine, "p2", 200).unwrap();
        engine.handle_action("host", "next", Value::Null).unwrap();
        assert_eq!(engine.status(), FINISHED);
        assert!(engine.is_finished());
        assert_eq!(engine.state().get("winner.playerId"), Some(&json!("p2")));

        let events = engine.drain_events();
        let ended: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::GameEnded { .. }))
            .collect();
        assert_eq!(ended.len(), 1);
        assert!(matches!(events.back(), Some(EngineEvent::GameEnded { .. })));

        let before = engine.state().clone();
        for (actor, action) in [("host", "next"), ("p1", "answer"), ("server", "timeUp"), ("host", "startGame")] {
            assert_eq!(
                engine.handle_action(actor, action, json!({ "points": 5 })),
                Err(DispatchError::GameFinished)
            );
        }
        assert_eq!(engine.state(), &before);
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn test_roster() {
        let mut engine = engine();
        assert!(!engine.add_player(Player::new("p1", "Annie")));
        assert_eq!(engine.players()[0].name, "Annie");
        engine.start().unwrap();
        engine.handle_action("host", "startGame", Value::Null).unwrap();
        answer(&mut engine, "p2", 40).unwrap();

        let removed = engine.remove_player("p2").unwrap();
        assert_eq!(removed.id, "p2");
        assert!(engine.remove_player("p2").is_none());
        assert_eq!(engine.state().get("playerAttributes.p2.score"), Some(&json!(40)));

        engine.add_player(Player::new("p2", "Ben"));
        assert_eq!(engine.state().get("playerAttributes.p2.score"), Some(&json!(40)));
    }
}
