//! The closed set of primitive effect operations.

use super::{effect::EffectList, errors::EffectError};
use crate::{
    expr::{Resolver, eval::number},
    game::{
        entities::Player,
        state::{GameState, lookup},
        timer::StateTimer,
    },
};
use enum_dispatch::enum_dispatch;
use log::debug;
use rand::{rngs::StdRng, seq::SliceRandom};
use serde_json::{Map, Value, json};
use std::{cmp::Ordering, collections::VecDeque, time::Duration};
use tokio::time::Instant;

/// The mutable parts of one game instance a primitive may touch.
#[derive(Debug)]
pub struct EffectTarget<'t> {
    pub state: &'t mut GameState,
    pub players: &'t [Player],
    pub timer: &'t mut StateTimer,
    /// Actions queued by `dispatchEvent`, drained by the dispatcher.
    pub events: &'t mut VecDeque<String>,
    pub rng: &'t mut StdRng,
    pub now: Instant,
}

impl EffectTarget<'_> {
    pub fn time_in_state(&self) -> Duration {
        self.timer.elapsed(self.now)
    }
}

#[enum_dispatch]
pub trait Apply {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError>;
}

/// A primitive call with its arguments already resolved.
#[enum_dispatch(Apply)]
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    SetProperty,
    UnsetProperty,
    IncrementProperty,
    ArrayPush,
    ArrayClear,
    ShuffleArray,
    ArraySortBy,
    CalculateWinner,
    RecordEvent,
    StartTimer,
    CancelTimer,
    DispatchEvent,
}

impl Primitive {
    /// Builds a primitive from its configured name and raw arguments,
    /// resolving every argument except `onExpireEffects`.
    pub fn from_call(
        function: &str,
        raw: &Map<String, Value>,
        resolver: &Resolver<'_>,
    ) -> Result<Self, EffectError> {
        let primitive = match function {
            "setProperty" => {
                let args = Args::new("setProperty", raw, resolver);
                SetProperty {
                    path: args.path()?,
                    value: args.required("value")?,
                }
                .into()
            }
            "unsetProperty" => {
                let args = Args::new("unsetProperty", raw, resolver);
                UnsetProperty { path: args.path()? }.into()
            }
            "incrementProperty" => {
                let args = Args::new("incrementProperty", raw, resolver);
                IncrementProperty {
                    path: args.path()?,
                    amount: args.number_or("amount", 1.0)?,
                }
                .into()
            }
            "arrayPush" => {
                let args = Args::new("arrayPush", raw, resolver);
                ArrayPush {
                    path: args.path()?,
                    value: args.required("value")?,
                }
                .into()
            }
            "arrayClear" => {
                let args = Args::new("arrayClear", raw, resolver);
                ArrayClear { path: args.path()? }.into()
            }
            "shuffleArray" => {
                let args = Args::new("shuffleArray", raw, resolver);
                ShuffleArray { path: args.path()? }.into()
            }
            "arraySortBy" => {
                let args = Args::new("arraySortBy", raw, resolver);
                ArraySortBy {
                    path: args.path()?,
                    key: args.string("key")?,
                    descending: args
                        .value("dir")
                        .is_some_and(|dir| dir.as_str().is_some_and(|d| d.eq_ignore_ascii_case("desc"))),
                }
                .into()
            }
            "calculateWinner" => CalculateWinner.into(),
            "recordEvent" => {
                let args = Args::new("recordEvent", raw, resolver);
                RecordEvent {
                    event_name: args.required("eventName")?,
                    path: args.path()?,
                }
                .into()
            }
            "startTimer" => {
                let args = Args::new("startTimer", raw, resolver);
                let seconds = args.number_or("durationSeconds", f64::NAN)?;
                if !seconds.is_finite() || seconds < 0.0 {
                    return Err(args.invalid("durationSeconds", "a non-negative number"));
                }
                let effects = args
                    .raw("onExpireEffects")
                    .ok_or(args.missing("onExpireEffects"))?;
                StartTimer {
                    duration: Duration::from_secs_f64(seconds),
                    effects: serde_json::from_value(effects.clone())
                        .map_err(|_| args.invalid("onExpireEffects", "an effect list"))?,
                    payload: resolver
                        .context()
                        .extras
                        .get("payload")
                        .cloned()
                        .unwrap_or(Value::Null),
                }
                .into()
            }
            "cancelTimer" => CancelTimer.into(),
            "dispatchEvent" => {
                let args = Args::new("dispatchEvent", raw, resolver);
                DispatchEvent {
                    action: args.string("actionName")?,
                }
                .into()
            }
            unknown => return Err(EffectError::UnknownFunction(unknown.to_string())),
        };
        Ok(primitive)
    }
}

/// Lazily resolved view of an effect's `args` object.
struct Args<'r> {
    function: &'static str,
    raw: &'r Map<String, Value>,
    resolver: &'r Resolver<'r>,
}

impl<'r> Args<'r> {
    fn new(function: &'static str, raw: &'r Map<String, Value>, resolver: &'r Resolver<'r>) -> Self {
        Self {
            function,
            raw,
            resolver,
        }
    }

    fn raw(&self, name: &str) -> Option<&'r Value> {
        self.raw.get(name)
    }

    fn value(&self, name: &str) -> Option<Value> {
        self.raw.get(name).map(|v| self.resolver.interpolate(v))
    }

    fn required(&self, name: &'static str) -> Result<Value, EffectError> {
        self.value(name).ok_or(self.missing(name))
    }

    fn string(&self, name: &'static str) -> Result<String, EffectError> {
        match self.required(name)? {
            Value::String(s) if !s.trim().is_empty() => Ok(s),
            _ => Err(self.invalid(name, "a non-empty string")),
        }
    }

    fn path(&self) -> Result<String, EffectError> {
        self.string("path")
    }

    fn number_or(&self, name: &'static str, default: f64) -> Result<f64, EffectError> {
        match self.value(name) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Number(n)) => n.as_f64().ok_or(self.invalid(name, "a number")),
            Some(Value::String(s)) => s.trim().parse().map_err(|_| self.invalid(name, "a number")),
            Some(_) => Err(self.invalid(name, "a number")),
        }
    }

    fn missing(&self, arg: &'static str) -> EffectError {
        EffectError::MissingArgument {
            function: self.function,
            arg,
        }
    }

    fn invalid(&self, arg: &'static str, expected: &'static str) -> EffectError {
        EffectError::InvalidArgument {
            function: self.function,
            arg,
            expected,
        }
    }
}

fn array_at<'s>(state: &'s mut GameState, path: &str) -> Result<&'s mut Vec<Value>, EffectError> {
    match state.get_mut(path) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(EffectError::NotAnArray {
            path: path.to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetProperty {
    pub path: String,
    pub value: Value,
}

impl Apply for SetProperty {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError> {
        target.state.set(&self.path, self.value.clone())?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnsetProperty {
    pub path: String,
}

impl Apply for UnsetProperty {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError> {
        if target.state.unset(&self.path)?.is_none() {
            debug!("unsetProperty: '{}' was not set", self.path);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncrementProperty {
    pub path: String,
    pub amount: f64,
}

impl Apply for IncrementProperty {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError> {
        let current = match target.state.get(&self.path) {
            None | Some(Value::Null) => 0.0,
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(_) => {
                return Err(EffectError::NotANumber {
                    path: self.path.clone(),
                });
            }
        };
        target.state.set(&self.path, number(current + self.amount))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayPush {
    pub path: String,
    pub value: Value,
}

impl Apply for ArrayPush {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError> {
        array_at(target.state, &self.path)?.push(self.value.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayClear {
    pub path: String,
}

impl Apply for ArrayClear {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError> {
        array_at(target.state, &self.path)?.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShuffleArray {
    pub path: String,
}

impl Apply for ShuffleArray {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError> {
        let items = array_at(target.state, &self.path)?;
        items.shuffle(target.rng);
        Ok(())
    }
}

/// Stable sort by a (possibly dotted) key of each element.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySortBy {
    pub path: String,
    pub key: String,
    pub descending: bool,
}

impl Apply for ArraySortBy {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError> {
        let items = array_at(target.state, &self.path)?;
        items.sort_by(|a, b| {
            let ordering = compare_keys(
                lookup(a, &self.key).unwrap_or(&Value::Null),
                lookup(b, &self.key).unwrap_or(&Value::Null),
            );
            if self.descending {
                ordering.reverse()
            } else {
                ordering
            }
        });
        Ok(())
    }
}

/// Numbers numerically, strings lexically; mixed kinds by kind so the order
/// is total.
fn compare_keys(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Ranks `playerAttributes[*].score` and writes `winner` and
/// `topThreePlayers`. Ties keep attribute order, so the first seen wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalculateWinner;

impl Apply for CalculateWinner {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError> {
        let mut ranking: Vec<(String, f64)> = match target.state.get("playerAttributes") {
            Some(Value::Object(attributes)) => attributes
                .iter()
                .map(|(id, attrs)| {
                    let score = attrs.get("score").and_then(Value::as_f64).unwrap_or(0.0);
                    (id.clone(), score)
                })
                .collect(),
            _ => Vec::new(),
        };
        ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let players = target.players;
        let entry = |(id, score): &(String, f64)| {
            let name = players
                .iter()
                .find(|p| p.id == *id)
                .map_or(Value::Null, |p| Value::String(p.name.clone()));
            json!({ "playerId": id, "name": name, "score": number(*score) })
        };

        let winner = ranking.first().map_or(Value::Null, entry);
        let top_three: Vec<Value> = ranking.iter().take(3).map(entry).collect();
        debug!("calculateWinner: {} ranked, winner {winner}", ranking.len());

        target.state.set("winner", winner)?;
        target.state.set("topThreePlayers", Value::Array(top_three))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordEvent {
    pub event_name: Value,
    pub path: String,
}

impl Apply for RecordEvent {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError> {
        let elapsed = u64::try_from(target.time_in_state().as_millis()).unwrap_or(u64::MAX);
        let record = json!({ "eventName": self.event_name, "eventTime": elapsed });
        target.state.set(&self.path, record)?;
        Ok(())
    }
}

/// Replaces any pending timer. The effects stay unresolved until expiry,
/// when they see the `payload` captured here.
#[derive(Debug, Clone, PartialEq)]
pub struct StartTimer {
    pub duration: Duration,
    pub effects: EffectList,
    pub payload: Value,
}

impl Apply for StartTimer {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError> {
        let id = target
            .timer
            .start(self.duration, self.effects.clone(), self.payload.clone(), target.now);
        debug!("Timer {id} started for {:?}", self.duration);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CancelTimer;

impl Apply for CancelTimer {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError> {
        if !target.timer.cancel() {
            debug!("cancelTimer: no timer pending");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchEvent {
    pub action: String,
}

impl Apply for DispatchEvent {
    fn apply(&self, target: &mut EffectTarget<'_>) -> Result<(), EffectError> {
        target.events.push_back(self.action.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{expr::EvalContext, game::config::GameConfig};
    use rand::SeedableRng;

    struct Fixture {
        state: GameState,
        players: Vec<Player>,
        timer: StateTimer,
        events: VecDeque<String>,
        rng: StdRng,
    }

    impl Fixture {
        fn new() -> Self {
            let config: GameConfig = serde_json::from_value(json!({
                "initialState": "LOBBY",
                "states": { "LOBBY": {} },
                "initialGameState": {
                    "round": 1,
                    "title": "quiz",
                    "deck": [1, 2, 3, 4, 5, 6, 7, 8],
                    "answers": [
                        { "who": "b", "at": 30 },
                        { "who": "a", "at": 10 },
                        { "who": "c", "at": 20 }
                    ]
                }
            }))
            .unwrap();
            Self {
                state: GameState::new(&config),
                players: vec![Player::new("p1", "Ann"), Player::new("p2", "Ben")],
                timer: StateTimer::new(Instant::now()),
                events: VecDeque::new(),
                rng: StdRng::seed_from_u64(7),
            }
        }

        fn apply(&mut self, primitive: impl Into<Primitive>) -> Result<(), EffectError> {
            let mut target = EffectTarget {
                state: &mut self.state,
                players: &self.players,
                timer: &mut self.timer,
                events: &mut self.events,
                rng: &mut self.rng,
                now: Instant::now(),
            };
            let primitive: Primitive = primitive.into();
            primitive.apply(&mut target)
        }

        fn build(&self, function: &str, args: Value) -> Result<Primitive, EffectError> {
            let extras = json!({ "actorId": "p1", "payload": { "points": 5 } })
                .as_object()
                .cloned()
                .unwrap();
            let data = Value::Null;
            let resolver = Resolver::new(EvalContext {
                game_state: self.state.as_value(),
                game_data: &data,
                players: &self.players,
                host_id: "host",
                time_in_state: Duration::ZERO,
                extras: &extras,
            });
            let raw = args.as_object().cloned().unwrap_or_default();
            Primitive::from_call(function, &raw, &resolver)
        }
    }

    #[test]
    fn test_from_call_resolves_arguments() {
        let fixture = Fixture::new();
        let primitive = fixture
            .build(
                "incrementProperty",
                json!({ "path": "playerAttributes.{{ actorId }}.score", "amount": "{{ payload.points }}" }),
            )
            .unwrap();
        assert_eq!(
            primitive,
            Primitive::from(IncrementProperty {
                path: "playerAttributes.p1.score".to_string(),
                amount: 5.0,
            })
        );
    }

    #[test]
    fn test_from_call_keeps_timer_effects_raw() {
        let fixture = Fixture::new();
        let primitive = fixture
            .build(
                "startTimer",
                json!({
                    "durationSeconds": 2.5,
                    "onExpireEffects": [{ "function": "setProperty", "args": { "path": "x", "value": "{{ gameState.round }}" } }]
                }),
            )
            .unwrap();
        let Primitive::StartTimer(timer) = primitive else {
            panic!("expected startTimer");
        };
        assert_eq!(timer.duration, Duration::from_millis(2500));
        assert_eq!(timer.payload, json!({ "points": 5 }));
        let serialized = serde_json::to_value(&timer.effects).unwrap();
        assert_eq!(serialized[0]["args"]["value"], json!("{{ gameState.round }}"));
    }

    #[test]
    fn test_from_call_errors() {
        let fixture = Fixture::new();
        assert_eq!(
            fixture.build("explode", json!({})),
            Err(EffectError::UnknownFunction("explode".to_string()))
        );
        assert!(matches!(
            fixture.build("setProperty", json!({ "path": "a" })),
            Err(EffectError::MissingArgument { arg: "value", .. })
        ));
        assert!(matches!(
            fixture.build("startTimer", json!({ "durationSeconds": -1, "onExpireEffects": [] })),
            Err(EffectError::InvalidArgument { arg: "durationSeconds", .. })
        ));
        assert!(matches!(
            fixture.build("incrementProperty", json!({ "path": "a", "amount": "lots" })),
            Err(EffectError::InvalidArgument { arg: "amount", .. })
        ));
    }

    #[test]
    fn test_increment() {
        let mut fixture = Fixture::new();
        fixture
            .apply(IncrementProperty { path: "round".to_string(), amount: 1.0 })
            .unwrap();
        assert_eq!(fixture.state.get("round"), Some(&json!(2)));
        fixture
            .apply(IncrementProperty { path: "round".to_string(), amount: -3.0 })
            .unwrap();
        assert_eq!(fixture.state.get("round"), Some(&json!(-1)));
        fixture
            .apply(IncrementProperty { path: "fresh.count".to_string(), amount: 0.5 })
            .unwrap();
        assert_eq!(fixture.state.get("fresh.count"), Some(&json!(0.5)));
        assert!(matches!(
            fixture.apply(IncrementProperty { path: "title".to_string(), amount: 1.0 }),
            Err(EffectError::NotANumber { .. })
        ));
    }

    #[test]
    fn test_array_ops_on_non_arrays_leave_value_alone() {
        let mut fixture = Fixture::new();
        let before = fixture.state.clone();
        for primitive in [
            Primitive::from(ArrayPush { path: "title".to_string(), value: json!(1) }),
            Primitive::from(ArrayClear { path: "title".to_string() }),
            Primitive::from(ShuffleArray { path: "round".to_string() }),
            Primitive::from(ArrayPush { path: "missing".to_string(), value: json!(1) }),
        ] {
            assert!(matches!(
                fixture.apply(primitive),
                Err(EffectError::NotAnArray { .. })
            ));
        }
        assert_eq!(fixture.state, before);
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut fixture = Fixture::new();
        fixture.apply(ShuffleArray { path: "deck".to_string() }).unwrap();
        let mut deck: Vec<i64> = fixture
            .state
            .get("deck")
            .and_then(Value::as_array)
            .unwrap()
            .iter()
            .filter_map(Value::as_i64)
            .collect();
        deck.sort_unstable();
        assert_eq!(deck, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_sort_by() {
        let mut fixture = Fixture::new();
        fixture
            .apply(ArraySortBy { path: "answers".to_string(), key: "at".to_string(), descending: false })
            .unwrap();
        let order = |state: &GameState| -> Vec<Value> {
            state.get("answers").and_then(Value::as_array).unwrap().iter().map(|a| a["who"].clone()).collect()
        };
        assert_eq!(order(&fixture.state), vec![json!("a"), json!("c"), json!("b")]);
        fixture
            .apply(ArraySortBy { path: "answers".to_string(), key: "who".to_string(), descending: true })
            .unwrap();
        assert_eq!(order(&fixture.state), vec![json!("c"), json!("b"), json!("a")]);
    }

    #[test]
    fn test_calculate_winner() {
        let mut fixture = Fixture::new();
        for (id, score) in [("p1", 150), ("p2", 200), ("p3", 100), ("p4", 175)] {
            fixture
                .state
                .set(&format!("playerAttributes.{id}.score"), json!(score))
                .unwrap();
        }
        fixture.apply(CalculateWinner).unwrap();
        assert_eq!(fixture.state.get("winner.playerId"), Some(&json!("p2")));
        assert_eq!(fixture.state.get("winner.name"), Some(&json!("Ben")));
        let top: Vec<&Value> = fixture
            .state
            .get("topThreePlayers")
            .and_then(Value::as_array)
            .unwrap()
            .iter()
            .map(|e| &e["playerId"])
            .collect();
        assert_eq!(top, vec![&json!("p2"), &json!("p4"), &json!("p1")]);
    }

    #[test]
    fn test_calculate_winner_ties_keep_first_seen() {
        let mut fixture = Fixture::new();
        for id in ["p3", "p1", "p2"] {
            fixture
                .state
                .set(&format!("playerAttributes.{id}.score"), json!(10))
                .unwrap();
        }
        fixture.apply(CalculateWinner).unwrap();
        assert_eq!(fixture.state.get("winner.playerId"), Some(&json!("p3")));
    }

    #[test]
    fn test_calculate_winner_without_players() {
        let mut fixture = Fixture::new();
        fixture.apply(CalculateWinner).unwrap();
        assert_eq!(fixture.state.get("winner"), Some(&Value::Null));
        assert_eq!(fixture.state.get("topThreePlayers"), Some(&json!([])));
    }

    #[test]
    fn test_timer_and_events() {
        let mut fixture = Fixture::new();
        fixture
            .apply(StartTimer {
                duration: Duration::from_secs(5),
                effects: EffectList::default(),
                payload: json!({ "round": 1 }),
            })
            .unwrap();
        assert_eq!(fixture.timer.pending().map(|t| &t.payload), Some(&json!({ "round": 1 })));
        fixture.apply(CancelTimer).unwrap();
        assert!(fixture.timer.pending().is_none());
        fixture.apply(CancelTimer).unwrap();

        fixture
            .apply(DispatchEvent { action: "timeUp".to_string() })
            .unwrap();
        assert_eq!(fixture.events.pop_front().as_deref(), Some("timeUp"));
    }

    #[test]
    fn test_record_event() {
        let mut fixture = Fixture::new();
        fixture
            .apply(RecordEvent { event_name: json!("buzz"), path: "log.last".to_string() })
            .unwrap();
        assert_eq!(fixture.state.get("log.last.eventName"), Some(&json!("buzz")));
        assert!(fixture.state.get("log.last.eventTime").is_some_and(Value::is_u64));
    }

    #[test]
    fn test_status_cannot_be_written() {
        let mut fixture = Fixture::new();
        assert!(matches!(
            fixture.apply(SetProperty { path: "status".to_string(), value: json!("FINISHED") }),
            Err(EffectError::State(_))
        ));
        assert_eq!(fixture.state.status(), "LOBBY");
    }
}
