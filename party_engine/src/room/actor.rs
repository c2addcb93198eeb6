//! Room actor: one task per room driving one game engine.

use super::{
    config::RoomConfig,
    errors::RoomError,
    messages::{RoomEvent, RoomMessage, RoomResponse, RoomSnapshot},
};
use crate::game::{
    config::GameConfig,
    entities::{EngineEvent, Player, PlayerAction, PlayerId},
    machine::GameEngine,
};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};
use tokio::{
    sync::{mpsc, oneshot},
    time::{Instant, sleep_until},
};

/// Called once per room, the moment its game reaches `FINISHED`.
pub type GameEndHook = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Room handle for sending messages
#[derive(Debug, Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomMessage>,
    code: String,
}

impl RoomHandle {
    pub fn new(sender: mpsc::Sender<RoomMessage>, code: String) -> Self {
        Self { sender, code }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Send a message to the room
    pub async fn send(&self, message: RoomMessage) -> Result<(), RoomError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| RoomError::Closed)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomMessage,
    ) -> Result<T, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(build(tx)).await?;
        rx.await.map_err(|_| RoomError::NoResponse)
    }

    pub async fn join(&self, player: Player) -> Result<RoomResponse, RoomError> {
        self.request(|response| RoomMessage::Join { player, response })
            .await
    }

    pub async fn leave(&self, player_id: impl Into<PlayerId>) -> Result<RoomResponse, RoomError> {
        let player_id = player_id.into();
        self.request(|response| RoomMessage::Leave {
            player_id,
            response,
        })
        .await
    }

    pub async fn start(&self) -> Result<RoomResponse, RoomError> {
        self.request(|response| RoomMessage::Start { response }).await
    }

    pub async fn action(
        &self,
        player_id: impl Into<PlayerId>,
        action: PlayerAction,
    ) -> Result<RoomResponse, RoomError> {
        let player_id = player_id.into();
        self.request(|response| RoomMessage::Action {
            player_id,
            action,
            response,
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|response| RoomMessage::GetSnapshot { response })
            .await
    }

    pub async fn subscribe(
        &self,
        subscriber_id: impl Into<String>,
        sender: mpsc::Sender<RoomEvent>,
    ) -> Result<(), RoomError> {
        self.send(RoomMessage::Subscribe {
            subscriber_id: subscriber_id.into(),
            sender,
        })
        .await
    }

    pub async fn unsubscribe(&self, subscriber_id: impl Into<String>) -> Result<(), RoomError> {
        self.send(RoomMessage::Unsubscribe {
            subscriber_id: subscriber_id.into(),
        })
        .await
    }

    pub async fn close(&self) -> Result<RoomResponse, RoomError> {
        self.request(|response| RoomMessage::Close { response }).await
    }
}

/// Room actor owning a single game
pub struct RoomActor {
    code: String,

    config: RoomConfig,

    engine: GameEngine,

    /// Message inbox
    inbox: mpsc::Receiver<RoomMessage>,

    /// Subscribers for room events
    subscribers: HashMap<String, mpsc::Sender<RoomEvent>>,

    on_game_end: Option<GameEndHook>,

    end_notified: bool,

    is_closed: bool,
}

impl RoomActor {
    /// Create a new room actor and the handle to reach it
    pub fn new(
        code: String,
        game: Arc<GameConfig>,
        host_id: PlayerId,
        config: RoomConfig,
        on_game_end: Option<GameEndHook>,
    ) -> (Self, RoomHandle) {
        let (sender, inbox) = mpsc::channel(config.inbox_capacity);

        let mut engine = GameEngine::new(code.clone(), game, host_id);
        if let Some(seed) = config.rng_seed {
            engine = engine.with_seed(seed);
        }

        let actor = Self {
            code: code.clone(),
            config,
            engine,
            inbox,
            subscribers: HashMap::new(),
            on_game_end,
            end_notified: false,
            is_closed: false,
        };

        (actor, RoomHandle::new(sender, code))
    }

    /// Run the room event loop until closed or every handle is dropped
    pub async fn run(mut self) {
        log::info!("Room {} starting", self.code);

        loop {
            let deadline = self.engine.timer_deadline();

            tokio::select! {
                // Messages first: a cancelling action that arrives together
                // with the deadline wins.
                biased;

                message = self.inbox.recv() => {
                    let Some(message) = message else {
                        break;
                    };
                    self.handle_message(message);
                    if self.is_closed {
                        break;
                    }
                }

                () = wait_until(deadline) => {
                    self.engine.fire_due_timer();
                    self.flush_events();
                }
            }
        }

        log::info!("Room {} closed", self.code);
    }

    fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Join { player, response } => {
                let result = self.handle_join(player);
                let _ = response.send(result);
            }

            RoomMessage::Leave {
                player_id,
                response,
            } => {
                let result = self.handle_leave(&player_id);
                let _ = response.send(result);
            }

            RoomMessage::Start { response } => {
                let result = match self.engine.start() {
                    Ok(()) => RoomResponse::Success,
                    Err(e) => {
                        log::warn!("Room {}: cannot start: {}", self.code, e);
                        e.into()
                    }
                };
                let _ = response.send(result);
            }

            RoomMessage::Action {
                player_id,
                action,
                response,
            } => {
                let result = match self.engine.handle_player_action(&player_id, action) {
                    Ok(outcome) => match outcome.transitioned_to {
                        Some(state) => RoomResponse::Transitioned(state),
                        None => RoomResponse::Success,
                    },
                    Err(e) => e.into(),
                };
                let _ = response.send(result);
            }

            RoomMessage::GetSnapshot { response } => {
                let _ = response.send(self.snapshot());
            }

            RoomMessage::Subscribe {
                subscriber_id,
                sender,
            } => {
                log::debug!("{} subscribed to room {}", subscriber_id, self.code);
                self.subscribers.insert(subscriber_id, sender);
            }

            RoomMessage::Unsubscribe { subscriber_id } => {
                self.subscribers.remove(&subscriber_id);
                log::debug!("{} unsubscribed from room {}", subscriber_id, self.code);
            }

            RoomMessage::Close { response } => {
                self.is_closed = true;
                let _ = response.send(RoomResponse::Success);
            }
        }

        self.flush_events();
    }

    fn handle_join(&mut self, player: Player) -> RoomResponse {
        let known = self.engine.players().iter().any(|p| p.id == player.id);
        let limit = self
            .config
            .effective_max_players(self.engine.config().max_players);
        if !known && self.engine.players().len() >= limit {
            return RoomResponse::RoomFull;
        }

        log::info!("Room {}: {} ({}) joined", self.code, player.name, player.id);
        self.engine.add_player(player);
        if self.engine.is_started() && !self.engine.is_finished() {
            self.engine.broadcast_now();
        }
        RoomResponse::Success
    }

    fn handle_leave(&mut self, player_id: &str) -> RoomResponse {
        if self.engine.remove_player(player_id).is_none() {
            return RoomResponse::NotInRoom;
        }

        log::info!("Room {}: {} left", self.code, player_id);
        if self.engine.is_started() && !self.engine.is_finished() {
            self.engine.broadcast_now();
        }
        RoomResponse::Success
    }

    fn snapshot(&self) -> RoomSnapshot {
        let now = Instant::now();
        RoomSnapshot {
            code: self.code.clone(),
            game_name: self.engine.config().name.clone(),
            status: self.engine.status().to_string(),
            host_id: self.engine.host_id().to_string(),
            players: self.engine.players().to_vec(),
            started: self.engine.is_started(),
            finished: self.engine.is_finished(),
            timer_remaining_ms: self.engine.timer_deadline().map(|deadline| {
                u64::try_from(deadline.saturating_duration_since(now).as_millis()).unwrap_or(u64::MAX)
            }),
            projection: self.engine.projection(),
        }
    }

    /// Forward engine events to subscribers and the game-end hook
    fn flush_events(&mut self) {
        for event in self.engine.drain_events() {
            match event {
                EngineEvent::StateChanged(broadcast) => {
                    self.notify(RoomEvent::StateChanged(broadcast));
                }
                EngineEvent::GameEnded { final_state } => {
                    if self.end_notified {
                        continue;
                    }
                    self.end_notified = true;
                    log::info!("Room {}: game ended", self.code);
                    if let Some(hook) = &self.on_game_end {
                        hook(&self.code, &final_state);
                    }
                    self.notify(RoomEvent::GameEnded {
                        room_code: self.code.clone(),
                        final_state,
                    });
                }
            }
        }
    }

    /// Broadcast an event to all subscribers
    fn notify(&mut self, event: RoomEvent) {
        self.subscribers.retain(|subscriber_id, sender| {
            match sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!(
                        "Subscriber {} channel full, dropping event",
                        subscriber_id
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    log::debug!("Subscriber {} disconnected, removing", subscriber_id);
                    false
                }
            }
        });
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
