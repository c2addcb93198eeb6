//! Room manager for spawning and managing room actors.

use super::{
    actor::{GameEndHook, RoomActor, RoomHandle},
    config::RoomConfig,
    errors::RoomError,
    messages::{RoomEvent, RoomResponse},
};
use crate::game::{
    config::GameConfig,
    entities::{Player, PlayerAction, PlayerId},
};
use rand::Rng;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, mpsc};

const CODE_LENGTH: usize = 4;
const CODE_ATTEMPTS: usize = 64;

/// Registry of live rooms keyed by their join code.
///
/// Owned explicitly by whoever hosts the rooms; nothing here is global.
pub struct RoomManager {
    /// Active room handles
    rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,

    /// Configuration used for rooms created without one
    defaults: RoomConfig,

    on_game_end: Option<GameEndHook>,
}

impl RoomManager {
    pub fn new(defaults: RoomConfig) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            defaults,
            on_game_end: None,
        }
    }

    /// Registers a callback run once per room when its game ends.
    #[must_use]
    pub fn with_game_end_hook(mut self, hook: GameEndHook) -> Self {
        self.on_game_end = Some(hook);
        self
    }

    /// Validate the game, spawn its actor and return the new room's handle
    pub async fn create_room(
        &self,
        game: Arc<GameConfig>,
        host_id: impl Into<PlayerId>,
        config: Option<RoomConfig>,
    ) -> Result<RoomHandle, RoomError> {
        game.validate()?;
        let config = config.unwrap_or_else(|| self.defaults.clone());
        config.validate()?;

        let mut rooms = self.rooms.write().await;
        let code = free_code(&rooms)?;
        let (actor, handle) = RoomActor::new(
            code.clone(),
            game,
            host_id.into(),
            config,
            self.on_game_end.clone(),
        );
        rooms.insert(code.clone(), handle.clone());
        drop(rooms);

        tokio::spawn(async move {
            actor.run().await;
        });

        log::info!("Created room {}", code);
        Ok(handle)
    }

    /// Get a room handle; codes are case-insensitive
    pub async fn get_room(&self, code: &str) -> Option<RoomHandle> {
        let rooms = self.rooms.read().await;
        rooms.get(&code.to_ascii_uppercase()).cloned()
    }

    /// Codes of all active rooms, sorted
    pub async fn list_rooms(&self) -> Vec<String> {
        let rooms = self.rooms.read().await;
        let mut codes: Vec<String> = rooms.keys().cloned().collect();
        codes.sort();
        codes
    }

    pub async fn active_room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }

    pub async fn close_room(&self, code: &str) -> Result<(), RoomError> {
        let handle = self
            .rooms
            .write()
            .await
            .remove(&code.to_ascii_uppercase())
            .ok_or_else(|| RoomError::NotFound(code.to_string()))?;

        // An actor that already stopped is as closed as it gets.
        if let Err(e) = handle.close().await {
            log::debug!("Room {} was already gone: {}", code, e);
        }

        log::info!("Closed room {}", handle.code());
        Ok(())
    }

    pub async fn join(&self, code: &str, player: Player) -> Result<RoomResponse, RoomError> {
        self.room(code).await?.join(player).await
    }

    pub async fn leave(&self, code: &str, player_id: &str) -> Result<RoomResponse, RoomError> {
        self.room(code).await?.leave(player_id).await
    }

    pub async fn start(&self, code: &str) -> Result<RoomResponse, RoomError> {
        self.room(code).await?.start().await
    }

    pub async fn action(
        &self,
        code: &str,
        player_id: &str,
        action: PlayerAction,
    ) -> Result<RoomResponse, RoomError> {
        self.room(code).await?.action(player_id, action).await
    }

    /// Subscribe to a room's events through a fresh channel
    pub async fn subscribe(
        &self,
        code: &str,
        subscriber_id: &str,
    ) -> Result<mpsc::Receiver<RoomEvent>, RoomError> {
        let (sender, receiver) = mpsc::channel(self.defaults.subscriber_capacity);
        self.room(code).await?.subscribe(subscriber_id, sender).await?;
        Ok(receiver)
    }

    async fn room(&self, code: &str) -> Result<RoomHandle, RoomError> {
        self.get_room(code)
            .await
            .ok_or_else(|| RoomError::NotFound(code.to_string()))
    }
}

fn free_code(rooms: &HashMap<String, RoomHandle>) -> Result<String, RoomError> {
    let mut rng = rand::rng();
    for _ in 0..CODE_ATTEMPTS {
        let code: String = (0..CODE_LENGTH)
            .map(|_| char::from(rng.random_range(b'A'..=b'Z')))
            .collect();
        if !rooms.contains_key(&code) {
            return Ok(code);
        }
    }
    Err(RoomError::CodesExhausted)
}
