/// Integration tests for timers driven by room actors
///
/// The Tokio clock is paused so deadlines are exact: the actor's own loop
/// fires the timer, and an action arriving first must always win.
use party_engine::{
    GameConfig, Player, PlayerAction, RoomConfig, RoomManager,
    room::{RoomEvent, RoomResponse},
};
use serde_json::{Value, json};
use std::{sync::Arc, time::Duration};
use tokio::{sync::mpsc, time::sleep};

fn countdown_game() -> Arc<GameConfig> {
    Arc::new(
        GameConfig::from_value(json!({
            "name": "Countdown",
            "initialState": "WAIT",
            "initialGameState": { "expired": false },
            "states": {
                "WAIT": {
                    "onEnter": {
                        "function": "startTimer",
                        "args": {
                            "durationSeconds": 2,
                            "onExpireEffects": [
                                { "function": "setProperty", "args": { "path": "expired", "value": true } },
                                { "function": "dispatchEvent", "args": { "actionName": "timeout" } }
                            ]
                        }
                    },
                    "ui": { "host": { "waiting": "{{ !gameState.expired }}" } }
                },
                "ANSWERED": {},
                "DONE": {}
            },
            "playerActions": { "respond": { "permissions": ["host", "player"] } },
            "transitions": [
                { "from": "WAIT", "action": "respond", "to": "ANSWERED" },
                { "from": "WAIT", "action": "timeout", "to": "DONE" }
            ]
        }))
        .unwrap(),
    )
}

async fn open_room() -> (RoomManager, String, mpsc::Receiver<RoomEvent>) {
    let manager = RoomManager::new(RoomConfig::default());
    let handle = manager
        .create_room(countdown_game(), "host", None)
        .await
        .unwrap();
    let code = handle.code().to_string();
    let events = manager.subscribe(&code, "screen").await.unwrap();
    assert!(manager.join(&code, Player::new("p1", "Ann")).await.unwrap().is_success());
    (manager, code, events)
}

fn statuses(events: &mut mpsc::Receiver<RoomEvent>) -> Vec<String> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let RoomEvent::StateChanged(broadcast) = event {
            seen.push(broadcast.status);
        }
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn test_timer_expiry_transitions_room() {
    let (manager, code, mut events) = open_room().await;
    assert!(manager.start(&code).await.unwrap().is_success());

    let snapshot = manager.get_room(&code).await.unwrap().snapshot().await.unwrap();
    assert_eq!(snapshot.status, "WAIT");
    assert_eq!(snapshot.projection.host_view, json!({ "waiting": true }));

    sleep(Duration::from_secs(3)).await;

    let snapshot = manager.get_room(&code).await.unwrap().snapshot().await.unwrap();
    assert_eq!(snapshot.status, "DONE");
    assert_eq!(snapshot.timer_remaining_ms, None);

    let seen = statuses(&mut events);
    assert_eq!(seen.first().map(String::as_str), Some("WAIT"));
    assert_eq!(seen.last().map(String::as_str), Some("DONE"));
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_reports_remaining_time() {
    let (manager, code, _events) = open_room().await;
    manager.start(&code).await.unwrap();

    tokio::time::advance(Duration::from_millis(500)).await;
    let room = manager.get_room(&code).await.unwrap();
    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.timer_remaining_ms, Some(1_500));
    assert_eq!(snapshot.game_name.as_deref(), Some("Countdown"));
    assert!(snapshot.started);
    assert!(!snapshot.finished);
}

#[tokio::test(start_paused = true)]
async fn test_action_before_deadline_cancels_timer() {
    let (manager, code, mut events) = open_room().await;
    manager.start(&code).await.unwrap();

    sleep(Duration::from_millis(1_999)).await;
    assert_eq!(
        manager
            .action(&code, "p1", PlayerAction::new("respond", Value::Null))
            .await
            .unwrap(),
        RoomResponse::Transitioned("ANSWERED".to_string())
    );

    sleep(Duration::from_secs(10)).await;
    let room = manager.get_room(&code).await.unwrap();
    let snapshot = room.snapshot().await.unwrap();
    assert_eq!(snapshot.status, "ANSWERED");
    assert_eq!(snapshot.timer_remaining_ms, None);
    assert_eq!(statuses(&mut events), vec!["WAIT", "ANSWERED"]);
}

#[tokio::test(start_paused = true)]
async fn test_late_action_does_not_transition() {
    let (manager, code, _events) = open_room().await;
    manager.start(&code).await.unwrap();

    sleep(Duration::from_secs(3)).await;
    let response = manager
        .action(&code, "p1", PlayerAction::new("respond", Value::Null))
        .await
        .unwrap();
    // Accepted, but DONE has no transition on it.
    assert_eq!(response, RoomResponse::Success);

    let snapshot = manager.get_room(&code).await.unwrap().snapshot().await.unwrap();
    assert_eq!(snapshot.status, "DONE");
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribed_screen_stops_receiving() {
    let (manager, code, mut events) = open_room().await;
    let room = manager.get_room(&code).await.unwrap();
    room.unsubscribe("screen").await.unwrap();
    manager.start(&code).await.unwrap();

    sleep(Duration::from_secs(3)).await;
    assert!(statuses(&mut events).is_empty());

    manager.close_room(&code).await.unwrap();
    assert!(manager.get_room(&code).await.is_none());
}
