//! Logging configuration.
//!
//! Log lines go to stderr so that stdout carries nothing but the JSON
//! event stream.

use env_logger::{Builder, Env, Target};
use log::SetLoggerError;

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "info";

/// Initialize logging, reading the filter from `RUST_LOG`
///
/// # Example
///
/// ```no_run
/// logging::init();
/// log::info!("Server starting");
/// ```
pub fn init() {
    if let Err(e) = try_init() {
        eprintln!("Logger already initialized: {e}");
    }
}

/// Like [`init`], but reports a logger that is already installed
pub fn try_init() -> Result<(), SetLoggerError> {
    Builder::from_env(Env::default().default_filter_or(DEFAULT_FILTER))
        .format_target(false)
        .target(Target::Stderr)
        .try_init()
}

/// Log the end of a room's game with its final status
pub fn log_game_end(room_code: &str, final_state: &serde_json::Value) {
    let winner = final_state
        .get("winner")
        .and_then(|winner| winner.get("name"))
        .and_then(serde_json::Value::as_str);
    match winner {
        Some(name) => log::info!("Room {room_code} finished, winner: {name}"),
        None => log::info!("Room {room_code} finished"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_second_init_is_reported() {
        let _ = try_init();
        assert!(try_init().is_err());
        // init() only reports the duplicate.
        init();
    }

    #[test]
    fn test_log_game_end() {
        // Just ensure it doesn't panic
        log_game_end("ABCD", &json!({ "winner": { "name": "Ann" } }));
        log_game_end("ABCD", &json!({ "winner": null }));
        log_game_end("ABCD", &json!([]));
    }
}
