//! Command-line host for a configurable party game.
//!
//! Loads a game document, opens one room for it and drives the room with
//! newline-delimited JSON commands read from stdin. Every broadcast is
//! written to stdout as one JSON line.

mod commands;
mod config;
mod logging;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Error};
use commands::{Command, render_event, render_parse_error};
use config::ServerConfig;
use ctrlc::set_handler;
use log::{info, warn};
use party_engine::{GameConfig, Player, RoomManager};
use pico_args::Arguments;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Host a configurable party game over stdin/stdout

USAGE:
  party_server [OPTIONS]

OPTIONS:
  --game       PATH        Game configuration document  [default: env PARTY_GAME_CONFIG]
  --host       ID          Host actor id                [default: env PARTY_HOST_ID or host]
  --players    A,B,C       Players to join up front     [default: env PARTY_PLAYERS]
  --seed       N           Seed for shuffleArray        [default: env PARTY_RNG_SEED or random]

FLAGS:
  -h, --help               Print help information

COMMANDS (one JSON object per line on stdin):
  {\"cmd\":\"join\",\"id\":\"p1\",\"name\":\"Ann\"}
  {\"cmd\":\"leave\",\"id\":\"p1\"}
  {\"cmd\":\"start\"}
  {\"cmd\":\"action\",\"player\":\"host\",\"type\":\"startGame\",\"payload\":{}}
  {\"cmd\":\"snapshot\"}
  {\"cmd\":\"quit\"}

ENVIRONMENT:
  PARTY_MAX_PLAYERS        Room player limit            [default: 16]
  PARTY_INBOX_CAPACITY     Room message inbox size      [default: 100]
  PARTY_SUBSCRIBER_CAPACITY  Events buffered per screen [default: 64]
  RUST_LOG                 Log filter (logs go to stderr) [default: info]
  (A .env file is read if present)
";

struct Args {
    game: Option<PathBuf>,
    host: Option<String>,
    players: Option<String>,
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        game: pargs.opt_value_from_str("--game")?,
        host: pargs.opt_value_from_str("--host")?,
        players: pargs.opt_value_from_str("--players")?,
        seed: pargs.opt_value_from_str("--seed")?,
    };

    // Catching signals for exit.
    set_handler(|| std::process::exit(0))?;

    logging::init();

    let remaining = pargs.finish();
    if !remaining.is_empty() {
        warn!("Ignoring unknown arguments: {remaining:?}");
    }

    let config = ServerConfig::from_env(args.game, args.host, args.players, args.seed)?;
    config.validate()?;

    let document = std::fs::read_to_string(&config.game_path)
        .with_context(|| format!("Failed to read {}", config.game_path.display()))?;
    let game = GameConfig::from_json(&document)
        .with_context(|| format!("Failed to parse {}", config.game_path.display()))?;
    info!(
        "Loaded {} from {}",
        game.name.as_deref().unwrap_or("unnamed game"),
        config.game_path.display()
    );

    let manager = RoomManager::new(config.room.clone())
        .with_game_end_hook(Arc::new(|code: &str, state: &serde_json::Value| {
            logging::log_game_end(code, state);
        }));
    let room = manager
        .create_room(Arc::new(game), config.host_id.clone(), None)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create room: {}", e))?;
    info!("Room {} hosted by {}", room.code(), config.host_id);

    let mut events = manager.subscribe(room.code(), "stdout").await?;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            println!("{}", render_event(&event));
        }
    });

    for id in &config.players {
        let response = room.join(Player::new(id.clone(), id.clone())).await?;
        if let Some(error) = response.error_message() {
            warn!("{id} could not join: {error}");
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                println!("{}", render_parse_error(&e));
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }

        match command.execute(&room).await {
            Ok(Some(reply)) => println!("{reply}"),
            Ok(None) => {}
            Err(e) => {
                log::error!("Room {} stopped answering: {}", room.code(), e);
                break;
            }
        }
    }

    info!("Shutting down room {}...", room.code());
    manager.close_room(room.code()).await?;
    // Closing drops the room's subscriber senders, which ends the printer.
    printer.await?;

    Ok(())
}
