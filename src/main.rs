//! emcee - a chat room bot.
//!
//! Sits in one room, auto-moderates it from shared ban lists, runs the
//! room playlist and answers prefixed chat commands.

mod bot;
mod commands;
mod config;
mod error;
mod events;
mod media;
mod moderation;
mod providers;
mod session;
mod state;
mod tasks;
mod text;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::bot::Bot;
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "emcee.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        room = %config.room.name,
        account = config.room.account.as_deref().unwrap_or("<guest>"),
        "Starting emcee"
    );

    let bot = Bot::new(config);

    tokio::select! {
        result = bot.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, leaving the room");
        }
    }

    Ok(())
}
