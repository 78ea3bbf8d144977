//! Redpin: relays popular Discord messages into a pin channel
//!
//! Watches reactions in every guild the bot is in. Once a message collects
//! enough reactions it is re-posted through a webhook that impersonates its
//! author, so pins are not limited by the per-channel pin cap.

mod broadcast;
mod commands;
mod config;
mod errors;
mod handlers;
mod health;
mod pipeline;
mod platform;
mod qualify;
mod serenity_platform;
mod serializer;
mod store;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serenity::model::gateway::GatewayIntents;
use serenity::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::handlers::{BotPipeline, Handler};
use crate::health::AppState;
use crate::pipeline::PinPipeline;
use crate::serenity_platform::SerenityPlatform;
use crate::store::GuildSettingsStore;

/// Redpin CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/redpin.toml")]
    config: String,

    /// Discord bot token (overrides config file)
    #[arg(long, env = "DISCORD_BOT_TOKEN")]
    bot_token: Option<String>,

    /// Per-guild settings file (overrides config file)
    #[arg(long, env = "REDPIN_SETTINGS_PATH")]
    settings_path: Option<String>,

    /// Health check server port
    #[arg(long, env = "HEALTH_CHECK_PORT", default_value = "3001")]
    health_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "redpin_bot=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Redpin");

    let args = Args::parse();

    let mut config = if std::path::Path::new(&args.config).exists() {
        info!("Loading config from file: {}", args.config);
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, loading from environment");
        Config::from_env()?
    };
    if let Some(bot_token) = args.bot_token {
        config.discord.bot_token = bot_token;
    }
    if let Some(settings_path) = args.settings_path {
        config.pins.settings_path = settings_path;
    }
    config.validate()?;

    let marker = config.pins.marker()?;
    let store = Arc::new(
        GuildSettingsStore::open(&config.pins.settings_path)
            .with_context(|| format!("Failed to open settings {}", config.pins.settings_path))?,
    );
    info!("Guild settings loaded from {}", store.path().display());

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord.bot_token, intents)
        .event_handler(Handler)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Discord client: {}", e))?;

    let platform = Arc::new(SerenityPlatform::new(
        client.http.clone(),
        reqwest::Client::new(),
    ));
    let pipeline = Arc::new(PinPipeline::new(
        platform,
        store,
        marker,
        config.pins.webhook_name.clone(),
    ));
    let health_state = AppState::new(pipeline.pins_relayed());

    {
        let mut data = client.data.write().await;
        data.insert::<BotPipeline>(pipeline);
        data.insert::<AppState>(health_state.clone());
    }

    let health_port = args.health_port;
    tokio::spawn(async move {
        if let Err(e) = health::start_health_server(health_state, health_port).await {
            error!("Health server error: {}", e);
        }
    });

    // Graceful shutdown: close all shards on SIGTERM or Ctrl+C.
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
        }
        info!("Shutdown signal received, stopping Discord client...");
        shard_manager.shutdown_all().await;
    });

    info!("Starting Discord gateway connection...");

    client
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Discord client error: {}", e))?;

    info!("Redpin stopped");
    Ok(())
}
