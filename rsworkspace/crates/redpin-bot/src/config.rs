//! Configuration management for redpin-bot

#[path = "config_tests.rs"]
mod config_tests;

use std::env::{self, VarError};
use std::fs;

use anyhow::{bail, Context, Result};
use redpin_types::EmojiRef;
use serde::{Deserialize, Serialize};

/// Environment lookup, injectable for tests.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Result<String, VarError>;
}

/// Delegates to `std::env`.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    #[inline]
    fn var(&self, key: &str) -> Result<String, VarError> {
        env::var(key)
    }
}

/// Complete bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord: DiscordBotConfig,
    #[serde(default)]
    pub pins: PinsConfig,
}

/// Discord bot specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordBotConfig {
    /// Bot token from the Discord developer portal
    #[serde(default)]
    pub bot_token: String,
}

/// Pin relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinsConfig {
    /// JSON file holding the per-guild settings
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
    /// Reaction the bot places on relayed messages
    #[serde(default = "default_marker_emoji")]
    pub marker_emoji: String,
    /// Name given to webhooks the bot creates
    #[serde(default = "default_webhook_name")]
    pub webhook_name: String,
}

impl Default for PinsConfig {
    fn default() -> Self {
        Self {
            settings_path: default_settings_path(),
            marker_emoji: default_marker_emoji(),
            webhook_name: default_webhook_name(),
        }
    }
}

impl PinsConfig {
    pub fn marker(&self) -> Result<EmojiRef> {
        self.marker_emoji
            .parse::<EmojiRef>()
            .map_err(|e| anyhow::anyhow!("Invalid marker_emoji {:?}: {}", self.marker_emoji, e))
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(&SystemEnv)
    }

    pub fn from_env_with<E: ReadEnv>(env: &E) -> Result<Self> {
        let bot_token = env
            .var("DISCORD_BOT_TOKEN")
            .context("DISCORD_BOT_TOKEN not set")?;

        let defaults = PinsConfig::default();
        Ok(Config {
            discord: DiscordBotConfig { bot_token },
            pins: PinsConfig {
                settings_path: env
                    .var("REDPIN_SETTINGS_PATH")
                    .unwrap_or(defaults.settings_path),
                marker_emoji: env
                    .var("REDPIN_MARKER_EMOJI")
                    .unwrap_or(defaults.marker_emoji),
                webhook_name: env
                    .var("REDPIN_WEBHOOK_NAME")
                    .unwrap_or(defaults.webhook_name),
            },
        })
    }

    /// Reject configurations the bot cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            bail!("Discord bot token is empty (set discord.bot_token or DISCORD_BOT_TOKEN)");
        }
        if self.pins.webhook_name.trim().is_empty() {
            bail!("pins.webhook_name must not be empty");
        }
        self.pins.marker()?;
        Ok(())
    }
}

fn default_settings_path() -> String {
    "config.json".to_string()
}

fn default_marker_emoji() -> String {
    "📌".to_string()
}

fn default_webhook_name() -> String {
    "redpin".to_string()
}
