//! `/redpin` settings commands and the force-pin context menu

use redpin_types::{extract_emojis, GuildSettings, PinError, RelayedMessage};
use serenity::builder::{CreateCommand, CreateCommandOption};
use serenity::model::application::{CommandOptionType, CommandType, ResolvedOption, ResolvedValue};
use serenity::model::channel::ChannelType;
use serenity::model::permissions::Permissions;
use tracing::{info, warn};

use crate::errors::log_failure;
use crate::platform::Platform;
use crate::store::{GuildSettingsStore, StoreError};

pub const COMMAND_GROUP: &str = "redpin";
pub const FORCE_PIN: &str = "Force Pin Message";

const CHANNEL_CHANGED_REASON: &str = "Pin channel changed, webhook automatically removed";

/// A parsed `/redpin` subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsCommand {
    Channel(u64),
    Count(i64),
    ToggleNsfw,
    ToggleSelfPin,
    ToggleDm,
    Filter(String),
    Config,
}

impl SettingsCommand {
    pub fn parse(options: &[ResolvedOption<'_>]) -> Option<Self> {
        let sub = options.first()?;
        let ResolvedValue::SubCommand(args) = &sub.value else {
            return None;
        };

        let command = match sub.name {
            "channel" => args.iter().find_map(|a| match a.value {
                ResolvedValue::Channel(channel) => Some(Self::Channel(channel.id.get())),
                _ => None,
            })?,
            "count" => args.iter().find_map(|a| match a.value {
                ResolvedValue::Integer(count) => Some(Self::Count(count)),
                _ => None,
            })?,
            "nsfw" => Self::ToggleNsfw,
            "selfpin" => Self::ToggleSelfPin,
            "dm" => Self::ToggleDm,
            "filter" => Self::Filter(
                args.iter()
                    .find_map(|a| match a.value {
                        ResolvedValue::String(s) => Some(s.to_string()),
                        _ => None,
                    })
                    .unwrap_or_default(),
            ),
            "config" => Self::Config,
            _ => return None,
        };
        Some(command)
    }
}

/// Global command definitions registered on ready.
pub fn definitions() -> Vec<CreateCommand> {
    let sub = |name: &str, description: &str| {
        CreateCommandOption::new(CommandOptionType::SubCommand, name, description)
    };

    let group = CreateCommand::new(COMMAND_GROUP)
        .description("Configure message pinning")
        .default_member_permissions(Permissions::ADMINISTRATOR)
        .dm_permission(false)
        .add_option(
            sub("channel", "Set which channel to send pins to.").add_sub_option(
                CreateCommandOption::new(CommandOptionType::Channel, "channel", "Pin channel")
                    .channel_types(vec![ChannelType::Text])
                    .required(true),
            ),
        )
        .add_option(
            sub("count", "Set the number of reactions to pin a message.").add_sub_option(
                CreateCommandOption::new(CommandOptionType::Integer, "count", "Reactions needed")
                    .required(true),
            ),
        )
        .add_option(sub(
            "nsfw",
            "Toggle whether messages from NSFW channels can be pinned.",
        ))
        .add_option(sub(
            "selfpin",
            "Toggle whether messages can be pinned by their author.",
        ))
        .add_option(sub(
            "dm",
            "Toggle whether pinning a message notifies their author.",
        ))
        .add_option(
            sub("filter", "Customize which emojis can pin messages.").add_sub_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "emojis",
                    "Emojis allowed to pin; leave empty to allow any emoji",
                )
                .required(false),
            ),
        )
        .add_option(sub("config", "Show this server's pin settings."));

    let force_pin = CreateCommand::new(FORCE_PIN)
        .kind(CommandType::Message)
        .default_member_permissions(Permissions::MANAGE_MESSAGES)
        .dm_permission(false);

    vec![group, force_pin]
}

/// Apply a settings command and produce the reply text.
pub async fn execute<P: Platform>(
    platform: &P,
    store: &GuildSettingsStore,
    guild_id: u64,
    command: SettingsCommand,
) -> String {
    match command {
        SettingsCommand::Channel(channel_id) => {
            set_channel(platform, store, guild_id, channel_id).await
        }
        SettingsCommand::Count(count) => {
            let (settings, saved) = apply(store, guild_id, |s| {
                s.set_required_count(count);
            });
            let plural = if settings.required_count == 1 { "" } else { "s" };
            with_save_status(
                format!(
                    "Pins will now require **{} reaction{}**.",
                    settings.required_count, plural
                ),
                saved,
            )
        }
        SettingsCommand::ToggleNsfw => {
            let (settings, saved) =
                apply(store, guild_id, |s| s.allow_nsfw_source = !s.allow_nsfw_source);
            let reply = if settings.allow_nsfw_source {
                "Messages from NSFW channels can now be pinned."
            } else {
                "Messages from NSFW channels can no longer be pinned."
            };
            with_save_status(reply.to_string(), saved)
        }
        SettingsCommand::ToggleSelfPin => {
            let (settings, saved) =
                apply(store, guild_id, |s| s.allow_self_pin = !s.allow_self_pin);
            let reply = if settings.allow_self_pin {
                "Messages can now be pinned by their author."
            } else {
                "Messages can no longer be pinned by their author."
            };
            with_save_status(reply.to_string(), saved)
        }
        SettingsCommand::ToggleDm => {
            let (settings, saved) =
                apply(store, guild_id, |s| s.notify_author = !s.notify_author);
            let reply = if settings.notify_author {
                "Pinning a message now notifies their author."
            } else {
                "Pinning a message no longer notifies their author."
            };
            with_save_status(reply.to_string(), saved)
        }
        SettingsCommand::Filter(input) => {
            let emojis = extract_emojis(&input);
            let (settings, saved) = apply(store, guild_id, |s| {
                s.emoji_allowlist = emojis.into_iter().collect();
            });
            let reply = if settings.emoji_allowlist.is_empty() {
                "Any emoji can now pin messages.".to_string()
            } else {
                let shown: Vec<String> = settings
                    .emoji_allowlist
                    .iter()
                    .map(|id| render_identifier(id))
                    .collect();
                format!("Only these emojis can now pin messages: {}", shown.join(" "))
            };
            with_save_status(reply, saved)
        }
        SettingsCommand::Config => match serde_json::to_string_pretty(&store.get(guild_id)) {
            Ok(json) => format!("```json\n{}\n```", json),
            Err(e) => format!("Could not render settings: {}", e),
        },
    }
}

/// Reply for the force-pin context menu.
pub fn force_pin_reply(result: &Result<RelayedMessage, PinError>) -> String {
    match result {
        Ok(_) => "Pinned a message.".to_string(),
        Err(PinError::NoChannelConfigured) => {
            "Failed to pin message. Did you forget to set a pin channel with `/redpin channel`?"
                .to_string()
        }
        Err(e) => format!("Failed to pin message: {}", e),
    }
}

async fn set_channel<P: Platform>(
    platform: &P,
    store: &GuildSettingsStore,
    guild_id: u64,
    channel_id: u64,
) -> String {
    match platform.fetch_channel(channel_id).await {
        Ok(channel) if channel.guild_id == Some(guild_id) => {}
        Ok(_) => return "That channel is not part of this server.".to_string(),
        Err(e) => {
            log_failure(&e);
            return format!("Could not look up that channel: {}", e);
        }
    }

    if let Some(previous) = store.get(guild_id).pin_channel {
        if previous != channel_id {
            remove_bot_webhooks(platform, previous).await;
        }
    }

    let saved = store
        .update(guild_id, |s| s.pin_channel = Some(channel_id))
        .map(|_| ());
    info!("Pin channel for guild {} set to {}", guild_id, channel_id);
    with_save_status(format!("Pins will now be sent in <#{}>.", channel_id), saved)
}

async fn remove_bot_webhooks<P: Platform>(platform: &P, channel_id: u64) {
    let webhooks = match platform.list_webhooks(channel_id).await {
        Ok(webhooks) => webhooks,
        Err(e) => {
            warn!("Could not list webhooks of old pin channel {}: {}", channel_id, e);
            return;
        }
    };

    let bot_id = platform.bot_user_id();
    for webhook in webhooks.iter().filter(|w| w.owner_id == Some(bot_id)) {
        if let Err(e) = platform
            .delete_webhook(webhook.id, CHANNEL_CHANGED_REASON)
            .await
        {
            warn!("Failed to remove webhook {}: {}", webhook.id, e);
        }
    }
}

/// Mutate and persist; the returned settings reflect the change even when saving failed.
fn apply<F>(
    store: &GuildSettingsStore,
    guild_id: u64,
    mutator: F,
) -> (GuildSettings, Result<(), StoreError>)
where
    F: FnOnce(&mut GuildSettings),
{
    match store.update(guild_id, mutator) {
        Ok(settings) => (settings, Ok(())),
        Err(e) => (store.get(guild_id), Err(e)),
    }
}

fn with_save_status(reply: String, saved: Result<(), StoreError>) -> String {
    match saved {
        Ok(()) => reply,
        Err(e) => format!(
            "{}\n**Warning:** the change could not be saved and will be lost on restart ({}).",
            reply, e
        ),
    }
}

fn render_identifier(identifier: &str) -> String {
    if identifier.chars().all(|c| c.is_ascii_digit()) {
        format!("<:emoji:{}>", identifier)
    } else {
        identifier.to_string()
    }
}
