//! Serenity event handler implementation

use std::sync::Arc;

use redpin_types::ReactionEvent;
use serenity::all::{
    Command, CommandInteraction, CreateInteractionResponse, CreateInteractionResponseMessage,
    EditInteractionResponse, ResolvedTarget,
};
use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::model::channel::Reaction;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{debug, error, info, warn};

use crate::commands::{self, SettingsCommand, COMMAND_GROUP, FORCE_PIN};
use crate::health::AppState;
use crate::pipeline::PinPipeline;
use crate::platform::Platform;
use crate::serenity_platform::{reaction_type_to_emoji, SerenityPlatform};

pub type BotPipeline = PinPipeline<SerenityPlatform>;

impl TypeMapKey for PinPipeline<SerenityPlatform> {
    type Value = Arc<BotPipeline>;
}

/// Convert a gateway reaction into the pipeline's event type.
///
/// Reactions by the bot itself count as bot reactions even when no member
/// payload is attached.
pub fn reaction_event(reaction: &Reaction, bot_user_id: u64) -> ReactionEvent {
    let user_id = reaction.user_id.map(|u| u.get()).unwrap_or_default();
    let member_is_bot = reaction.member.as_ref().is_some_and(|m| m.user.bot)
        || (bot_user_id != 0 && user_id == bot_user_id);

    ReactionEvent {
        guild_id: reaction.guild_id.map(|g| g.get()),
        channel_id: reaction.channel_id.get(),
        message_id: reaction.message_id.get(),
        user_id,
        member_is_bot,
        emoji: reaction_type_to_emoji(&reaction.emoji),
    }
}

pub struct Handler;

async fn pipeline(ctx: &Context) -> Option<Arc<BotPipeline>> {
    let data = ctx.data.read().await;
    match data.get::<BotPipeline>() {
        Some(p) => Some(p.clone()),
        None => {
            error!("PinPipeline not found in context data");
            None
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        if let Some(pipeline) = pipeline(&ctx).await {
            pipeline.platform().set_bot_user_id(ready.user.id.get());
        }

        let health = {
            let data = ctx.data.read().await;
            data.get::<AppState>().cloned()
        };
        if let Some(health) = health {
            health.set_bot_username(ready.user.name.clone()).await;
        }

        match Command::set_global_commands(&ctx.http, commands::definitions()).await {
            Ok(registered) => info!("Registered {} application commands", registered.len()),
            Err(e) => error!("Failed to register application commands: {}", e),
        }
    }

    async fn reaction_add(&self, ctx: Context, add_reaction: Reaction) {
        let Some(pipeline) = pipeline(&ctx).await else {
            return;
        };

        let event = reaction_event(&add_reaction, pipeline.platform().bot_user_id());
        match pipeline.handle_reaction(&event).await {
            Some(Ok(relayed)) => debug!(
                "Relayed message {} as {}",
                event.message_id, relayed.message_id
            ),
            Some(Err(e)) => debug!("Pin attempt for {} failed: {}", event.message_id, e),
            None => {}
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(cmd) = interaction else {
            return;
        };
        let Some(pipeline) = pipeline(&ctx).await else {
            return;
        };

        match cmd.data.name.as_str() {
            COMMAND_GROUP => handle_settings(&ctx, &pipeline, &cmd).await,
            FORCE_PIN => handle_force_pin(&ctx, &pipeline, &cmd).await,
            other => debug!("Ignoring unknown command {}", other),
        }
    }
}

async fn handle_settings(ctx: &Context, pipeline: &BotPipeline, cmd: &CommandInteraction) {
    let Some(guild_id) = cmd.guild_id else {
        return;
    };

    let parsed = SettingsCommand::parse(&cmd.data.options());
    let reply = match parsed {
        Some(command) => {
            debug!("Guild {} ran {:?}", guild_id, command);
            commands::execute(
                pipeline.platform().as_ref(),
                pipeline.store(),
                guild_id.get(),
                command,
            )
            .await
        }
        None => "Unknown subcommand.".to_string(),
    };

    let response = CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(reply)
            .ephemeral(true),
    );
    if let Err(e) = cmd.create_response(&ctx.http, response).await {
        error!("Failed to respond to /{} command: {}", COMMAND_GROUP, e);
    }
}

async fn handle_force_pin(ctx: &Context, pipeline: &BotPipeline, cmd: &CommandInteraction) {
    let Some(guild_id) = cmd.guild_id else {
        return;
    };
    let target = match cmd.data.target() {
        Some(ResolvedTarget::Message(message)) => {
            Some((message.channel_id.get(), message.id.get()))
        }
        _ => None,
    };
    let Some((channel_id, message_id)) = target else {
        warn!("Force pin invoked without a target message");
        return;
    };

    // Relaying can outlast the initial response window.
    if let Err(e) = cmd.defer_ephemeral(&ctx.http).await {
        error!("Failed to defer force pin response: {}", e);
        return;
    }

    let result = pipeline
        .force_pin(guild_id.get(), channel_id, message_id)
        .await;
    let reply = EditInteractionResponse::new().content(commands::force_pin_reply(&result));
    if let Err(e) = cmd.edit_response(&ctx.http, reply).await {
        error!("Failed to edit force pin response: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redpin_types::EmojiRef;

    fn reaction(user_id: u64) -> Reaction {
        serde_json::from_value(serde_json::json!({
            "channel_id": "10",
            "message_id": "100",
            "guild_id": "1",
            "user_id": user_id.to_string(),
            "emoji": { "id": null, "name": "⭐" },
            "burst": false,
            "type": 0
        }))
        .unwrap()
    }

    #[test]
    fn test_reaction_event_conversion() {
        let event = reaction_event(&reaction(77), 999);
        assert_eq!(event.guild_id, Some(1));
        assert_eq!(event.channel_id, 10);
        assert_eq!(event.message_id, 100);
        assert_eq!(event.user_id, 77);
        assert!(!event.member_is_bot);
        assert_eq!(event.emoji, EmojiRef::unicode("⭐"));
    }

    #[test]
    fn test_own_reaction_counts_as_bot() {
        assert!(reaction_event(&reaction(999), 999).member_is_bot);
    }
}
