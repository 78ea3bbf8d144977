//! Decides whether a reaction event makes its message eligible for pinning

#[path = "qualify_tests.rs"]
mod qualify_tests;

use std::sync::Arc;

use redpin_types::{
    Decision, GuildSettings, PinCandidate, PinError, ReactionEvent, ReactionSummary,
    SkipReason, SourceMessage,
};
use tracing::debug;

use crate::platform::Platform;

/// Reaction count after the self-pin policy is applied, floored at 0.
pub fn effective_count(raw: u64, author_reacted: bool, allow_self_pin: bool) -> u64 {
    if allow_self_pin || !author_reacted {
        raw
    } else {
        raw.saturating_sub(1)
    }
}

/// Checks that need no settings and no platform call.
pub fn precheck(event: &ReactionEvent) -> Option<SkipReason> {
    if event.guild_id.is_none() {
        return Some(SkipReason::DirectMessage);
    }
    if event.member_is_bot {
        return Some(SkipReason::BotReactor);
    }
    None
}

/// Refuse messages that cannot be relayed faithfully: system messages and
/// messages posted through a webhook this bot owns.
///
/// A webhook without a visible owner is treated as foreign.
pub async fn check_relayable<P: Platform>(
    platform: &P,
    message: &SourceMessage,
) -> Result<(), PinError> {
    if !message.kind.is_relayable() {
        return Err(PinError::Ineligible(
            "this type of message cannot be pinned".to_string(),
        ));
    }

    if let Some(webhook_id) = message.webhook_id {
        let owner = match platform.webhook_owner(webhook_id).await {
            Ok(owner) => owner,
            Err(e) if e.is_not_found() => None,
            Err(e @ PinError::PermissionDenied { .. }) => {
                debug!("Owner of webhook {} is not visible: {}", webhook_id, e);
                None
            }
            Err(e) => return Err(e),
        };
        if owner == Some(platform.bot_user_id()) {
            return Err(PinError::Ineligible(
                "messages relayed by this bot cannot be pinned".to_string(),
            ));
        }
    }

    Ok(())
}

pub struct QualificationEngine<P> {
    platform: Arc<P>,
}

impl<P: Platform> QualificationEngine<P> {
    pub fn new(platform: Arc<P>) -> Self {
        Self { platform }
    }

    /// Evaluate one reaction event against a settings snapshot.
    ///
    /// Checks run in a fixed order and stop at the first failing one.
    pub async fn evaluate(
        &self,
        event: &ReactionEvent,
        settings: &GuildSettings,
    ) -> Result<Decision, PinError> {
        if let Some(reason) = precheck(event) {
            return Ok(Decision::Skip(reason));
        }
        let guild_id = event.guild_id.unwrap_or_default();

        let Some(pin_channel) = settings.pin_channel else {
            return Ok(Decision::Skip(SkipReason::NoPinChannel));
        };

        if event.channel_id == pin_channel {
            return Ok(Decision::Skip(SkipReason::InPinChannel));
        }

        if !settings.allow_nsfw_source {
            let channel = self.platform.fetch_channel(event.channel_id).await?;
            if channel.nsfw {
                return Ok(Decision::Skip(SkipReason::AgeRestricted));
            }
        }

        let message = self
            .platform
            .fetch_message(event.channel_id, event.message_id)
            .await?;

        if message.is_marked() {
            return Ok(Decision::Skip(SkipReason::AlreadyPinned));
        }

        if let Err(e) = check_relayable(&*self.platform, &message).await {
            return match e {
                PinError::Ineligible(why) => {
                    debug!("Message {} is not relayable: {}", message.id, why);
                    Ok(Decision::Skip(SkipReason::Unpinnable))
                }
                other => Err(other),
            };
        }

        let qualifying = self
            .first_qualifying(&message, settings)
            .await?
            .map(|r| r.emoji.clone());

        match qualifying {
            Some(reaction) => Ok(Decision::Qualifies(Box::new(PinCandidate {
                guild_id,
                message,
                reaction,
            }))),
            None => Ok(Decision::Skip(SkipReason::BelowThreshold)),
        }
    }

    /// First reaction, in platform order, that is allowed and meets the threshold.
    async fn first_qualifying<'m>(
        &self,
        message: &'m SourceMessage,
        settings: &GuildSettings,
    ) -> Result<Option<&'m ReactionSummary>, PinError> {
        let required = u64::from(settings.required_count);

        for reaction in &message.reactions {
            if !settings.allows_emoji(&reaction.emoji.identifier()) {
                continue;
            }
            // The effective count never exceeds the raw count.
            if reaction.count < required {
                continue;
            }

            let count = if settings.allow_self_pin {
                reaction.count
            } else {
                let users = self
                    .platform
                    .reaction_user_ids(message.channel_id, message.id, &reaction.emoji)
                    .await?;
                let author_reacted = users.contains(&message.author.id);
                effective_count(reaction.count, author_reacted, false)
            };

            debug!(
                "Reaction {} on message {}: effective count {}",
                reaction.emoji, message.id, count
            );
            if count >= required {
                return Ok(Some(reaction));
            }
        }

        Ok(None)
    }
}
