//! Relays a message into the pin channel through an impersonating webhook

#[path = "broadcast_tests.rs"]
mod broadcast_tests;

use std::sync::Arc;

use redpin_types::{
    AttachmentInfo, AuthorIdentity, DirectNotice, EmojiRef, LinkButton, PinError,
    RelayedMessage, SourceMessage, StickerInfo, UploadFile, WebhookInfo, WebhookPayload,
};
use tracing::{debug, error, info, warn};

use crate::errors::log_failure;
use crate::platform::{file_size_limit_for_tier, Platform};
use crate::store::GuildSettingsStore;

const DUPLICATE_WEBHOOK_REASON: &str = "Duplicate pin webhook removed";

/// Split attachments into those re-uploaded as files and those linked.
/// An attachment exactly at the ceiling is linked.
pub fn partition_attachments(
    attachments: &[AttachmentInfo],
    limit: u64,
) -> (Vec<&AttachmentInfo>, Vec<&AttachmentInfo>) {
    attachments.iter().partition(|a| a.size < limit)
}

/// Message text followed by one line per linked attachment and sticker.
pub fn compose_content(
    content: &str,
    linked: &[&AttachmentInfo],
    stickers: &[StickerInfo],
) -> String {
    let mut out = content.to_string();
    for attachment in linked {
        if attachment.is_spoiler() {
            out.push_str(&format!("\n|| {} ||", attachment.url));
        } else {
            out.push('\n');
            out.push_str(&attachment.url);
        }
    }
    for url in stickers.iter().filter_map(|s| s.url.as_deref()) {
        out.push('\n');
        out.push_str(url);
    }
    out
}

pub fn notification_text(created_at: i64, guild_name: &str) -> String {
    format!(
        "A message you created <t:{}:R> in **{}** was pinned!",
        created_at, guild_name
    )
}

pub struct PinBroadcaster<P> {
    platform: Arc<P>,
    store: Arc<GuildSettingsStore>,
    webhook_name: String,
}

impl<P: Platform> PinBroadcaster<P> {
    pub fn new(platform: Arc<P>, store: Arc<GuildSettingsStore>, webhook_name: String) -> Self {
        Self {
            platform,
            store,
            webhook_name,
        }
    }

    /// Copy `message` into the guild's pin channel.
    ///
    /// The marker reaction is applied first and stays even if a later
    /// step fails. Success is returned once the copy exists; reaction
    /// cloning and the author notification never change the result.
    pub async fn broadcast(
        &self,
        guild_id: u64,
        message: &SourceMessage,
        marker: &EmojiRef,
    ) -> Result<RelayedMessage, PinError> {
        let settings = self.store.get(guild_id);
        let pin_channel = self.resolve_pin_channel(guild_id, settings.pin_channel).await?;

        self.platform
            .add_reaction(message.channel_id, message.id, marker)
            .await
            .inspect_err(|e| error!("Failed to mark message {} as pinned: {}", message.id, e))?;
        debug!("Marked message {} as pinned", message.id);

        let webhook = self
            .resolve_webhook(pin_channel)
            .await
            .inspect_err(|e| error!("Failed to resolve pin webhook: {}", e))?;

        let limit = match self.platform.file_size_limit(guild_id).await {
            Ok(limit) => limit,
            Err(e) => {
                warn!("Could not read upload limit for guild {}: {}", guild_id, e);
                file_size_limit_for_tier(0)
            }
        };
        let (uploads, mut linked) = partition_attachments(&message.attachments, limit);

        let mut files = Vec::with_capacity(uploads.len());
        for attachment in uploads {
            match self.platform.download_attachment(attachment).await {
                Ok(data) => files.push(UploadFile {
                    filename: attachment.filename.clone(),
                    data,
                }),
                Err(e) => {
                    warn!(
                        "Failed to download attachment {}, linking it instead: {}",
                        attachment.id, e
                    );
                    linked.push(attachment);
                }
            }
        }

        let identity = match self
            .platform
            .author_identity(guild_id, &message.author)
            .await
        {
            Ok(identity) => identity,
            Err(e) => {
                debug!("Using plain author identity for {}: {}", message.author.id, e);
                AuthorIdentity::from_author(&message.author)
            }
        };

        let payload = WebhookPayload {
            content: compose_content(&message.content, &linked, &message.stickers),
            username: identity.display_name,
            avatar_url: identity.avatar_url,
            files,
            suppress_mentions: true,
            link: LinkButton::new("Jump", message.link(guild_id)),
        };

        let relayed = self
            .platform
            .send_via_webhook(&webhook, payload)
            .await
            .inspect_err(|e| error!("Failed to send pin for message {}: {}", message.id, e))?;

        self.clone_reactions(message, &relayed).await;

        if settings.notify_author {
            self.notify_author(guild_id, message, &relayed).await;
        }

        info!("Pinned message {} in guild {}", message.id, guild_id);
        Ok(relayed)
    }

    /// The configured pin channel, if it still exists in this guild.
    async fn resolve_pin_channel(
        &self,
        guild_id: u64,
        pin_channel: Option<u64>,
    ) -> Result<u64, PinError> {
        let Some(channel_id) = pin_channel else {
            debug!("Pin attempted in guild {} with no pin channel", guild_id);
            return Err(PinError::NoChannelConfigured);
        };

        match self.platform.fetch_channel(channel_id).await {
            Ok(channel) if channel.guild_id == Some(guild_id) => Ok(channel_id),
            Ok(_) => {
                warn!(
                    "Pin channel {} does not belong to guild {}",
                    channel_id, guild_id
                );
                Err(PinError::NoChannelConfigured)
            }
            Err(e) if e.is_not_found() => {
                warn!("Pin channel {} no longer exists", channel_id);
                Err(PinError::NoChannelConfigured)
            }
            Err(e) => Err(e),
        }
    }

    /// Find the bot's webhook in `channel_id`, creating it if absent.
    ///
    /// The oldest bot-owned webhook wins; any others are deleted.
    pub async fn resolve_webhook(&self, channel_id: u64) -> Result<WebhookInfo, PinError> {
        let bot_id = self.platform.bot_user_id();
        let mut owned: Vec<WebhookInfo> = self
            .platform
            .list_webhooks(channel_id)
            .await?
            .into_iter()
            .filter(|w| w.executable && w.owner_id == Some(bot_id))
            .collect();

        if owned.is_empty() {
            info!("Creating pin webhook in channel {}", channel_id);
            return self
                .platform
                .create_webhook(channel_id, &self.webhook_name)
                .await;
        }

        owned.sort_by_key(|w| w.id);
        let keep = owned.remove(0);
        for extra in owned {
            match self
                .platform
                .delete_webhook(extra.id, DUPLICATE_WEBHOOK_REASON)
                .await
            {
                Ok(()) => info!("Removed duplicate pin webhook {}", extra.id),
                Err(e) => warn!("Failed to remove duplicate webhook {}: {}", extra.id, e),
            }
        }
        Ok(keep)
    }

    async fn clone_reactions(&self, source: &SourceMessage, target: &RelayedMessage) {
        let mut cloned = 0usize;
        for reaction in &source.reactions {
            match self
                .platform
                .add_reaction(target.channel_id, target.message_id, &reaction.emoji)
                .await
            {
                Ok(()) => cloned += 1,
                Err(e) => warn!(
                    "Failed to clone reaction {} (unknown emoji or lacking permissions): {}",
                    reaction.emoji, e
                ),
            }
        }
        debug!(
            "Cloned {}/{} reactions onto {}",
            cloned,
            source.reactions.len(),
            target.message_id
        );
    }

    async fn notify_author(
        &self,
        guild_id: u64,
        message: &SourceMessage,
        relayed: &RelayedMessage,
    ) {
        if message.author.bot || message.webhook_id.is_some() {
            return;
        }

        let guild_name = match self.platform.guild_name(guild_id).await {
            Ok(name) => name,
            Err(e) => {
                debug!("Could not resolve name of guild {}: {}", guild_id, e);
                "a server".to_string()
            }
        };

        let notice = DirectNotice {
            content: notification_text(message.created_at, &guild_name),
            link: LinkButton::new("Check it out", relayed.link()),
        };

        match self
            .platform
            .send_direct_message(message.author.id, notice)
            .await
        {
            Ok(()) => debug!("Notified author {} of pin", message.author.id),
            Err(e) => log_failure(&e),
        }
    }
}
