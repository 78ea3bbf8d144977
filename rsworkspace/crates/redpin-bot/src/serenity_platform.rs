//! `Platform` implementation backed by serenity's HTTP client

#[path = "serenity_platform_tests.rs"]
mod serenity_platform_tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use redpin_types::{
    AttachmentInfo, AuthorIdentity, ChannelInfo, DirectNotice, EmojiRef, LinkButton,
    MessageAuthor, MessageKind, PinError, ReactionSummary, RelayedMessage, SourceMessage,
    StickerInfo, WebhookInfo, WebhookPayload,
};
use serenity::builder::{
    CreateActionRow, CreateAllowedMentions, CreateAttachment, CreateButton, CreateMessage,
    CreateWebhook, ExecuteWebhook,
};
use serenity::http::Http;
use serenity::model::channel::{Channel, Message, MessageType, ReactionType};
use serenity::model::guild::PremiumTier;
use serenity::model::id::{ChannelId, EmojiId, GuildId, MessageId, UserId, WebhookId};
use serenity::model::user::User;
use serenity::model::webhook::Webhook;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::classify;
use crate::platform::{file_size_limit_for_tier, Platform};

/// Maximum page size of the reaction users endpoint.
const REACTION_PAGE: u8 = 100;

pub struct SerenityPlatform {
    http: Arc<Http>,
    client: reqwest::Client,
    bot_user_id: AtomicU64,
    /// Webhooks seen by `list_webhooks`/`create_webhook`, kept with their tokens.
    webhooks: RwLock<HashMap<u64, Webhook>>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>, client: reqwest::Client) -> Self {
        Self {
            http,
            client,
            bot_user_id: AtomicU64::new(0),
            webhooks: RwLock::new(HashMap::new()),
        }
    }

    /// Record the bot's own id once the gateway is ready.
    pub fn set_bot_user_id(&self, id: u64) {
        self.bot_user_id.store(id, Ordering::Relaxed);
    }

    async fn remember(&self, webhook: &Webhook) -> WebhookInfo {
        let info = webhook_info(webhook);
        self.webhooks
            .write()
            .await
            .insert(info.id, webhook.clone());
        info
    }

    async fn webhook(&self, id: u64) -> Result<Webhook, PinError> {
        if let Some(webhook) = self.webhooks.read().await.get(&id) {
            return Ok(webhook.clone());
        }
        let webhook = self
            .http
            .get_webhook(WebhookId::new(id))
            .await
            .map_err(|e| classify("fetching webhook", &e))?;
        self.remember(&webhook).await;
        Ok(webhook)
    }
}

pub fn emoji_to_reaction_type(emoji: &EmojiRef) -> ReactionType {
    match emoji {
        EmojiRef::Unicode { name } => ReactionType::Unicode(name.clone()),
        EmojiRef::Custom { id, name, animated } => ReactionType::Custom {
            animated: *animated,
            id: EmojiId::new(*id),
            name: name.clone(),
        },
    }
}

pub fn reaction_type_to_emoji(reaction: &ReactionType) -> EmojiRef {
    match reaction {
        ReactionType::Custom { animated, id, name } => EmojiRef::Custom {
            id: id.get(),
            name: name.clone(),
            animated: *animated,
        },
        ReactionType::Unicode(name) => EmojiRef::unicode(name.clone()),
        other => EmojiRef::unicode(other.to_string()),
    }
}

pub fn message_kind(kind: MessageType) -> MessageKind {
    match kind {
        MessageType::Regular => MessageKind::Regular,
        MessageType::InlineReply => MessageKind::Reply,
        MessageType::ChatInputCommand => MessageKind::ChatInputCommand,
        MessageType::ThreadStarterMessage => MessageKind::ThreadStarter,
        _ => MessageKind::Other,
    }
}

pub fn message_author(user: &User) -> MessageAuthor {
    MessageAuthor {
        id: user.id.get(),
        username: user.name.clone(),
        global_name: user.global_name.clone(),
        avatar_url: Some(user.face()),
        bot: user.bot,
    }
}

pub fn source_message(msg: &Message) -> SourceMessage {
    SourceMessage {
        id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        guild_id: msg.guild_id.map(|g| g.get()),
        author: message_author(&msg.author),
        content: msg.content.clone(),
        kind: message_kind(msg.kind),
        webhook_id: msg.webhook_id.map(|w| w.get()),
        created_at: msg.timestamp.unix_timestamp(),
        attachments: msg
            .attachments
            .iter()
            .map(|a| AttachmentInfo {
                id: a.id.get(),
                filename: a.filename.clone(),
                url: a.url.clone(),
                size: u64::from(a.size),
            })
            .collect(),
        stickers: msg
            .sticker_items
            .iter()
            .map(|s| StickerInfo {
                id: s.id.get(),
                name: s.name.clone(),
                url: s.image_url(),
            })
            .collect(),
        reactions: msg
            .reactions
            .iter()
            .map(|r| ReactionSummary {
                emoji: reaction_type_to_emoji(&r.reaction_type),
                count: r.count,
                me: r.me,
            })
            .collect(),
    }
}

fn webhook_info(webhook: &Webhook) -> WebhookInfo {
    WebhookInfo {
        id: webhook.id.get(),
        channel_id: webhook.channel_id.map(|c| c.get()).unwrap_or_default(),
        owner_id: webhook.user.as_ref().map(|u| u.id.get()),
        executable: webhook.token.is_some(),
    }
}

fn link_row(link: &LinkButton) -> CreateActionRow {
    CreateActionRow::Buttons(vec![
        CreateButton::new_link(link.url.clone()).label(link.label.clone())
    ])
}

#[async_trait]
impl Platform for SerenityPlatform {
    fn bot_user_id(&self) -> u64 {
        self.bot_user_id.load(Ordering::Relaxed)
    }

    async fn fetch_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<SourceMessage, PinError> {
        let msg = self
            .http
            .get_message(ChannelId::new(channel_id), MessageId::new(message_id))
            .await
            .map_err(|e| classify("fetching message", &e))?;
        Ok(source_message(&msg))
    }

    async fn fetch_channel(&self, channel_id: u64) -> Result<ChannelInfo, PinError> {
        let channel = self
            .http
            .get_channel(ChannelId::new(channel_id))
            .await
            .map_err(|e| classify("fetching channel", &e))?;

        let Channel::Guild(channel) = channel else {
            return Ok(ChannelInfo {
                id: channel_id,
                guild_id: None,
                nsfw: false,
            });
        };

        let nsfw = match (channel.thread_metadata.is_some(), channel.parent_id) {
            (true, Some(parent_id)) => match self.http.get_channel(parent_id).await {
                Ok(Channel::Guild(parent)) => parent.nsfw,
                Ok(_) => false,
                Err(e) => return Err(classify("fetching thread parent", &e)),
            },
            _ => channel.nsfw,
        };

        Ok(ChannelInfo {
            id: channel_id,
            guild_id: Some(channel.guild_id.get()),
            nsfw,
        })
    }

    async fn guild_name(&self, guild_id: u64) -> Result<String, PinError> {
        let guild = self
            .http
            .get_guild(GuildId::new(guild_id))
            .await
            .map_err(|e| classify("fetching guild", &e))?;
        Ok(guild.name)
    }

    async fn file_size_limit(&self, guild_id: u64) -> Result<u64, PinError> {
        let guild = self
            .http
            .get_guild(GuildId::new(guild_id))
            .await
            .map_err(|e| classify("fetching guild", &e))?;
        let tier = match guild.premium_tier {
            PremiumTier::Tier1 => 1,
            PremiumTier::Tier2 => 2,
            PremiumTier::Tier3 => 3,
            _ => 0,
        };
        Ok(file_size_limit_for_tier(tier))
    }

    async fn author_identity(
        &self,
        guild_id: u64,
        author: &MessageAuthor,
    ) -> Result<AuthorIdentity, PinError> {
        let member = self
            .http
            .get_member(GuildId::new(guild_id), UserId::new(author.id))
            .await
            .map_err(|e| classify("fetching member", &e))?;

        let fallback = AuthorIdentity::from_author(author);
        Ok(AuthorIdentity {
            display_name: member.nick.clone().unwrap_or(fallback.display_name),
            avatar_url: Some(member.face()),
        })
    }

    async fn webhook_owner(&self, webhook_id: u64) -> Result<Option<u64>, PinError> {
        let webhook = self.webhook(webhook_id).await?;
        Ok(webhook.user.as_ref().map(|u| u.id.get()))
    }

    async fn add_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        emoji: &EmojiRef,
    ) -> Result<(), PinError> {
        self.http
            .create_reaction(
                ChannelId::new(channel_id),
                MessageId::new(message_id),
                &emoji_to_reaction_type(emoji),
            )
            .await
            .map_err(|e| classify("adding reaction", &e))
    }

    async fn reaction_user_ids(
        &self,
        channel_id: u64,
        message_id: u64,
        emoji: &EmojiRef,
    ) -> Result<Vec<u64>, PinError> {
        let reaction = emoji_to_reaction_type(emoji);
        let mut ids = Vec::new();
        let mut after = None;

        loop {
            let page = self
                .http
                .get_reaction_users(
                    ChannelId::new(channel_id),
                    MessageId::new(message_id),
                    &reaction,
                    REACTION_PAGE,
                    after,
                )
                .await
                .map_err(|e| classify("listing reaction users", &e))?;

            let full = page.len() == usize::from(REACTION_PAGE);
            ids.extend(page.iter().map(|u| u.id.get()));
            after = page.last().map(|u| u.id.get());
            if !full || after.is_none() {
                break;
            }
        }

        debug!("Fetched {} users for reaction {} on {}", ids.len(), emoji, message_id);
        Ok(ids)
    }

    async fn list_webhooks(&self, channel_id: u64) -> Result<Vec<WebhookInfo>, PinError> {
        let webhooks = self
            .http
            .get_channel_webhooks(ChannelId::new(channel_id))
            .await
            .map_err(|e| classify("listing webhooks", &e))?;

        let mut infos = Vec::with_capacity(webhooks.len());
        for webhook in &webhooks {
            infos.push(self.remember(webhook).await);
        }
        Ok(infos)
    }

    async fn create_webhook(&self, channel_id: u64, name: &str) -> Result<WebhookInfo, PinError> {
        let webhook = ChannelId::new(channel_id)
            .create_webhook(&*self.http, CreateWebhook::new(name))
            .await
            .map_err(|e| classify("creating webhook", &e))?;
        Ok(self.remember(&webhook).await)
    }

    async fn delete_webhook(&self, webhook_id: u64, reason: &str) -> Result<(), PinError> {
        self.http
            .delete_webhook(WebhookId::new(webhook_id), Some(reason))
            .await
            .map_err(|e| classify("deleting webhook", &e))?;
        self.webhooks.write().await.remove(&webhook_id);
        Ok(())
    }

    async fn download_attachment(&self, attachment: &AttachmentInfo) -> Result<Vec<u8>, PinError> {
        let context = "downloading attachment";
        let response = self
            .client
            .get(&attachment.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PinError::transient(context, e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PinError::transient(context, e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn send_via_webhook(
        &self,
        webhook: &WebhookInfo,
        payload: WebhookPayload,
    ) -> Result<RelayedMessage, PinError> {
        let hook = self.webhook(webhook.id).await?;

        let mut builder = ExecuteWebhook::new()
            .content(payload.content)
            .username(payload.username)
            .components(vec![link_row(&payload.link)])
            .add_files(
                payload
                    .files
                    .into_iter()
                    .map(|f| CreateAttachment::bytes(f.data, f.filename)),
            );
        if let Some(avatar_url) = payload.avatar_url {
            builder = builder.avatar_url(avatar_url);
        }
        if payload.suppress_mentions {
            builder = builder.allowed_mentions(CreateAllowedMentions::new());
        }

        let sent = hook
            .execute(&*self.http, true, builder)
            .await
            .map_err(|e| classify("executing webhook", &e))?
            .ok_or_else(|| PinError::transient("executing webhook", "no message returned"))?;

        let guild_id = match hook.guild_id.or(sent.guild_id) {
            Some(id) => id.get(),
            None => self
                .fetch_channel(webhook.channel_id)
                .await?
                .guild_id
                .unwrap_or_default(),
        };

        Ok(RelayedMessage {
            guild_id,
            channel_id: sent.channel_id.get(),
            message_id: sent.id.get(),
        })
    }

    async fn send_direct_message(
        &self,
        user_id: u64,
        notice: DirectNotice,
    ) -> Result<(), PinError> {
        let message = CreateMessage::new()
            .content(notice.content)
            .components(vec![link_row(&notice.link)]);
        UserId::new(user_id)
            .direct_message(&*self.http, message)
            .await
            .map_err(|e| classify("sending direct message", &e))?;
        Ok(())
    }
}
