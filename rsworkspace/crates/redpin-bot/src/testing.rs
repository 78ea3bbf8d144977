//! In-memory platform used by the pipeline tests

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use redpin_types::{
    AttachmentInfo, AuthorIdentity, ChannelInfo, DirectNotice, EmojiRef, MessageAuthor,
    MessageKind, PinError, ReactionEvent, ReactionSummary, RelayedMessage, SourceMessage,
    WebhookInfo, WebhookPayload,
};
use tempfile::TempDir;

use crate::platform::{file_size_limit_for_tier, Platform};
use crate::store::GuildSettingsStore;

pub const GUILD: u64 = 1;
pub const SOURCE_CHANNEL: u64 = 10;
pub const PIN_CHANNEL: u64 = 20;
pub const NSFW_CHANNEL: u64 = 30;
pub const OTHER_GUILD_CHANNEL: u64 = 40;
pub const BOT: u64 = 999;
pub const AUTHOR: u64 = 5;
pub const MESSAGE: u64 = 100;

#[derive(Default)]
pub struct FakeState {
    pub messages: HashMap<(u64, u64), SourceMessage>,
    pub channels: HashMap<u64, ChannelInfo>,
    /// (message id, emoji identifier) → user ids
    pub reaction_users: HashMap<(u64, String), Vec<u64>>,
    pub webhooks: Vec<WebhookInfo>,
    pub webhook_owners: HashMap<u64, u64>,
    pub downloads: HashMap<String, Vec<u8>>,
    pub guild_names: HashMap<u64, String>,
    pub nicknames: HashMap<u64, String>,
    pub file_size_limit: u64,

    pub added_reactions: Vec<(u64, u64, EmojiRef)>,
    pub sent: Vec<(u64, WebhookPayload)>,
    pub created_webhooks: Vec<u64>,
    pub deleted_webhooks: Vec<(u64, String)>,
    pub dms: Vec<(u64, DirectNotice)>,
    pub reaction_user_calls: usize,

    /// Emoji identifiers whose reaction calls fail with missing permissions.
    pub failing_reactions: HashSet<String>,
    pub failing_downloads: HashSet<String>,
    pub fail_send: bool,
    pub fail_dm: bool,
    /// Returned by every webhook owner lookup when set.
    pub failing_webhook_lookup: Option<PinError>,

    next_id: u64,
}

pub struct FakePlatform {
    bot_id: u64,
    state: Mutex<FakeState>,
}

impl FakePlatform {
    /// Guild 1 with a source channel, a pin channel and an NSFW channel,
    /// plus one channel belonging to another guild.
    pub fn new() -> Self {
        let mut state = FakeState {
            file_size_limit: file_size_limit_for_tier(0),
            next_id: 5000,
            ..FakeState::default()
        };
        for (id, guild, nsfw) in [
            (SOURCE_CHANNEL, GUILD, false),
            (PIN_CHANNEL, GUILD, false),
            (NSFW_CHANNEL, GUILD, true),
            (OTHER_GUILD_CHANNEL, 2, false),
        ] {
            state.channels.insert(
                id,
                ChannelInfo {
                    id,
                    guild_id: Some(guild),
                    nsfw,
                },
            );
        }
        state.guild_names.insert(GUILD, "Test Guild".to_string());
        Self {
            bot_id: BOT,
            state: Mutex::new(state),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn insert_message(&self, message: SourceMessage) {
        self.state()
            .messages
            .insert((message.channel_id, message.id), message);
    }

    pub fn set_reaction_users(&self, message_id: u64, emoji: &EmojiRef, users: Vec<u64>) {
        self.state()
            .reaction_users
            .insert((message_id, emoji.identifier()), users);
    }

    pub fn message(&self, channel_id: u64, message_id: u64) -> SourceMessage {
        self.state().messages[&(channel_id, message_id)].clone()
    }

    fn next_id(&self) -> u64 {
        let mut state = self.state();
        state.next_id += 1;
        state.next_id
    }
}

fn not_found(context: &str) -> PinError {
    PinError::NotFound {
        context: context.to_string(),
        message: "unknown".to_string(),
    }
}

#[async_trait]
impl Platform for FakePlatform {
    fn bot_user_id(&self) -> u64 {
        self.bot_id
    }

    async fn fetch_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<SourceMessage, PinError> {
        tokio::task::yield_now().await;
        self.state()
            .messages
            .get(&(channel_id, message_id))
            .cloned()
            .ok_or_else(|| not_found("fetching message"))
    }

    async fn fetch_channel(&self, channel_id: u64) -> Result<ChannelInfo, PinError> {
        tokio::task::yield_now().await;
        self.state()
            .channels
            .get(&channel_id)
            .cloned()
            .ok_or_else(|| not_found("fetching channel"))
    }

    async fn guild_name(&self, guild_id: u64) -> Result<String, PinError> {
        self.state()
            .guild_names
            .get(&guild_id)
            .cloned()
            .ok_or_else(|| not_found("fetching guild"))
    }

    async fn file_size_limit(&self, _guild_id: u64) -> Result<u64, PinError> {
        Ok(self.state().file_size_limit)
    }

    async fn author_identity(
        &self,
        _guild_id: u64,
        author: &MessageAuthor,
    ) -> Result<AuthorIdentity, PinError> {
        let mut identity = AuthorIdentity::from_author(author);
        if let Some(nick) = self.state().nicknames.get(&author.id) {
            identity.display_name = nick.clone();
        }
        Ok(identity)
    }

    async fn webhook_owner(&self, webhook_id: u64) -> Result<Option<u64>, PinError> {
        let state = self.state();
        if let Some(e) = &state.failing_webhook_lookup {
            return Err(e.clone());
        }
        Ok(state.webhook_owners.get(&webhook_id).copied())
    }

    async fn add_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        emoji: &EmojiRef,
    ) -> Result<(), PinError> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        if state.failing_reactions.contains(&emoji.identifier()) {
            return Err(PinError::PermissionDenied {
                context: "adding reaction".to_string(),
                message: "Missing Permissions".to_string(),
            });
        }
        state
            .added_reactions
            .push((channel_id, message_id, emoji.clone()));
        if let Some(message) = state.messages.get_mut(&(channel_id, message_id)) {
            match message.reactions.iter_mut().find(|r| &r.emoji == emoji) {
                Some(existing) if !existing.me => {
                    existing.count += 1;
                    existing.me = true;
                }
                Some(_) => {}
                None => message.reactions.push(ReactionSummary {
                    emoji: emoji.clone(),
                    count: 1,
                    me: true,
                }),
            }
        }
        Ok(())
    }

    async fn reaction_user_ids(
        &self,
        _channel_id: u64,
        message_id: u64,
        emoji: &EmojiRef,
    ) -> Result<Vec<u64>, PinError> {
        tokio::task::yield_now().await;
        let mut state = self.state();
        state.reaction_user_calls += 1;
        Ok(state
            .reaction_users
            .get(&(message_id, emoji.identifier()))
            .cloned()
            .unwrap_or_default())
    }

    async fn list_webhooks(&self, channel_id: u64) -> Result<Vec<WebhookInfo>, PinError> {
        tokio::task::yield_now().await;
        Ok(self
            .state()
            .webhooks
            .iter()
            .filter(|w| w.channel_id == channel_id)
            .cloned()
            .collect())
    }

    async fn create_webhook(&self, channel_id: u64, _name: &str) -> Result<WebhookInfo, PinError> {
        let webhook = WebhookInfo {
            id: self.next_id(),
            channel_id,
            owner_id: Some(self.bot_id),
            executable: true,
        };
        let mut state = self.state();
        state.webhooks.push(webhook.clone());
        state.created_webhooks.push(channel_id);
        Ok(webhook)
    }

    async fn delete_webhook(&self, webhook_id: u64, reason: &str) -> Result<(), PinError> {
        let mut state = self.state();
        state.webhooks.retain(|w| w.id != webhook_id);
        state
            .deleted_webhooks
            .push((webhook_id, reason.to_string()));
        Ok(())
    }

    async fn download_attachment(&self, attachment: &AttachmentInfo) -> Result<Vec<u8>, PinError> {
        let state = self.state();
        if state.failing_downloads.contains(&attachment.url) {
            return Err(PinError::transient("downloading attachment", "timeout"));
        }
        Ok(state
            .downloads
            .get(&attachment.url)
            .cloned()
            .unwrap_or_default())
    }

    async fn send_via_webhook(
        &self,
        webhook: &WebhookInfo,
        payload: WebhookPayload,
    ) -> Result<RelayedMessage, PinError> {
        tokio::task::yield_now().await;
        if self.state().fail_send {
            return Err(PinError::transient("executing webhook", "HTTP 500"));
        }
        let message_id = self.next_id();
        let mut state = self.state();
        let guild_id = state
            .channels
            .get(&webhook.channel_id)
            .and_then(|c| c.guild_id)
            .unwrap_or_default();
        state.sent.push((webhook.id, payload));
        Ok(RelayedMessage {
            guild_id,
            channel_id: webhook.channel_id,
            message_id,
        })
    }

    async fn send_direct_message(
        &self,
        user_id: u64,
        notice: DirectNotice,
    ) -> Result<(), PinError> {
        let mut state = self.state();
        if state.fail_dm {
            return Err(PinError::RecipientUnreachable {
                context: "sending DM".to_string(),
                message: "Cannot send messages to this user".to_string(),
            });
        }
        state.dms.push((user_id, notice));
        Ok(())
    }
}

pub fn author() -> MessageAuthor {
    MessageAuthor {
        id: AUTHOR,
        username: "alice".to_string(),
        global_name: Some("Alice".to_string()),
        avatar_url: Some("https://cdn.discordapp.com/avatars/5/a.png".to_string()),
        bot: false,
    }
}

pub fn reaction(emoji: &str, count: u64) -> ReactionSummary {
    ReactionSummary {
        emoji: EmojiRef::unicode(emoji),
        count,
        me: false,
    }
}

pub fn source_message(reactions: Vec<ReactionSummary>) -> SourceMessage {
    SourceMessage {
        id: MESSAGE,
        channel_id: SOURCE_CHANNEL,
        guild_id: Some(GUILD),
        author: author(),
        content: "hello world".to_string(),
        kind: MessageKind::Regular,
        webhook_id: None,
        created_at: 1_700_000_000,
        attachments: vec![],
        stickers: vec![],
        reactions,
    }
}

pub fn reaction_event(emoji: &str) -> ReactionEvent {
    ReactionEvent {
        guild_id: Some(GUILD),
        channel_id: SOURCE_CHANNEL,
        message_id: MESSAGE,
        user_id: 77,
        member_is_bot: false,
        emoji: EmojiRef::unicode(emoji),
    }
}

/// A store in a temp directory; keep the `TempDir` alive for the test.
pub fn temp_store() -> (TempDir, Arc<GuildSettingsStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = GuildSettingsStore::open(dir.path().join("config.json")).unwrap();
    (dir, Arc::new(store))
}

pub fn marker() -> EmojiRef {
    EmojiRef::unicode("📌")
}
