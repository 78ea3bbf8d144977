//! Chat-platform operations the pin pipeline depends on

use async_trait::async_trait;
use redpin_types::{
    AttachmentInfo, AuthorIdentity, ChannelInfo, DirectNotice, EmojiRef, MessageAuthor, PinError,
    RelayedMessage, SourceMessage, WebhookInfo, WebhookPayload,
};

/// Every platform call made by qualification, broadcasting and the
/// settings commands. Each call is a suspension point; none is atomic
/// with any other.
#[async_trait]
pub trait Platform: Send + Sync + 'static {
    /// The bot's own user id (0 until the gateway reported ready).
    fn bot_user_id(&self) -> u64;

    async fn fetch_message(&self, channel_id: u64, message_id: u64)
        -> Result<SourceMessage, PinError>;

    async fn fetch_channel(&self, channel_id: u64) -> Result<ChannelInfo, PinError>;

    async fn guild_name(&self, guild_id: u64) -> Result<String, PinError>;

    /// Upload ceiling in bytes for the guild.
    async fn file_size_limit(&self, guild_id: u64) -> Result<u64, PinError>;

    async fn author_identity(
        &self,
        guild_id: u64,
        author: &MessageAuthor,
    ) -> Result<AuthorIdentity, PinError>;

    /// Creator of a webhook, `None` if unknown.
    async fn webhook_owner(&self, webhook_id: u64) -> Result<Option<u64>, PinError>;

    async fn add_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        emoji: &EmojiRef,
    ) -> Result<(), PinError>;

    async fn reaction_user_ids(
        &self,
        channel_id: u64,
        message_id: u64,
        emoji: &EmojiRef,
    ) -> Result<Vec<u64>, PinError>;

    async fn list_webhooks(&self, channel_id: u64) -> Result<Vec<WebhookInfo>, PinError>;

    async fn create_webhook(&self, channel_id: u64, name: &str) -> Result<WebhookInfo, PinError>;

    async fn delete_webhook(&self, webhook_id: u64, reason: &str) -> Result<(), PinError>;

    async fn download_attachment(&self, attachment: &AttachmentInfo) -> Result<Vec<u8>, PinError>;

    async fn send_via_webhook(
        &self,
        webhook: &WebhookInfo,
        payload: WebhookPayload,
    ) -> Result<RelayedMessage, PinError>;

    async fn send_direct_message(&self, user_id: u64, notice: DirectNotice)
        -> Result<(), PinError>;
}

/// Upload ceiling for a guild boost tier.
pub fn file_size_limit_for_tier(tier: u8) -> u64 {
    const MIB: u64 = 1024 * 1024;
    match tier {
        2 => 50 * MIB,
        3 => 100 * MIB,
        _ => 25 * MIB,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_size_limit_for_tier() {
        assert_eq!(file_size_limit_for_tier(0), 26_214_400);
        assert_eq!(file_size_limit_for_tier(1), 26_214_400);
        assert_eq!(file_size_limit_for_tier(2), 52_428_800);
        assert_eq!(file_size_limit_for_tier(3), 104_857_600);
    }
}
