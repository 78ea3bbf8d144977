//! Typed structures exchanged with the chat platform

use serde::{Deserialize, Serialize};

use crate::emoji::EmojiRef;

/// Prefix Discord uses to flag an attachment as a spoiler.
pub const SPOILER_PREFIX: &str = "SPOILER_";

/// Build a jump link to a guild message.
pub fn message_link(guild_id: u64, channel_id: u64, message_id: u64) -> String {
    format!(
        "https://discord.com/channels/{}/{}/{}",
        guild_id, channel_id, message_id
    )
}

/// Message kind, reduced to what matters for relaying.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Regular,
    Reply,
    ChatInputCommand,
    ThreadStarter,
    /// System messages (joins, boosts, pins …).
    Other,
}

impl MessageKind {
    pub fn is_relayable(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

/// Author of a message as seen on the message itself
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageAuthor {
    pub id: u64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub bot: bool,
}

/// Display name and avatar used when impersonating an author
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthorIdentity {
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl AuthorIdentity {
    /// Identity derived from the message author alone (no guild nickname).
    pub fn from_author(author: &MessageAuthor) -> Self {
        Self {
            display_name: author
                .global_name
                .clone()
                .unwrap_or_else(|| author.username.clone()),
            avatar_url: author.avatar_url.clone(),
        }
    }
}

/// Message attachment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentInfo {
    pub id: u64,
    pub filename: String,
    pub url: String,
    pub size: u64,
}

impl AttachmentInfo {
    pub fn is_spoiler(&self) -> bool {
        self.filename.starts_with(SPOILER_PREFIX)
    }
}

/// Sticker attached to a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StickerInfo {
    pub id: u64,
    pub name: String,
    /// Image URL; `None` for formats that have no CDN image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// One distinct reaction on a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactionSummary {
    pub emoji: EmojiRef,
    pub count: u64,
    /// True if the bot itself placed this reaction.
    pub me: bool,
}

/// A fully fetched message that may be relayed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceMessage {
    pub id: u64,
    pub channel_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
    pub author: MessageAuthor,
    pub content: String,
    pub kind: MessageKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<u64>,
    /// Creation time, unix seconds.
    pub created_at: i64,
    #[serde(default)]
    pub attachments: Vec<AttachmentInfo>,
    #[serde(default)]
    pub stickers: Vec<StickerInfo>,
    #[serde(default)]
    pub reactions: Vec<ReactionSummary>,
}

impl SourceMessage {
    /// True if any reaction on the message was placed by the bot.
    pub fn is_marked(&self) -> bool {
        self.reactions.iter().any(|r| r.me)
    }

    pub fn link(&self, guild_id: u64) -> String {
        message_link(guild_id, self.channel_id, self.id)
    }
}

/// Channel facts needed by qualification
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
    /// Age-restricted; threads report their parent's flag.
    pub nsfw: bool,
}

/// Channel webhook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookInfo {
    pub id: u64,
    pub channel_id: u64,
    /// User that created the webhook, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<u64>,
    /// False when the platform did not hand out a token (not executable).
    pub executable: bool,
}

/// A URL button attached to an outgoing message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

impl LinkButton {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }
}

/// File to upload alongside a webhook message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Everything sent through the relay webhook
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookPayload {
    pub content: String,
    pub username: String,
    pub avatar_url: Option<String>,
    pub files: Vec<UploadFile>,
    pub suppress_mentions: bool,
    pub link: LinkButton,
}

/// The copy created in the pin channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayedMessage {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
}

impl RelayedMessage {
    pub fn link(&self) -> String {
        message_link(self.guild_id, self.channel_id, self.message_id)
    }
}

/// Private notification sent to a pinned message's author
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectNotice {
    pub content: String,
    pub link: LinkButton,
}

/// A reaction-added gateway event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReactionEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<u64>,
    pub channel_id: u64,
    pub message_id: u64,
    pub user_id: u64,
    /// Reacting account is automated.
    pub member_is_bot: bool,
    pub emoji: EmojiRef,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn author() -> MessageAuthor {
        MessageAuthor {
            id: 1,
            username: "alice".to_string(),
            global_name: None,
            avatar_url: None,
            bot: false,
        }
    }

    #[test]
    fn test_message_link_format() {
        assert_eq!(
            message_link(1, 2, 3),
            "https://discord.com/channels/1/2/3"
        );
    }

    #[test]
    fn test_spoiler_detection() {
        let mut a = AttachmentInfo {
            id: 1,
            filename: "SPOILER_cat.png".to_string(),
            url: "https://cdn/x".to_string(),
            size: 10,
        };
        assert!(a.is_spoiler());
        a.filename = "cat.png".to_string();
        assert!(!a.is_spoiler());
    }

    #[test]
    fn test_is_marked() {
        let mut msg = SourceMessage {
            id: 10,
            channel_id: 20,
            guild_id: Some(30),
            author: author(),
            content: String::new(),
            kind: MessageKind::Regular,
            webhook_id: None,
            created_at: 0,
            attachments: vec![],
            stickers: vec![],
            reactions: vec![ReactionSummary {
                emoji: EmojiRef::unicode("⭐"),
                count: 4,
                me: false,
            }],
        };
        assert!(!msg.is_marked());
        msg.reactions.push(ReactionSummary {
            emoji: EmojiRef::unicode("📌"),
            count: 1,
            me: true,
        });
        assert!(msg.is_marked());
        assert_eq!(msg.link(30), "https://discord.com/channels/30/20/10");
    }

    #[test]
    fn test_identity_from_author_prefers_global_name() {
        let mut a = author();
        assert_eq!(AuthorIdentity::from_author(&a).display_name, "alice");
        a.global_name = Some("Alice A.".to_string());
        assert_eq!(AuthorIdentity::from_author(&a).display_name, "Alice A.");
    }

    #[test]
    fn test_message_kind_relayable() {
        assert!(MessageKind::Regular.is_relayable());
        assert!(MessageKind::Reply.is_relayable());
        assert!(MessageKind::ChatInputCommand.is_relayable());
        assert!(MessageKind::ThreadStarter.is_relayable());
        assert!(!MessageKind::Other.is_relayable());
    }
}
