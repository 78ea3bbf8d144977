//! Error taxonomy for the pin relay.
//!
//! Discord JSON error codes are classified into a small set of categories,
//! and every failed platform call surfaces as a [`PinError`].

use serde::{Deserialize, Serialize};

/// High-level category of a Discord API error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Rate limit hit.
    RateLimit,
    /// Target resource (channel, message, webhook …) not found.
    NotFound,
    /// Insufficient bot permissions for the requested action.
    PermissionDenied,
    /// The user does not accept direct messages from the bot.
    RecipientBlocked,
    /// Malformed or semantically invalid input.
    InvalidInput,
    /// Unknown or uncategorised error.
    Unknown,
}

/// Discord JSON error codes relevant to relaying pins.
///
/// See <https://discord.com/developers/docs/topics/opcodes-and-status-codes#json>;
/// everything else falls through to [`DiscordErrorCode::Unknown`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscordErrorCode {
    // ── Not found ─────────────────────────────────────────────────────────────
    /// 10003: Unknown channel.
    UnknownChannel,
    /// 10004: Unknown guild.
    UnknownGuild,
    /// 10007: Unknown member.
    UnknownMember,
    /// 10008: Unknown message (likely deleted).
    UnknownMessage,
    /// 10013: Unknown user.
    UnknownUser,
    /// 10014: Unknown emoji.
    UnknownEmoji,
    /// 10015: Unknown webhook.
    UnknownWebhook,

    // ── Permission errors ──────────────────────────────────────────────────────
    /// 50001: Missing access.
    MissingAccess,
    /// 50013: Missing permissions.
    MissingPermissions,
    /// 50007: Cannot send messages to this user.
    CannotSendToUser,
    /// 90001: Reaction blocked (the author blocked the bot).
    ReactionBlocked,

    // ── Rate limiting ──────────────────────────────────────────────────────────
    /// HTTP 429.
    RateLimited,

    // ── Input / limits ─────────────────────────────────────────────────────────
    /// 50006: Cannot send an empty message.
    CannotSendEmptyMessage,
    /// 50035: Invalid form body.
    InvalidFormBody,
    /// 40005: Request entity too large.
    RequestEntityTooLarge,
    /// 30007: Maximum number of webhooks reached.
    MaxWebhooksReached,
    /// 30010: Maximum number of reactions reached.
    MaxReactionsReached,

    /// 130000: API resource overloaded.
    ApiOverloaded,
    /// Any Discord JSON error code not listed above.
    Unknown,
}

impl DiscordErrorCode {
    /// Derive the code from a raw Discord JSON error code integer.
    pub fn from_raw(code: u32) -> Self {
        match code {
            10003 => Self::UnknownChannel,
            10004 => Self::UnknownGuild,
            10007 => Self::UnknownMember,
            10008 => Self::UnknownMessage,
            10013 => Self::UnknownUser,
            10014 => Self::UnknownEmoji,
            10015 => Self::UnknownWebhook,
            30007 => Self::MaxWebhooksReached,
            30010 => Self::MaxReactionsReached,
            40005 => Self::RequestEntityTooLarge,
            50001 => Self::MissingAccess,
            50006 => Self::CannotSendEmptyMessage,
            50007 => Self::CannotSendToUser,
            50013 => Self::MissingPermissions,
            50035 => Self::InvalidFormBody,
            90001 => Self::ReactionBlocked,
            130000 => Self::ApiOverloaded,
            _ => Self::Unknown,
        }
    }

    /// The high-level category for this code.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownChannel
            | Self::UnknownGuild
            | Self::UnknownMember
            | Self::UnknownMessage
            | Self::UnknownUser
            | Self::UnknownEmoji
            | Self::UnknownWebhook => ErrorCategory::NotFound,

            Self::MissingAccess | Self::MissingPermissions | Self::ReactionBlocked => {
                ErrorCategory::PermissionDenied
            }

            Self::CannotSendToUser => ErrorCategory::RecipientBlocked,

            Self::RateLimited => ErrorCategory::RateLimit,

            Self::CannotSendEmptyMessage
            | Self::InvalidFormBody
            | Self::RequestEntityTooLarge
            | Self::MaxWebhooksReached
            | Self::MaxReactionsReached => ErrorCategory::InvalidInput,

            Self::ApiOverloaded | Self::Unknown => ErrorCategory::Unknown,
        }
    }
}

/// Failure of a pin-pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PinError {
    /// The guild has no usable pin channel.
    #[error("no pin channel configured")]
    NoChannelConfigured,
    /// A platform call failed; the attempt is abandoned.
    #[error("{context} failed: {message}")]
    TransientDeliveryFailure { context: String, message: String },
    /// The bot lacks rights for the step.
    #[error("{context} failed: missing permissions ({message})")]
    PermissionDenied { context: String, message: String },
    /// The author cannot receive direct messages.
    #[error("{context} failed: recipient unreachable ({message})")]
    RecipientUnreachable { context: String, message: String },
    /// The target resource no longer exists.
    #[error("{context} failed: not found ({message})")]
    NotFound { context: String, message: String },
    /// The message is of a kind that must not be relayed.
    #[error("message cannot be pinned: {0}")]
    Ineligible(String),
}

impl PinError {
    pub fn transient(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientDeliveryFailure {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Map a classified Discord error onto the taxonomy.
    pub fn from_discord(context: &str, code: &DiscordErrorCode, message: &str) -> Self {
        let context = context.to_string();
        let message = message.to_string();
        match code.category() {
            ErrorCategory::PermissionDenied => Self::PermissionDenied { context, message },
            ErrorCategory::RecipientBlocked => Self::RecipientUnreachable { context, message },
            ErrorCategory::NotFound => Self::NotFound { context, message },
            _ => Self::TransientDeliveryFailure { context, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
