//! Outcome of evaluating a reaction event

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::emoji::EmojiRef;
use crate::types::SourceMessage;

/// A message that met every pin condition
#[derive(Debug, Clone, PartialEq)]
pub struct PinCandidate {
    pub guild_id: u64,
    pub message: SourceMessage,
    /// First qualifying reaction in platform order.
    pub reaction: EmojiRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Qualifies(Box<PinCandidate>),
    Skip(SkipReason),
}

/// Why a reaction event did not lead to a pin
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    DirectMessage,
    BotReactor,
    NoPinChannel,
    InPinChannel,
    AgeRestricted,
    AlreadyPinned,
    Unpinnable,
    BelowThreshold,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::DirectMessage => "reaction in DMs",
            Self::BotReactor => "reaction from a bot",
            Self::NoPinChannel => "guild has no pin channel",
            Self::InPinChannel => "reaction in the pin channel",
            Self::AgeRestricted => "reaction in an age-restricted channel",
            Self::AlreadyPinned => "message already pinned",
            Self::Unpinnable => "message cannot be relayed",
            Self::BelowThreshold => "no allowed reaction reached the threshold",
        };
        f.write_str(text)
    }
}
