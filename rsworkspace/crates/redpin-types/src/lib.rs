//! Shared types for the redpin pin relay

pub mod decision;
pub mod emoji;
pub mod errors;
pub mod settings;
pub mod types;

pub use decision::{Decision, PinCandidate, SkipReason};
pub use emoji::{extract_emojis, EmojiRef};
pub use errors::{DiscordErrorCode, ErrorCategory, PinError};
pub use settings::GuildSettings;
pub use types::*;
