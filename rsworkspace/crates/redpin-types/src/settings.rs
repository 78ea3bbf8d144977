//! Per-guild pin settings

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

/// Threshold applied to guilds that never configured one.
pub const DEFAULT_REQUIRED_COUNT: u32 = 3;

/// Pin configuration for a single guild.
///
/// Field names are the persisted JSON keys. Missing keys fall back to the
/// same defaults as [`GuildSettings::default`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuildSettings {
    /// Destination channel; `None` disables pinning.
    #[serde(default)]
    pub pin_channel: Option<u64>,
    /// Minimum effective reaction count, always >= 1.
    #[serde(
        default = "default_required_count",
        deserialize_with = "deserialize_required_count"
    )]
    pub required_count: u32,
    /// Whether messages from age-restricted channels may be pinned.
    #[serde(default)]
    pub allow_nsfw_source: bool,
    /// Whether the author's own reaction counts toward the threshold.
    #[serde(default)]
    pub allow_self_pin: bool,
    /// Whether the author gets a DM when their message is pinned.
    #[serde(default = "default_notify_author")]
    pub notify_author: bool,
    /// Emoji identifiers allowed to pin (empty = any emoji).
    #[serde(default)]
    pub emoji_allowlist: BTreeSet<String>,
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            pin_channel: None,
            required_count: DEFAULT_REQUIRED_COUNT,
            allow_nsfw_source: false,
            allow_self_pin: false,
            notify_author: true,
            emoji_allowlist: BTreeSet::new(),
        }
    }
}

impl GuildSettings {
    /// Store a new threshold, clamping anything below 1. Returns the stored value.
    pub fn set_required_count(&mut self, count: i64) -> u32 {
        self.required_count = clamp_required_count(count);
        self.required_count
    }

    /// Re-establish invariants after an arbitrary mutation.
    pub fn normalize(&mut self) {
        if self.required_count < 1 {
            self.required_count = 1;
        }
    }

    /// True if reactions with this emoji identifier may pin messages.
    pub fn allows_emoji(&self, identifier: &str) -> bool {
        self.emoji_allowlist.is_empty() || self.emoji_allowlist.contains(identifier)
    }
}

/// Clamp user input into the valid threshold range `1..=u32::MAX`.
pub fn clamp_required_count(count: i64) -> u32 {
    count.clamp(1, u32::MAX as i64) as u32
}

fn default_required_count() -> u32 {
    DEFAULT_REQUIRED_COUNT
}

fn default_notify_author() -> bool {
    true
}

fn deserialize_required_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(clamp_required_count(raw))
}
