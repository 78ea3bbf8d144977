//! Emoji identity shared by reactions, the allowlist and the pin marker

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A reaction emoji, either a unicode codepoint sequence or a guild emoji.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmojiRef {
    Unicode {
        name: String,
    },
    Custom {
        id: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        animated: bool,
    },
}

impl EmojiRef {
    pub fn unicode(name: impl Into<String>) -> Self {
        Self::Unicode { name: name.into() }
    }

    /// Identifier used by the allowlist: the emoji itself for unicode,
    /// the snowflake id for custom emoji.
    pub fn identifier(&self) -> String {
        match self {
            Self::Unicode { name } => name.clone(),
            Self::Custom { id, .. } => id.to_string(),
        }
    }
}

impl fmt::Display for EmojiRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unicode { name } => f.write_str(name),
            Self::Custom { id, name, animated } => {
                let prefix = if *animated { "a" } else { "" };
                write!(f, "<{}:{}:{}>", prefix, name.as_deref().unwrap_or("_"), id)
            }
        }
    }
}

impl FromStr for EmojiRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty emoji".to_string());
        }
        if s.starts_with('<') {
            return parse_custom(s).ok_or_else(|| format!("invalid custom emoji: {}", s));
        }
        Ok(Self::unicode(s))
    }
}

/// Parse `<:name:id>` or `<a:name:id>`.
fn parse_custom(token: &str) -> Option<EmojiRef> {
    let inner = token.strip_prefix('<')?.strip_suffix('>')?;
    let mut parts = inner.split(':');
    let animated = match parts.next()? {
        "" => false,
        "a" => true,
        _ => return None,
    };
    let name = parts.next()?;
    let id = parts.next()?.parse::<u64>().ok()?;
    if parts.next().is_some()
        || name.is_empty()
        || !name.chars().all(|c| c.is_alphanumeric() || c == '_')
    {
        return None;
    }
    Some(EmojiRef::Custom {
        id,
        name: Some(name.to_string()),
        animated,
    })
}

/// Extract allowlist identifiers from free text.
///
/// Guild emoji tokens yield their id. Whitespace-separated tokens made only
/// of non-ASCII characters, and keycap sequences such as `1️⃣`, are taken as
/// unicode emoji. Anything else is ignored. The result is sorted and free of
/// duplicates.
pub fn extract_emojis(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = String::with_capacity(text.len());
    let mut remaining = text;

    while let Some(start) = remaining.find('<') {
        rest.push_str(&remaining[..start]);
        let candidate = &remaining[start..];
        let parsed = candidate
            .find('>')
            .and_then(|end| parse_custom(&candidate[..=end]).map(|e| (e, end)));
        match parsed {
            Some((emoji, end)) => {
                found.push(emoji.identifier());
                rest.push(' ');
                remaining = &candidate[end + 1..];
            }
            None => {
                rest.push('<');
                remaining = &candidate[1..];
            }
        }
    }
    rest.push_str(remaining);

    found.extend(
        rest.split_whitespace()
            .filter(|token| is_keycap(token) || !token.chars().any(|c| c.is_ascii()))
            .map(str::to_string),
    );

    found.sort();
    found.dedup();
    found
}

/// `[0-9#*]`, an optional VS16, then the combining enclosing keycap.
fn is_keycap(token: &str) -> bool {
    let mut chars = token.chars();
    let Some(base) = chars.next() else {
        return false;
    };
    if !(base.is_ascii_digit() || base == '#' || base == '*') {
        return false;
    }
    let tail: String = chars.collect();
    tail == "\u{20e3}" || tail == "\u{fe0f}\u{20e3}"
}
