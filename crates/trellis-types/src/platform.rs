//! The fixed set of chat platforms Trellis mirrors commands across.

use serde::{Deserialize, Serialize};

/// A chat platform the bot is wired into.
///
/// This is a small, fixed set by design; Trellis is not a general bot
/// framework. Each platform has its own command prefix (stored in the
/// persistent document under [`Platform::prefix_key`]) and its own reply
/// formatting rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// The primary platform. Twitch user ids are the canonical identity
    /// key for all economy state.
    Twitch,
    /// Discord server. Local ids are Discord snowflakes.
    Discord,
    /// The Petal relay network. Local ids are relay display names.
    Petal,
}

impl Platform {
    /// Lowercase identifier used in persisted-document keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Twitch => "twitch",
            Platform::Discord => "discord",
            Platform::Petal => "petal",
        }
    }

    /// Document key holding this platform's command prefix,
    /// e.g. `"prefix:discord"`.
    pub fn prefix_key(self) -> String {
        format!("prefix:{}", self.as_str())
    }

    /// Document key for a completed identity link from this platform,
    /// e.g. `"discord:123456"`.
    pub fn link_key(self, local_id: &str) -> String {
        format!("{}:{}", self.as_str(), local_id)
    }

    /// Document key for a pending identity link from this platform,
    /// e.g. `"link:petal_somebody"`.
    pub fn pending_link_key(self, local_id: &str) -> String {
        format!("link:{}_{}", self.as_str(), local_id)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
