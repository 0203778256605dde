//! Typed environment configuration.
//!
//! Everything is driven from named environment values (a `.env` file
//! loaded at startup). This module parses them once into an immutable
//! [`BotConfig`]; mutable runtime settings (prefixes, currency
//! emoji, info texts) live in the persistent document instead, so config
//! and live state never share a structure.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::BotError;

/// Immutable process configuration, loaded once from the environment.
///
/// Credential fields are sensitive and excluded from `Debug` output.
#[derive(Clone)]
pub struct BotConfig {
    /// Display name of the bot account (also used to skip self-authored
    /// messages in passive scoring).
    pub bot_name: String,
    /// Path of the persistent JSON document.
    pub data_path: PathBuf,
    /// Default command prefix seeded into the document for each platform.
    pub default_prefix: String,
    /// Default currency display symbol seeded into the document.
    pub default_currency_emoji: String,

    /// Twitch channel the bot joins and reports live status for.
    pub broadcaster_channel: String,
    /// Twitch IRC OAuth token. Never logged.
    pub twitch_token: String,
    /// Twitch application client id, required by the Helix API.
    pub twitch_client_id: String,

    /// Discord bot token. Never logged.
    pub discord_token: String,
    /// Channel whose view permission marks a member as staff (moderator).
    pub discord_staff_channel_id: u64,
    /// Role granted to Twitch subscribers on the Discord side.
    pub discord_subscriber_role_id: u64,
    /// Channel stream alerts are announced in.
    pub discord_alerts_channel_id: u64,
    /// Role mentioned in stream alerts.
    pub discord_alerts_role_id: u64,
    /// Channels the bot accepts commands in.
    pub discord_channel_ids: HashSet<u64>,
    /// Channel relay chatter is mirrored into.
    pub discord_bridge_channel_id: u64,

    /// WebSocket URL of the Petal relay server.
    pub petal_server: String,
    /// Petal relay auth token. Never logged.
    pub petal_token: String,
    /// Name the bot authenticates to the relay as (inbound envelopes from
    /// this name are ignored to avoid echo loops).
    pub petal_name: String,
    /// Symbol prepended to relayed messages when mirrored into chat.
    pub petal_emoji: String,

    /// Microblog status endpoint for stream alerts, if configured.
    pub microblog_endpoint: Option<String>,
    /// Microblog bearer token. Never logged.
    pub microblog_token: Option<String>,
}

impl std::fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotConfig")
            .field("bot_name", &self.bot_name)
            .field("data_path", &self.data_path)
            .field("default_prefix", &self.default_prefix)
            .field("broadcaster_channel", &self.broadcaster_channel)
            .field("twitch_token", &"[REDACTED]")
            .field("discord_token", &"[REDACTED]")
            .field("petal_server", &self.petal_server)
            .field("petal_token", &"[REDACTED]")
            .field("petal_name", &self.petal_name)
            .finish_non_exhaustive()
    }
}

impl BotConfig {
    /// Load configuration from the process environment.
    ///
    /// Every value is required except the Discord channel allow-list,
    /// which may be empty. Missing or malformed values are a startup
    /// failure ([`BotError::Config`]); the process must not run with a
    /// partial configuration.
    pub fn from_env() -> Result<Self, BotError> {
        Ok(Self {
            bot_name: require("BOT_NAME")?,
            data_path: PathBuf::from(require("DATA_PATH")?),
            default_prefix: require("DEFAULT_PREFIX")?,
            default_currency_emoji: require("DEFAULT_CURRENCY_EMOJI")?,
            broadcaster_channel: require("BROADCASTER_CHANNEL")?,
            twitch_token: require("TWITCH_TOKEN")?,
            twitch_client_id: require("TWITCH_CLIENT_ID")?,
            discord_token: require("DISCORD_TOKEN")?,
            discord_staff_channel_id: require_u64("DISCORD_STAFF_CHANNEL_ID")?,
            discord_subscriber_role_id: require_u64("DISCORD_SUBSCRIBER_ROLE_ID")?,
            discord_alerts_channel_id: require_u64("DISCORD_ALERTS_CHANNEL_ID")?,
            discord_alerts_role_id: require_u64("DISCORD_ALERTS_ROLE_ID")?,
            discord_channel_ids: parse_id_set(&require("DISCORD_CHANNEL_IDS")?)?,
            discord_bridge_channel_id: require_u64("DISCORD_BRIDGE_CHANNEL_ID")?,
            petal_server: require("PETAL_SERVER")?,
            petal_token: require("PETAL_TOKEN")?,
            petal_name: require("PETAL_NAME")?,
            petal_emoji: require("PETAL_EMOJI")?,
            microblog_endpoint: optional("MICROBLOG_ENDPOINT"),
            microblog_token: optional("MICROBLOG_TOKEN"),
        })
    }
}

fn require(name: &str) -> Result<String, BotError> {
    std::env::var(name).map_err(|_| BotError::Config(format!("missing environment value {name}")))
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn require_u64(name: &str) -> Result<u64, BotError> {
    let raw = require(name)?;
    raw.parse()
        .map_err(|_| BotError::Config(format!("{name} is not a valid integer: {raw:?}")))
}

/// Parse a comma-separated list of numeric channel ids. Empty input yields
/// an empty set (commands allowed nowhere on Discord).
fn parse_id_set(raw: &str) -> Result<HashSet<u64>, BotError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| BotError::Config(format!("bad channel id in DISCORD_CHANNEL_IDS: {s:?}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_set_accepts_commas_and_whitespace() {
        let ids = parse_id_set("1, 2,3").unwrap();
        assert_eq!(ids, HashSet::from([1, 2, 3]));
    }

    #[test]
    fn parse_id_set_empty_is_empty() {
        assert!(parse_id_set("").unwrap().is_empty());
    }

    #[test]
    fn parse_id_set_rejects_garbage() {
        assert!(parse_id_set("1,abc").is_err());
    }

    #[test]
    fn debug_redacts_credentials() {
        let config = BotConfig {
            bot_name: "trellis".into(),
            data_path: PathBuf::from("/tmp/data.json"),
            default_prefix: "~".into(),
            default_currency_emoji: "🌿".into(),
            broadcaster_channel: "somestreamer".into(),
            twitch_token: "oauth:secret".into(),
            twitch_client_id: "clientid".into(),
            discord_token: "discord-secret".into(),
            discord_staff_channel_id: 1,
            discord_subscriber_role_id: 2,
            discord_alerts_channel_id: 3,
            discord_alerts_role_id: 4,
            discord_channel_ids: HashSet::new(),
            discord_bridge_channel_id: 5,
            petal_server: "wss://petal.example".into(),
            petal_token: "petal-secret".into(),
            petal_name: "trellis".into(),
            petal_emoji: "🌸".into(),
            microblog_endpoint: None,
            microblog_token: Some("blog-secret".into()),
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
