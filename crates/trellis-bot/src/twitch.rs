//! Twitch front-end: IRC-over-WebSocket protocol and Helix lookups.
//!
//! Chat runs over the IRC-over-WebSocket endpoint at
//! `wss://irc-ws.chat.twitch.tv:443`. This module builds the protocol
//! lines and parses inbound tagged PRIVMSGs; the transport loop lives in
//! the runtime so every protocol decision stays testable without a
//! socket.
//!
//! # Security
//!
//! - The OAuth token is format-checked (`oauth:` prefix) and never
//!   logged.
//! - Channel and bot names are validated (alphanumeric + underscore,
//!   max 25 characters per Twitch limits).

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use trellis_channel::{ChannelInfo, ChatDirectory, CommandSource, LiveStatus, ReplySink};
use trellis_types::{BotError, CanonicalId};

/// WebSocket URL for Twitch IRC.
pub const TWITCH_IRC_WSS: &str = "wss://irc-ws.chat.twitch.tv:443";

const HELIX_BASE: &str = "https://api.twitch.tv/helix";

/// Maximum length for Twitch channel names and usernames.
const MAX_NAME_LEN: usize = 25;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_oauth_token(token: &str) -> Result<(), BotError> {
    let Some(suffix) = token.strip_prefix("oauth:") else {
        return Err(BotError::Config(
            "Twitch OAuth token must start with 'oauth:' prefix".into(),
        ));
    };
    if suffix.is_empty() {
        return Err(BotError::Config(
            "Twitch OAuth token is empty after 'oauth:' prefix".into(),
        ));
    }
    Ok(())
}

fn validate_twitch_name(name: &str, field: &str) -> Result<(), BotError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(BotError::Config(format!(
            "Twitch {field} must be 1-{MAX_NAME_LEN} characters: {name:?}"
        )));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(BotError::Config(format!(
            "Twitch {field} contains invalid characters: {name:?}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// IRC protocol
// ---------------------------------------------------------------------------

/// Builds the IRC protocol lines for one channel connection.
pub struct TwitchIrc {
    oauth_token: String,
    bot_username: String,
    channel_name: String,
}

impl std::fmt::Debug for TwitchIrc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchIrc")
            .field("oauth_token", &"[REDACTED]")
            .field("bot_username", &self.bot_username)
            .field("channel_name", &self.channel_name)
            .finish()
    }
}

impl TwitchIrc {
    pub fn new(oauth_token: &str, bot_username: &str, channel_name: &str) -> Result<Self, BotError> {
        validate_oauth_token(oauth_token)?;
        validate_twitch_name(bot_username, "bot_username")?;
        validate_twitch_name(channel_name, "channel_name")?;
        Ok(Self {
            oauth_token: oauth_token.to_string(),
            bot_username: bot_username.to_string(),
            channel_name: channel_name.to_string(),
        })
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    /// Tag/command capabilities, requested before authenticating so
    /// PRIVMSGs arrive with badges and emote spans.
    pub fn build_cap_req(&self) -> String {
        "CAP REQ :twitch.tv/tags twitch.tv/commands".to_string()
    }

    pub fn build_pass_command(&self) -> String {
        format!("PASS {}", self.oauth_token)
    }

    pub fn build_nick_command(&self) -> String {
        format!("NICK {}", self.bot_username)
    }

    pub fn build_join_command(&self) -> String {
        format!("JOIN #{}", self.channel_name)
    }

    pub fn build_privmsg(&self, text: &str) -> String {
        format!("PRIVMSG #{} :{}", self.channel_name, text)
    }

    pub fn build_pong(payload: &str) -> String {
        format!("PONG :{payload}")
    }

    /// Returns the PING payload if the raw line is a keepalive.
    pub fn parse_ping(raw: &str) -> Option<&str> {
        raw.strip_prefix("PING :")
            .or_else(|| raw.strip_prefix("PING"))
            .map(str::trim)
    }

    /// Parse a tagged PRIVMSG.
    ///
    /// Expected shape:
    /// `@key=value;... :login!login@login.tmi.twitch.tv PRIVMSG #channel :text`
    pub fn parse_privmsg(raw: &str) -> Option<TwitchChatMessage> {
        let (tags, rest) = match raw.strip_prefix('@') {
            Some(tagged) => {
                let (tag_part, rest) = tagged.split_once(' ')?;
                (parse_tags(tag_part), rest)
            }
            None => (HashMap::new(), raw),
        };

        let rest = rest.strip_prefix(':')?;
        let (prefix, rest) = rest.split_once(' ')?;
        let login = prefix.split('!').next()?.to_string();

        let rest = rest.strip_prefix("PRIVMSG ")?;
        let (channel_part, text) = rest.split_once(" :")?;
        let channel = channel_part.strip_prefix('#')?.to_string();

        let badges = tags.get("badges").map(String::as_str).unwrap_or_default();
        let is_moderator = tags.get("mod").map(String::as_str) == Some("1")
            || badges.contains("broadcaster/");
        let is_subscriber = tags.get("subscriber").map(String::as_str) == Some("1")
            || badges.contains("founder/");

        let user_id = tags.get("user-id")?.clone();
        let display_name = tags
            .get("display-name")
            .filter(|n| !n.is_empty())
            .cloned()
            .unwrap_or_else(|| login.clone());

        Some(TwitchChatMessage {
            user_id,
            login,
            display_name,
            is_moderator,
            is_subscriber,
            channel,
            text: text.to_string(),
            emotes_tag: tags.get("emotes").cloned().unwrap_or_default(),
        })
    }
}

fn parse_tags(tag_part: &str) -> HashMap<String, String> {
    tag_part
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// One parsed chat message with the capability flags the badges carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwitchChatMessage {
    pub user_id: String,
    pub login: String,
    pub display_name: String,
    pub is_moderator: bool,
    pub is_subscriber: bool,
    pub channel: String,
    pub text: String,
    /// Raw `emotes` tag (`id:start-end,start-end/id:...`), char offsets.
    pub emotes_tag: String,
}

impl TwitchChatMessage {
    pub fn to_source(&self) -> CommandSource {
        CommandSource::Twitch {
            user_id: self.user_id.clone(),
            login: self.login.clone(),
            is_moderator: self.is_moderator,
            is_subscriber: self.is_subscriber,
        }
    }

    /// Split the message into scoring terms: the plain words (tokens not
    /// covered by any emote span) and the count of distinct emotes used.
    pub fn activity_terms(&self) -> (Vec<String>, usize) {
        let chars: Vec<char> = self.text.chars().collect();
        let mut emote_mask = vec![false; chars.len()];
        let mut distinct_emotes = BTreeSet::new();

        for group in self.emotes_tag.split('/').filter(|g| !g.is_empty()) {
            let Some((emote_id, spans)) = group.split_once(':') else {
                continue;
            };
            distinct_emotes.insert(emote_id.to_string());
            for span in spans.split(',') {
                if let Some((start, end)) = span.split_once('-') {
                    if let (Ok(start), Ok(end)) = (start.parse::<usize>(), end.parse::<usize>()) {
                        for flag in emote_mask.iter_mut().take(end + 1).skip(start) {
                            *flag = true;
                        }
                    }
                }
            }
        }

        let mut words = Vec::new();
        let mut current = String::new();
        let mut current_is_emote = false;
        for (i, c) in chars.iter().enumerate() {
            if c.is_whitespace() {
                if !current.is_empty() && !current_is_emote {
                    words.push(std::mem::take(&mut current));
                }
                current.clear();
                current_is_emote = false;
            } else {
                current.push(*c);
                current_is_emote |= emote_mask[i];
            }
        }
        if !current.is_empty() && !current_is_emote {
            words.push(current);
        }

        (words, distinct_emotes.len())
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// Reply sink that queues PRIVMSG lines onto the live IRC connection.
pub struct TwitchReplySink {
    out: mpsc::Sender<String>,
    irc: Arc<TwitchIrc>,
}

impl TwitchReplySink {
    pub fn new(out: mpsc::Sender<String>, irc: Arc<TwitchIrc>) -> Self {
        Self { out, irc }
    }
}

#[async_trait]
impl ReplySink for TwitchReplySink {
    async fn send(&self, text: &str) -> Result<(), BotError> {
        self.out
            .send(self.irc.build_privmsg(text))
            .await
            .map_err(|_| BotError::Platform("twitch connection closed".into()))
    }
}

/// Run one IRC-over-WebSocket connection: authenticate, join, answer
/// keepalives, pump outbound lines from `out_rx`, and deliver parsed
/// chat messages to `inbound_tx`. Returns when the socket closes.
pub async fn run_irc(
    irc: Arc<TwitchIrc>,
    mut out_rx: mpsc::Receiver<String>,
    inbound_tx: mpsc::Sender<TwitchChatMessage>,
) -> Result<(), BotError> {
    let (stream, _) = connect_async(TWITCH_IRC_WSS)
        .await
        .map_err(|e| BotError::Platform(format!("twitch connect: {e}")))?;
    let (mut write, mut read) = stream.split();

    for line in [
        irc.build_cap_req(),
        irc.build_pass_command(),
        irc.build_nick_command(),
        irc.build_join_command(),
    ] {
        write
            .send(Message::Text(line))
            .await
            .map_err(|e| BotError::Platform(format!("twitch handshake: {e}")))?;
    }
    info!(channel = %irc.channel_name(), "joined twitch chat");

    loop {
        tokio::select! {
            outbound = out_rx.recv() => {
                let Some(line) = outbound else {
                    break;
                };
                write
                    .send(Message::Text(line))
                    .await
                    .map_err(|e| BotError::Platform(format!("twitch send: {e}")))?;
            }
            inbound = read.next() => {
                let Some(frame) = inbound else {
                    info!("twitch closed the connection");
                    break;
                };
                let frame = frame.map_err(|e| BotError::Platform(format!("twitch read: {e}")))?;
                let Message::Text(text) = frame else {
                    continue;
                };
                // A frame may carry several IRC lines.
                for line in text.split("\r\n").filter(|l| !l.is_empty()) {
                    if let Some(payload) = TwitchIrc::parse_ping(line) {
                        write
                            .send(Message::Text(TwitchIrc::build_pong(payload)))
                            .await
                            .map_err(|e| BotError::Platform(format!("twitch pong: {e}")))?;
                        continue;
                    }
                    if let Some(message) = TwitchIrc::parse_privmsg(line) {
                        if inbound_tx.send(message).await.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Helix
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Paginated<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    #[allow(dead_code)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct HelixChannel {
    title: String,
    game_name: String,
}

#[derive(Debug, Deserialize)]
struct HelixSubscription {
    #[allow(dead_code)]
    tier: String,
}

/// Thin Helix API client backing [`LiveStatus`] and [`ChatDirectory`].
pub struct HelixClient {
    http: reqwest::Client,
    client_id: String,
    bearer: String,
    broadcaster_login: String,
}

impl HelixClient {
    /// `oauth_token` is the IRC-style token; Helix wants the bare value.
    pub fn new(http: reqwest::Client, client_id: &str, oauth_token: &str, broadcaster_login: &str) -> Self {
        let bearer = oauth_token.strip_prefix("oauth:").unwrap_or(oauth_token);
        Self {
            http,
            client_id: client_id.to_string(),
            bearer: bearer.to_string(),
            broadcaster_login: broadcaster_login.to_string(),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Paginated<T>, BotError> {
        let response = self
            .http
            .get(format!("{HELIX_BASE}/{path}"))
            .query(query)
            .header("Client-Id", &self.client_id)
            .bearer_auth(&self.bearer)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BotError::Platform(format!(
                "helix {path} returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    async fn broadcaster_id(&self) -> Result<String, BotError> {
        let users: Paginated<HelixUser> = self
            .get("users", &[("login", &self.broadcaster_login)])
            .await?;
        users
            .data
            .into_iter()
            .next()
            .map(|u| u.id)
            .ok_or_else(|| {
                BotError::Platform(format!(
                    "broadcaster {} not found on helix",
                    self.broadcaster_login
                ))
            })
    }
}

#[async_trait]
impl LiveStatus for HelixClient {
    async fn is_live(&self) -> Result<bool, BotError> {
        let streams: Paginated<HelixStream> = self
            .get("streams", &[("user_login", &self.broadcaster_login)])
            .await?;
        Ok(!streams.data.is_empty())
    }
}

#[async_trait]
impl ChatDirectory for HelixClient {
    async fn subscriber_status(&self, canonical: &CanonicalId) -> Result<Option<bool>, BotError> {
        let broadcaster_id = self.broadcaster_id().await?;
        let result: Result<Paginated<HelixSubscription>, BotError> = self
            .get(
                "subscriptions",
                &[
                    ("broadcaster_id", broadcaster_id.as_str()),
                    ("user_id", canonical.as_str()),
                ],
            )
            .await;
        match result {
            Ok(subs) => Ok(Some(!subs.data.is_empty())),
            // Subscription data needs a broadcaster-scoped token; when the
            // deployment lacks it the status is simply unknown.
            Err(BotError::Platform(detail)) if detail.contains("401") => {
                warn!("subscription lookup unauthorized, reporting unknown");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn display_name(&self, canonical: &CanonicalId) -> Result<String, BotError> {
        let users: Paginated<HelixUser> = self.get("users", &[("id", canonical.as_str())]).await?;
        users
            .data
            .into_iter()
            .next()
            .map(|u| u.display_name)
            .ok_or_else(|| BotError::Platform(format!("no helix user with id {canonical}")))
    }

    async fn channel_info(&self) -> Result<ChannelInfo, BotError> {
        let broadcaster_id = self.broadcaster_id().await?;
        let channels: Paginated<HelixChannel> = self
            .get("channels", &[("broadcaster_id", broadcaster_id.as_str())])
            .await?;
        channels
            .data
            .into_iter()
            .next()
            .map(|c| ChannelInfo {
                title: c.title,
                game_name: c.game_name,
            })
            .ok_or_else(|| {
                BotError::Platform(format!(
                    "no channel info for {}",
                    self.broadcaster_login
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
