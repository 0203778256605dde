//! Discord front-end: gateway intake, REST message delivery, and the
//! alert fan-out.
//!
//! [`DiscordGateway`] maintains the WebSocket session and turns
//! `MESSAGE_CREATE` dispatches into [`DiscordMessageEvent`] records with
//! the capability flags already computed (staff-channel view permission,
//! subscriber role); everything outbound goes over the REST API.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use trellis_channel::{AlertSink, CommandSource, PrivateMessenger, ReplySink};
use trellis_types::BotError;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";
const DISCORD_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT.
const GATEWAY_INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 15);
/// Permission bit for viewing a channel.
const VIEW_CHANNEL: u64 = 1 << 10;

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_HELLO: u8 = 10;

// ---------------------------------------------------------------------------
// Inbound event record
// ---------------------------------------------------------------------------

/// One inbound Discord message as delivered by the gateway collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscordMessageEvent {
    pub channel_id: u64,
    pub author_id: u64,
    pub author_display_name: String,
    /// Raw message content.
    pub content: String,
    /// Content with mentions resolved to readable names.
    pub clean_content: String,
    /// Author can view the staff channel.
    pub is_staff: bool,
    /// Author carries the subscriber role.
    pub has_subscriber_role: bool,
}

impl DiscordMessageEvent {
    pub fn to_source(&self) -> CommandSource {
        CommandSource::Discord {
            user_id: self.author_id,
            display_name: self.author_display_name.clone(),
            is_staff: self.is_staff,
            has_subscriber_role: self.has_subscriber_role,
        }
    }
}

// ---------------------------------------------------------------------------
// REST client
// ---------------------------------------------------------------------------

/// Minimal Discord REST client: message creation only.
pub struct DiscordRest {
    http: reqwest::Client,
    token: String,
}

impl std::fmt::Debug for DiscordRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordRest")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl DiscordRest {
    pub fn new(http: reqwest::Client, token: &str) -> Self {
        Self {
            http,
            token: token.to_string(),
        }
    }

    /// POST a message into a channel.
    pub async fn create_message(&self, channel_id: u64, content: &str) -> Result<(), BotError> {
        let response = self
            .http
            .post(format!("{DISCORD_API_BASE}/channels/{channel_id}/messages"))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "content": content }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BotError::Platform(format!(
                "discord message create returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Open (or reuse) the DM channel with a user, returning its id.
    pub async fn create_dm(&self, recipient_id: u64) -> Result<u64, BotError> {
        #[derive(Deserialize)]
        struct DmChannel {
            id: String,
        }

        let response = self
            .http
            .post(format!("{DISCORD_API_BASE}/users/@me/channels"))
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "recipient_id": recipient_id.to_string() }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BotError::Platform(format!(
                "discord dm create returned {}",
                response.status()
            )));
        }
        let channel: DmChannel = response.json().await?;
        channel.id.parse().map_err(|_| {
            BotError::Platform(format!("non-numeric dm channel id: {}", channel.id))
        })
    }

    /// Ids (roles or users) granted VIEW_CHANNEL on a channel's
    /// permission overwrites. Members carrying one of these ids can see
    /// the channel.
    async fn channel_view_grants(&self, channel_id: u64) -> Result<HashSet<u64>, BotError> {
        #[derive(Deserialize)]
        struct Overwrite {
            id: String,
            allow: String,
        }
        #[derive(Deserialize)]
        struct ChannelResponse {
            #[serde(default)]
            permission_overwrites: Vec<Overwrite>,
        }

        let response = self
            .http
            .get(format!("{DISCORD_API_BASE}/channels/{channel_id}"))
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BotError::Platform(format!(
                "discord channel fetch returned {}",
                response.status()
            )));
        }
        let channel: ChannelResponse = response.json().await?;
        Ok(channel
            .permission_overwrites
            .iter()
            .filter(|o| o.allow.parse::<u64>().map_or(false, |bits| bits & VIEW_CHANNEL != 0))
            .filter_map(|o| o.id.parse().ok())
            .collect())
    }
}

#[async_trait]
impl PrivateMessenger for DiscordRest {
    async fn send_private(&self, local_id: &str, text: &str) -> Result<(), BotError> {
        let recipient: u64 = local_id
            .parse()
            .map_err(|_| BotError::Platform(format!("bad discord user id: {local_id}")))?;
        let dm_channel = self.create_dm(recipient).await?;
        self.create_message(dm_channel, text).await
    }
}

/// Reply sink bound to the channel an invocation came from.
pub struct DiscordReplySink {
    rest: Arc<DiscordRest>,
    channel_id: u64,
}

impl DiscordReplySink {
    pub fn new(rest: Arc<DiscordRest>, channel_id: u64) -> Self {
        Self { rest, channel_id }
    }
}

#[async_trait]
impl ReplySink for DiscordReplySink {
    async fn send(&self, text: &str) -> Result<(), BotError> {
        self.rest.create_message(self.channel_id, text).await
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// One gateway envelope. `d` stays raw JSON; only dispatches we care
/// about get decoded further.
#[derive(Deserialize)]
struct GatewayFrame {
    op: u8,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
    #[serde(default)]
    d: serde_json::Value,
}

#[derive(Deserialize)]
struct InboundMessage {
    channel_id: String,
    #[serde(default)]
    content: String,
    author: InboundAuthor,
    #[serde(default)]
    member: Option<InboundMember>,
}

#[derive(Deserialize)]
struct InboundAuthor {
    id: String,
    username: String,
    #[serde(default)]
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
}

#[derive(Deserialize)]
struct InboundMember {
    #[serde(default)]
    roles: Vec<String>,
}

/// Decode a `MESSAGE_CREATE` dispatch into an event record.
///
/// Staff capability is a channel-visibility fact: the author is staff
/// when their user id, or one of their role ids, holds a VIEW_CHANNEL
/// grant on the staff channel. Bot authors and malformed payloads are
/// dropped.
fn message_event(
    payload: &serde_json::Value,
    staff_grants: &HashSet<u64>,
    subscriber_role_id: u64,
) -> Option<DiscordMessageEvent> {
    let msg: InboundMessage = serde_json::from_value(payload.clone()).ok()?;
    if msg.author.bot {
        return None;
    }
    let channel_id: u64 = msg.channel_id.parse().ok()?;
    let author_id: u64 = msg.author.id.parse().ok()?;
    let roles: Vec<u64> = msg
        .member
        .as_ref()
        .map(|m| m.roles.iter().filter_map(|r| r.parse().ok()).collect())
        .unwrap_or_default();

    Some(DiscordMessageEvent {
        channel_id,
        author_id,
        author_display_name: msg.author.global_name.unwrap_or(msg.author.username),
        clean_content: msg.content.clone(),
        content: msg.content,
        is_staff: staff_grants.contains(&author_id)
            || roles.iter().any(|role| staff_grants.contains(role)),
        has_subscriber_role: roles.contains(&subscriber_role_id),
    })
}

/// The inbound half of the Discord front-end: one identified gateway
/// session delivering message events to the runtime.
pub struct DiscordGateway {
    token: String,
    staff_channel_id: u64,
    subscriber_role_id: u64,
    rest: Arc<DiscordRest>,
}

impl std::fmt::Debug for DiscordGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordGateway")
            .field("token", &"[REDACTED]")
            .field("staff_channel_id", &self.staff_channel_id)
            .field("subscriber_role_id", &self.subscriber_role_id)
            .finish()
    }
}

impl DiscordGateway {
    pub fn new(
        token: &str,
        staff_channel_id: u64,
        subscriber_role_id: u64,
        rest: Arc<DiscordRest>,
    ) -> Self {
        Self {
            token: token.to_string(),
            staff_channel_id,
            subscriber_role_id,
            rest,
        }
    }

    /// Connect, identify, heartbeat, and forward message events until
    /// the connection or the receiver goes away.
    pub async fn run(
        &self,
        inbound_tx: mpsc::Sender<DiscordMessageEvent>,
    ) -> Result<(), BotError> {
        // Staff grants are read once per session; a permission change on
        // the staff channel takes effect on reconnect.
        let staff_grants = self.rest.channel_view_grants(self.staff_channel_id).await?;

        let (stream, _) = connect_async(DISCORD_GATEWAY_URL)
            .await
            .map_err(|e| BotError::Platform(format!("discord gateway connect failed: {e}")))?;
        let (mut ws_tx, mut ws_rx) = stream.split();

        // HELLO carries the heartbeat interval; nothing may be sent
        // before it arrives.
        let heartbeat_ms = loop {
            let Some(frame) = ws_rx.next().await else {
                return Err(BotError::Platform(
                    "discord gateway closed before HELLO".into(),
                ));
            };
            let frame = frame
                .map_err(|e| BotError::Platform(format!("discord gateway read failed: {e}")))?;
            if let Message::Text(text) = frame {
                let envelope: GatewayFrame = serde_json::from_str(&text).map_err(|e| {
                    BotError::Platform(format!("unparseable gateway frame: {e}"))
                })?;
                if envelope.op == OP_HELLO {
                    break envelope
                        .d
                        .get("heartbeat_interval")
                        .and_then(serde_json::Value::as_u64)
                        .unwrap_or(41_250);
                }
            }
        };

        let identify = json!({
            "op": OP_IDENTIFY,
            "d": {
                "token": self.token,
                "intents": GATEWAY_INTENTS,
                "properties": { "os": "linux", "browser": "trellis", "device": "trellis" },
            }
        });
        ws_tx
            .send(Message::Text(identify.to_string()))
            .await
            .map_err(|e| BotError::Platform(format!("discord gateway send failed: {e}")))?;
        info!("discord gateway identified");

        let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_ms));
        let mut last_seq: Option<u64> = None;
        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    let beat = json!({ "op": OP_HEARTBEAT, "d": last_seq });
                    ws_tx
                        .send(Message::Text(beat.to_string()))
                        .await
                        .map_err(|e| BotError::Platform(format!("discord heartbeat failed: {e}")))?;
                }
                frame = ws_rx.next() => {
                    let Some(frame) = frame else { return Ok(()) };
                    let frame = frame.map_err(|e| {
                        BotError::Platform(format!("discord gateway read failed: {e}"))
                    })?;
                    match frame {
                        Message::Text(text) => {
                            let envelope: GatewayFrame = match serde_json::from_str(&text) {
                                Ok(envelope) => envelope,
                                Err(e) => {
                                    warn!(error = %e, "unparseable gateway frame dropped");
                                    continue;
                                }
                            };
                            if let Some(seq) = envelope.s {
                                last_seq = Some(seq);
                            }
                            if envelope.op == OP_DISPATCH
                                && envelope.t.as_deref() == Some("MESSAGE_CREATE")
                            {
                                let event = message_event(
                                    &envelope.d,
                                    &staff_grants,
                                    self.subscriber_role_id,
                                );
                                if let Some(event) = event {
                                    if inbound_tx.send(event).await.is_err() {
                                        return Ok(());
                                    }
                                }
                            }
                        }
                        Message::Ping(payload) => {
                            ws_tx.send(Message::Pong(payload)).await.map_err(|e| {
                                BotError::Platform(format!("discord gateway send failed: {e}"))
                            })?;
                        }
                        Message::Close(_) => return Ok(()),
                        _ => {}
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Alert fan-out
// ---------------------------------------------------------------------------

/// Posts a status update to a configured microblog endpoint.
pub struct MicroblogPoster {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl MicroblogPoster {
    pub fn new(http: reqwest::Client, endpoint: &str, token: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.to_string(),
            token: token.to_string(),
        }
    }

    async fn post(&self, status: &str) -> Result<(), BotError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .form(&[("status", status)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BotError::Platform(format!(
                "microblog post returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Alert sink covering both outward surfaces: the Discord alerts channel
/// and the optional microblog.
pub struct DiscordAlertSink {
    rest: Arc<DiscordRest>,
    alerts_channel_id: u64,
    microblog: Option<MicroblogPoster>,
}

impl DiscordAlertSink {
    pub fn new(
        rest: Arc<DiscordRest>,
        alerts_channel_id: u64,
        microblog: Option<MicroblogPoster>,
    ) -> Self {
        Self {
            rest,
            alerts_channel_id,
            microblog,
        }
    }
}

#[async_trait]
impl AlertSink for DiscordAlertSink {
    async fn announce_discord(&self, text: &str) -> Result<(), BotError> {
        self.rest.create_message(self.alerts_channel_id, text).await
    }

    async fn post_microblog(&self, text: &str) -> Result<(), BotError> {
        match &self.microblog {
            Some(poster) => poster.post(text).await,
            None => {
                info!("no microblog configured, skipping alert post");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_converts_to_source_with_flags() {
        let event = DiscordMessageEvent {
            channel_id: 10,
            author_id: 999,
            author_display_name: "viewer".into(),
            content: "~bal".into(),
            clean_content: "~bal".into(),
            is_staff: true,
            has_subscriber_role: false,
        };
        let source = event.to_source();
        assert_eq!(
            source,
            CommandSource::Discord {
                user_id: 999,
                display_name: "viewer".into(),
                is_staff: true,
                has_subscriber_role: false,
            }
        );
    }

    #[test]
    fn rest_debug_redacts_token() {
        let rest = DiscordRest::new(reqwest::Client::new(), "super-secret");
        let debug = format!("{rest:?}");
        assert!(!debug.contains("super-secret"));
    }

    #[test]
    fn message_create_dispatch_becomes_event_with_flags() {
        let payload = json!({
            "channel_id": "10",
            "content": "~bal",
            "author": { "id": "999", "username": "viewer", "global_name": "Viewer" },
            "member": { "roles": ["777", "555"] }
        });
        let grants = HashSet::from([777u64]);
        let event = message_event(&payload, &grants, 555).unwrap();
        assert_eq!(event.channel_id, 10);
        assert_eq!(event.author_id, 999);
        assert_eq!(event.author_display_name, "Viewer");
        assert_eq!(event.content, "~bal");
        assert!(event.is_staff);
        assert!(event.has_subscriber_role);
    }

    #[test]
    fn ungranted_roles_carry_no_capabilities() {
        let payload = json!({
            "channel_id": "10",
            "content": "~bal",
            "author": { "id": "999", "username": "viewer" },
            "member": { "roles": ["123"] }
        });
        let event = message_event(&payload, &HashSet::from([777u64]), 555).unwrap();
        assert_eq!(event.author_display_name, "viewer");
        assert!(!event.is_staff);
        assert!(!event.has_subscriber_role);
    }

    #[test]
    fn bot_authors_and_malformed_payloads_are_dropped() {
        let from_bot = json!({
            "channel_id": "10",
            "content": "beep",
            "author": { "id": "1", "username": "otherbot", "bot": true }
        });
        assert!(message_event(&from_bot, &HashSet::new(), 555).is_none());

        let no_author = json!({ "channel_id": "10", "content": "hello" });
        assert!(message_event(&no_author, &HashSet::new(), 555).is_none());
    }

    #[test]
    fn gateway_debug_redacts_token() {
        let rest = Arc::new(DiscordRest::new(reqwest::Client::new(), "super-secret"));
        let gateway = DiscordGateway::new("super-secret", 1, 2, rest);
        let debug = format!("{gateway:?}");
        assert!(!debug.contains("super-secret"));
    }
}
