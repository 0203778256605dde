//! JSON envelope protocol for the Petal relay.
//!
//! The relay is a single persistent WebSocket carrying line-delimited
//! JSON envelopes. The bot authenticates with an `auth-token` envelope
//! immediately after connecting, then exchanges `message` envelopes in
//! both directions. Inbound relay chatter is mirrored into the other
//! chats as `"{emoji} {name}: {body}"`.

use serde::{Deserialize, Serialize};

use trellis_types::BotError;

/// One relay envelope. The `type` field tags the variant on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PetalEnvelope {
    /// Sent once by the bot after connecting.
    AuthToken { name: String, token: String },
    /// A chat message in either direction. Relay senders may omit the
    /// name.
    Message {
        #[serde(default)]
        name: Option<String>,
        body: String,
    },
}

impl PetalEnvelope {
    /// The authentication envelope sent on connect.
    pub fn auth(name: &str, token: &str) -> Self {
        PetalEnvelope::AuthToken {
            name: name.to_string(),
            token: token.to_string(),
        }
    }

    /// An outbound chat message from the bot.
    pub fn message(name: &str, body: &str) -> Self {
        PetalEnvelope::Message {
            name: Some(name.to_string()),
            body: body.to_string(),
        }
    }

    /// Parse one inbound frame. Unknown envelope types and malformed
    /// JSON are both protocol violations.
    pub fn parse(frame: &str) -> Result<Self, BotError> {
        serde_json::from_str(frame)
            .map_err(|e| BotError::UnsupportedSource(format!("bad relay envelope: {e}")))
    }

    /// Serialize for the wire.
    pub fn to_frame(&self) -> Result<String, BotError> {
        serde_json::to_string(self)
            .map_err(|e| BotError::Platform(format!("relay envelope encode: {e}")))
    }
}

/// Render an inbound relay message for mirroring into the other chats.
/// Anonymous senders are shown as `anon`.
pub fn mirror_line(emoji: &str, name: Option<&str>, body: &str) -> String {
    format!("{emoji} {}: {body}", name.unwrap_or("anon"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_envelope_wire_format() {
        let frame = PetalEnvelope::auth("trellis", "secret-token")
            .to_frame()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["type"], "auth-token");
        assert_eq!(value["name"], "trellis");
        assert_eq!(value["token"], "secret-token");
    }

    #[test]
    fn message_envelope_round_trips() {
        let frame = PetalEnvelope::message("trellis", "hello relay")
            .to_frame()
            .unwrap();
        let parsed = PetalEnvelope::parse(&frame).unwrap();
        assert_eq!(parsed, PetalEnvelope::message("trellis", "hello relay"));
    }

    #[test]
    fn inbound_message_may_omit_name() {
        let parsed = PetalEnvelope::parse(r#"{"type":"message","body":"hi"}"#).unwrap();
        assert_eq!(
            parsed,
            PetalEnvelope::Message {
                name: None,
                body: "hi".into()
            }
        );
    }

    #[test]
    fn unknown_envelope_type_is_rejected() {
        let err = PetalEnvelope::parse(r#"{"type":"presence","name":"x"}"#).unwrap_err();
        assert!(matches!(err, BotError::UnsupportedSource(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(PetalEnvelope::parse("not json").is_err());
    }

    #[test]
    fn mirror_line_formats_with_emoji_and_anon_fallback() {
        assert_eq!(
            mirror_line("🌿", Some("friend"), "hello"),
            "🌿 friend: hello"
        );
        assert_eq!(mirror_line("🌿", None, "hello"), "🌿 anon: hello");
    }
}
