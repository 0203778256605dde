//! Petal relay front-end: WebSocket transport for the JSON envelope
//! protocol defined in [`trellis_channel::petal`].
//!
//! The relay connection authenticates with an `auth-token` envelope and
//! then exchanges `message` envelopes. Inbound relay chatter that is not
//! a command is mirrored into Twitch chat and the Discord bridge
//! channel.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use trellis_channel::petal::PetalEnvelope;
use trellis_channel::ReplySink;
use trellis_types::BotError;

/// Reply sink that routes back out through the relay connection.
pub struct PetalReplySink {
    out: mpsc::Sender<String>,
    bot_name: String,
}

impl PetalReplySink {
    pub fn new(out: mpsc::Sender<String>, bot_name: &str) -> Self {
        Self {
            out,
            bot_name: bot_name.to_string(),
        }
    }
}

#[async_trait]
impl ReplySink for PetalReplySink {
    async fn send(&self, text: &str) -> Result<(), BotError> {
        let frame = PetalEnvelope::message(&self.bot_name, text).to_frame()?;
        self.out
            .send(frame)
            .await
            .map_err(|_| BotError::Platform("relay connection closed".into()))
    }
}

/// One inbound relay message worth acting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub name: Option<String>,
    pub body: String,
}

/// Connection settings for the relay.
pub struct PetalRelay {
    pub server: String,
    pub name: String,
    pub token: String,
}

impl std::fmt::Debug for PetalRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PetalRelay")
            .field("server", &self.server)
            .field("name", &self.name)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl PetalRelay {
    /// Decide what an inbound frame means: the bot's own echoes are
    /// dropped, everything else is surfaced. Unknown envelope types are
    /// a protocol violation and propagate.
    pub fn classify(&self, frame: &str) -> Result<Option<RelayMessage>, BotError> {
        match PetalEnvelope::parse(frame)? {
            PetalEnvelope::Message { name, body } => {
                if name.as_deref() == Some(self.name.as_str()) {
                    return Ok(None);
                }
                Ok(Some(RelayMessage { name, body }))
            }
            PetalEnvelope::AuthToken { .. } => {
                warn!("relay sent an auth envelope mid-stream, ignoring");
                Ok(None)
            }
        }
    }

    /// Run the relay connection: authenticate, pump outbound frames from
    /// `out_rx`, and deliver inbound messages to `inbound_tx`. Returns
    /// when the socket closes.
    pub async fn run(
        &self,
        mut out_rx: mpsc::Receiver<String>,
        inbound_tx: mpsc::Sender<RelayMessage>,
    ) -> Result<(), BotError> {
        let (stream, _) = connect_async(&self.server)
            .await
            .map_err(|e| BotError::Platform(format!("relay connect: {e}")))?;
        let (mut write, mut read) = stream.split();

        let auth = PetalEnvelope::auth(&self.name, &self.token).to_frame()?;
        write
            .send(Message::Text(auth))
            .await
            .map_err(|e| BotError::Platform(format!("relay auth send: {e}")))?;
        info!(server = %self.server, "connected to relay");

        loop {
            tokio::select! {
                outbound = out_rx.recv() => {
                    let Some(frame) = outbound else {
                        break;
                    };
                    write
                        .send(Message::Text(frame))
                        .await
                        .map_err(|e| BotError::Platform(format!("relay send: {e}")))?;
                }
                inbound = read.next() => {
                    let Some(frame) = inbound else {
                        info!("relay closed the connection");
                        break;
                    };
                    let frame = frame.map_err(|e| BotError::Platform(format!("relay read: {e}")))?;
                    let Message::Text(text) = frame else {
                        continue;
                    };
                    match self.classify(&text) {
                        Ok(Some(message)) => {
                            if inbound_tx.send(message).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!(error = %e, "dropping bad relay frame"),
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relay() -> PetalRelay {
        PetalRelay {
            server: "wss://relay.example".into(),
            name: "trellis".into(),
            token: "secret".into(),
        }
    }

    #[test]
    fn own_echoes_are_dropped() {
        let relay = relay();
        let frame = PetalEnvelope::message("trellis", "hello").to_frame().unwrap();
        assert_eq!(relay.classify(&frame).unwrap(), None);
    }

    #[test]
    fn other_messages_surface_with_name() {
        let relay = relay();
        let frame = PetalEnvelope::message("friend", "hello").to_frame().unwrap();
        assert_eq!(
            relay.classify(&frame).unwrap(),
            Some(RelayMessage {
                name: Some("friend".into()),
                body: "hello".into()
            })
        );
    }

    #[test]
    fn anonymous_messages_surface() {
        let relay = relay();
        let message = relay
            .classify(r#"{"type":"message","body":"hi"}"#)
            .unwrap()
            .unwrap();
        assert_eq!(message.name, None);
    }

    #[test]
    fn unknown_envelopes_error() {
        let relay = relay();
        assert!(relay.classify(r#"{"type":"presence"}"#).is_err());
    }

    #[test]
    fn debug_redacts_token() {
        assert!(!format!("{:?}", relay()).contains("secret"));
    }
}
