//! The normalized view of "who invoked this command, from where, with
//! what capabilities, and how do I reply".

use tracing::warn;

use trellis_identity::resolve_canonical_id;
use trellis_store::BotData;
use trellis_types::{BotError, CanonicalId, Platform};

use crate::boundary::{ChatDirectory, ReplySink};
use crate::format;
use crate::source::CommandSource;

/// Subscription status as a three-valued capability.
///
/// `Unknown` means the platform cannot currently determine it (e.g. a
/// relay user not recently seen chatting on Twitch); handlers must treat
/// it distinctly from `NotSubscribed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubStatus {
    Subscribed,
    NotSubscribed,
    Unknown,
}

impl SubStatus {
    pub fn is_subscribed(self) -> bool {
        self == SubStatus::Subscribed
    }
}

/// One normalized command invocation, handed to every command handler.
///
/// Borrows the store mutably for the duration of the invocation: command
/// handling is serialized, so a handler's read-modify-write-save sequence
/// is atomic with respect to all other handlers as long as it does not
/// await on shared state in between.
pub struct CommandContext<'a> {
    /// The shared persistent document.
    pub data: &'a mut BotData,
    source: CommandSource,
    /// Canonical account, if this user's platform identity is linked.
    pub canonical_id: Option<CanonicalId>,
    /// Raw invocation text as received from the platform.
    pub raw_text: String,
    /// Platform-cleaned invocation text (mentions resolved, etc.).
    pub clean_text: String,
    /// Unix timestamp of the invocation.
    pub timestamp: i64,
    reply_sink: &'a dyn ReplySink,
    directory: &'a dyn ChatDirectory,
}

impl<'a> CommandContext<'a> {
    /// Build a context from a platform invocation, resolving the
    /// invoking user's canonical identity.
    pub fn new(
        source: CommandSource,
        raw_text: impl Into<String>,
        clean_text: impl Into<String>,
        timestamp: i64,
        data: &'a mut BotData,
        reply_sink: &'a dyn ReplySink,
        directory: &'a dyn ChatDirectory,
    ) -> Self {
        let canonical_id = resolve_canonical_id(data, source.platform(), &source.local_id());
        Self {
            data,
            source,
            canonical_id,
            raw_text: raw_text.into(),
            clean_text: clean_text.into(),
            timestamp,
            reply_sink,
            directory,
        }
    }

    pub fn platform(&self) -> Platform {
        self.source.platform()
    }

    pub fn local_id(&self) -> String {
        self.source.local_id()
    }

    pub fn display_name(&self) -> &str {
        self.source.display_name()
    }

    /// Moderator capability: Discord staff-channel view permission,
    /// Twitch native mod flag, never for relay users.
    pub fn is_moderator(&self) -> bool {
        match &self.source {
            CommandSource::Twitch { is_moderator, .. } => *is_moderator,
            CommandSource::Discord { is_staff, .. } => *is_staff,
            CommandSource::Petal { .. } => false,
        }
    }

    /// Subscriber capability check.
    ///
    /// Twitch and Discord answer from flags captured with the invocation;
    /// the relay requires a live lookup against current Twitch chat
    /// membership, which may not be resolvable.
    pub async fn subscriber_status(&self) -> SubStatus {
        match &self.source {
            CommandSource::Twitch { is_subscriber, .. } => bool_status(*is_subscriber),
            CommandSource::Discord {
                has_subscriber_role,
                ..
            } => bool_status(*has_subscriber_role),
            CommandSource::Petal { .. } => {
                let Some(canonical) = &self.canonical_id else {
                    return SubStatus::Unknown;
                };
                match self.directory.subscriber_status(canonical).await {
                    Ok(Some(true)) => SubStatus::Subscribed,
                    Ok(Some(false)) => SubStatus::NotSubscribed,
                    Ok(None) => SubStatus::Unknown,
                    Err(e) => {
                        warn!(error = %e, "subscriber lookup failed, treating as unknown");
                        SubStatus::Unknown
                    }
                }
            }
        }
    }

    /// The currently configured command prefix for this platform, read
    /// live from the document so a moderator's prefix change takes effect
    /// on the next invocation without restart.
    pub fn prefix(&self) -> String {
        // The store seeds a default prefix for every platform at load.
        self.data
            .get_str(&self.platform().prefix_key())
            .unwrap_or_default()
            .to_string()
    }

    /// Send a reply through the originating front-end, formatted for this
    /// platform.
    pub async fn reply(&self, content: &str) -> Result<(), BotError> {
        let formatted = format::format_reply(self.platform(), content);
        self.reply_sink.send(&formatted).await
    }
}

fn bool_status(subscribed: bool) -> SubStatus {
    if subscribed {
        SubStatus::Subscribed
    } else {
        SubStatus::NotSubscribed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::ChannelInfo;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records formatted replies for assertions.
    pub struct RecordingSink {
        pub sent: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ReplySink for RecordingSink {
        async fn send(&self, text: &str) -> Result<(), BotError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    /// Directory stub with a fixed subscriber answer.
    pub struct StubDirectory {
        pub subscriber: Option<bool>,
    }

    #[async_trait]
    impl ChatDirectory for StubDirectory {
        async fn subscriber_status(
            &self,
            _canonical: &CanonicalId,
        ) -> Result<Option<bool>, BotError> {
            Ok(self.subscriber)
        }

        async fn display_name(&self, canonical: &CanonicalId) -> Result<String, BotError> {
            Ok(format!("user_{canonical}"))
        }

        async fn channel_info(&self) -> Result<ChannelInfo, BotError> {
            Ok(ChannelInfo {
                title: "test".into(),
                game_name: "testing".into(),
            })
        }
    }

    async fn loaded_data(dir: &TempDir) -> BotData {
        let mut data = BotData::new(dir.path().join("data.json"), "~", "🌿");
        data.load().await.unwrap();
        data
    }

    fn twitch_source() -> CommandSource {
        CommandSource::Twitch {
            user_id: "42".into(),
            login: "some_viewer".into(),
            is_moderator: false,
            is_subscriber: true,
        }
    }

    #[tokio::test]
    async fn twitch_user_resolves_to_itself() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let sink = RecordingSink::new();
        let directory = StubDirectory { subscriber: None };

        let ctx = CommandContext::new(
            twitch_source(),
            "~bal",
            "~bal",
            1_700_000_000,
            &mut data,
            &sink,
            &directory,
        );
        assert_eq!(ctx.canonical_id.as_ref().unwrap().as_str(), "42");
        assert_eq!(ctx.subscriber_status().await, SubStatus::Subscribed);
        assert!(!ctx.is_moderator());
    }

    #[tokio::test]
    async fn unlinked_discord_user_has_no_canonical_id() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let sink = RecordingSink::new();
        let directory = StubDirectory { subscriber: None };

        let source = CommandSource::Discord {
            user_id: 999,
            display_name: "viewer".into(),
            is_staff: true,
            has_subscriber_role: false,
        };
        let ctx = CommandContext::new(
            source,
            "~bal",
            "~bal",
            1_700_000_000,
            &mut data,
            &sink,
            &directory,
        );
        assert!(ctx.canonical_id.is_none());
        assert!(ctx.is_moderator());
        assert_eq!(ctx.subscriber_status().await, SubStatus::NotSubscribed);
    }

    #[tokio::test]
    async fn linked_discord_user_resolves() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        data.set("discord:999", "42");
        let sink = RecordingSink::new();
        let directory = StubDirectory { subscriber: None };

        let source = CommandSource::Discord {
            user_id: 999,
            display_name: "viewer".into(),
            is_staff: false,
            has_subscriber_role: false,
        };
        let ctx = CommandContext::new(
            source,
            "~bal",
            "~bal",
            1_700_000_000,
            &mut data,
            &sink,
            &directory,
        );
        assert_eq!(ctx.canonical_id.as_ref().unwrap().as_str(), "42");
    }

    #[tokio::test]
    async fn petal_subscriber_check_is_a_live_lookup() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        data.set("petal:relay_friend", "42");
        let sink = RecordingSink::new();

        let source = CommandSource::Petal {
            display_name: "relay_friend".into(),
        };

        let resolvable = StubDirectory {
            subscriber: Some(true),
        };
        let ctx = CommandContext::new(
            source.clone(),
            "~daily",
            "~daily",
            1_700_000_000,
            &mut data,
            &sink,
            &resolvable,
        );
        assert_eq!(ctx.subscriber_status().await, SubStatus::Subscribed);
        assert!(!ctx.is_moderator());
        drop(ctx);

        let unresolvable = StubDirectory { subscriber: None };
        let ctx = CommandContext::new(
            source,
            "~daily",
            "~daily",
            1_700_000_000,
            &mut data,
            &sink,
            &unresolvable,
        );
        assert_eq!(ctx.subscriber_status().await, SubStatus::Unknown);
    }

    #[tokio::test]
    async fn unlinked_petal_user_is_unknown_without_lookup() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let sink = RecordingSink::new();
        let directory = StubDirectory {
            subscriber: Some(true),
        };

        let source = CommandSource::Petal {
            display_name: "stranger".into(),
        };
        let ctx = CommandContext::new(
            source,
            "~daily",
            "~daily",
            1_700_000_000,
            &mut data,
            &sink,
            &directory,
        );
        assert_eq!(ctx.subscriber_status().await, SubStatus::Unknown);
    }

    #[tokio::test]
    async fn prefix_reads_live_from_the_document() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let sink = RecordingSink::new();
        let directory = StubDirectory { subscriber: None };

        let mut ctx = CommandContext::new(
            twitch_source(),
            "~bal",
            "~bal",
            1_700_000_000,
            &mut data,
            &sink,
            &directory,
        );
        assert_eq!(ctx.prefix(), "~");
        ctx.data.set("prefix:twitch", "!");
        assert_eq!(ctx.prefix(), "!");
    }

    #[tokio::test]
    async fn reply_is_formatted_for_the_platform() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let sink = RecordingSink::new();
        let directory = StubDirectory { subscriber: None };

        let ctx = CommandContext::new(
            twitch_source(),
            "~status",
            "~status",
            1_700_000_000,
            &mut data,
            &sink,
            &directory,
        );
        ctx.reply("**Online**\n**Stream:** <https://twitch.tv/x/>")
            .await
            .unwrap();

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent[0], "Online | Stream: https://twitch.tv/x");
    }
}
