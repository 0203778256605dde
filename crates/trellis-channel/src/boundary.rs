//! Collaborator traits at the platform boundary.
//!
//! The core never talks to a platform SDK directly; each front-end
//! supplies these capabilities. Network calls behind them are suspension
//! points, so handlers must not invoke them between reading economy state
//! and the corresponding save (see the store's concurrency notes).

use async_trait::async_trait;

use trellis_types::{BotError, CanonicalId};

/// Sends a reply back through the originating platform front-end.
///
/// The text passed in is already formatted for the platform (see
/// [`crate::format`]).
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), BotError>;
}

/// Answers whether the primary channel is currently live.
///
/// Consumed by the ledger's daily-claim and passive-scoring logic.
#[async_trait]
pub trait LiveStatus: Send + Sync {
    async fn is_live(&self) -> Result<bool, BotError>;
}

/// Channel metadata for status and alert commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub title: String,
    pub game_name: String,
}

/// Looks up Twitch-side facts about a canonical account.
#[async_trait]
pub trait ChatDirectory: Send + Sync {
    /// Whether the account is currently subscribed; `None` when the
    /// platform cannot determine it right now (e.g. a relay user not
    /// recently seen in Twitch chat). Callers must treat `None` as
    /// distinct from `Some(false)`.
    async fn subscriber_status(&self, canonical: &CanonicalId)
        -> Result<Option<bool>, BotError>;

    /// Display name for a canonical id, for leaderboard rendering.
    async fn display_name(&self, canonical: &CanonicalId) -> Result<String, BotError>;

    /// Current title and game of the primary channel.
    async fn channel_info(&self) -> Result<ChannelInfo, BotError>;
}

/// Delivers text privately to one platform-local user, outside any
/// public channel (a Discord direct message).
///
/// Used for link codes: the code is the only secret in the link flow,
/// so it must never land where other users can read it.
#[async_trait]
pub trait PrivateMessenger: Send + Sync {
    async fn send_private(&self, local_id: &str, text: &str) -> Result<(), BotError>;
}

/// Posts stream-alert announcements to the outward-facing surfaces.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Announce in the Discord alerts channel.
    async fn announce_discord(&self, text: &str) -> Result<(), BotError>;

    /// Post to the microblogging service.
    async fn post_microblog(&self, text: &str) -> Result<(), BotError>;
}
