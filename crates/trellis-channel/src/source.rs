//! Per-platform invocation records.
//!
//! The platform is a closed tagged union with one variant record per
//! platform, so an unrecognized invocation shape is unrepresentable
//! past the front-end boundary.

use trellis_types::Platform;

/// A raw command invocation as delivered by one platform front-end.
///
/// Capability flags are computed by the front-end from platform-native
/// data (Discord staff-channel permission, Twitch badges) before the
/// core ever sees the invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSource {
    /// Twitch chat. The user id is the canonical id.
    Twitch {
        user_id: String,
        login: String,
        /// Native moderator flag from message badges.
        is_moderator: bool,
        /// Native subscriber flag from message badges.
        is_subscriber: bool,
    },
    /// Discord. Local id is the author's snowflake.
    Discord {
        user_id: u64,
        display_name: String,
        /// Whether the author can view the staff channel.
        is_staff: bool,
        /// Whether the author carries the subscriber role.
        has_subscriber_role: bool,
    },
    /// Petal relay. Local id is the relay display name; relay users are
    /// never moderators.
    Petal { display_name: String },
}

impl CommandSource {
    pub fn platform(&self) -> Platform {
        match self {
            CommandSource::Twitch { .. } => Platform::Twitch,
            CommandSource::Discord { .. } => Platform::Discord,
            CommandSource::Petal { .. } => Platform::Petal,
        }
    }

    /// The platform-local id as the document stores it.
    pub fn local_id(&self) -> String {
        match self {
            CommandSource::Twitch { user_id, .. } => user_id.clone(),
            CommandSource::Discord { user_id, .. } => user_id.to_string(),
            CommandSource::Petal { display_name } => display_name.clone(),
        }
    }

    /// The author's display name on the source platform.
    pub fn display_name(&self) -> &str {
        match self {
            CommandSource::Twitch { login, .. } => login,
            CommandSource::Discord { display_name, .. } => display_name,
            CommandSource::Petal { display_name } => display_name,
        }
    }
}
