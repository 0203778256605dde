//! Cross-platform identity linking.
//!
//! Maps platform-local user handles to one canonical account (the Twitch
//! user id) and back. A link starts on a non-Twitch platform, which issues
//! a single-use code; presenting that code from Twitch chat completes the
//! link and writes the permanent mapping.
//!
//! Codes have no TTL: a pending code is invalidated only by a newer code
//! being issued for the same source.

pub mod linker;

pub use linker::{begin_link, complete_link, resolve_canonical_id, PendingLink};
