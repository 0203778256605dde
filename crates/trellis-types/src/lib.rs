//! Shared types for the Trellis chat bot.
//!
//! Trellis mirrors commands and a small virtual-currency economy across a
//! Twitch channel, a Discord server, and the Petal relay network. This crate
//! holds the pieces every other crate needs: the error taxonomy, the
//! [`Platform`] enum, the [`CanonicalId`] key type, and the typed
//! environment configuration.

pub mod config;
pub mod error;
pub mod ids;
pub mod platform;

pub use config::BotConfig;
pub use error::BotError;
pub use ids::CanonicalId;
pub use platform::Platform;
