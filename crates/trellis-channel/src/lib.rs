//! Unified command-context abstraction for Trellis.
//!
//! Every command handler is written once against [`CommandContext`] and
//! behaves identically in substance on every platform, differing only in
//! reply formatting. The platform front-ends (external collaborators)
//! build a [`CommandSource`] per incoming invocation and hand it to the
//! context factory; the collaborator traits in [`boundary`] are the only
//! surface the core uses to talk back to the platforms.
//!
//! # Architecture
//!
//! - [`boundary`]: traits the platform front-ends implement
//! - [`source`]: tagged per-platform invocation records
//! - [`context`]: the normalized command context
//! - [`format`]: platform-appropriate reply formatting
//! - [`petal`]: JSON envelope protocol for the Petal relay

pub mod boundary;
pub mod context;
pub mod format;
pub mod petal;
pub mod source;

pub use boundary::{
    AlertSink, ChannelInfo, ChatDirectory, LiveStatus, PrivateMessenger, ReplySink,
};
pub use context::{CommandContext, SubStatus};
pub use source::CommandSource;
