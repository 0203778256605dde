//! Trellis bot runtime: dispatcher, command set, and platform front-ends.
//!
//! # Architecture
//!
//! - [`dispatch`]: command registry shared by every platform
//! - [`commands`]: the built-in command set
//! - [`twitch`]: IRC-over-WebSocket protocol and Helix lookups
//! - [`discord`]: REST delivery and the alert fan-out
//! - [`petal`]: relay WebSocket transport
//! - [`runtime`]: the single-writer event loop that owns the document

pub mod commands;
pub mod discord;
pub mod dispatch;
pub mod petal;
pub mod runtime;
pub mod twitch;
