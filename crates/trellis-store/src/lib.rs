//! Crash-safe persistent store for the entire bot state.
//!
//! The whole application state is one JSON object document at a configured
//! path, pretty-printed with sorted keys for diff-friendliness and manual
//! recovery. [`BotData::save`] guarantees the on-disk file is always either
//! the old complete document or the new complete document: the new document
//! is written to a sibling temp file and renamed over the target, and the
//! prior on-disk content is held in an in-memory backup that is restored if
//! the replacement fails partway.
//!
//! # Concurrency
//!
//! `BotData` is a single-writer structure. Command handlers run serialized
//! on one task and must not await on shared state between reading the
//! document and the corresponding `save`; that cooperative discipline is
//! the sole concurrency-safety mechanism (there are no locks). No external
//! process may write the document concurrently (single-instance deployment
//! assumption).

pub mod data;
pub mod keys;

pub use data::BotData;
