//! The channel-currency ledger.
//!
//! All operations work directly against the shared [`BotData`] document
//! and follow its cooperative single-writer discipline: read, mutate,
//! save, with no awaits on shared state in between. Randomness is always
//! injected by the caller so every outcome is reproducible under test.
//!
//! # Architecture
//!
//! - [`score`]: passive chat-activity scoring (word richness + emotes)
//! - [`lootbox`]: rarity model and box records
//! - [`ledger`]: balance mutations, daily claims, purchases, leaderboard
//!
//! [`BotData`]: trellis_store::BotData

pub mod ledger;
pub mod lootbox;
pub mod score;

pub use ledger::{
    balance, box_inventory, buy_boxes, daily_claim, leaderboard_top, record_activity,
    BoxQuantity, DailyOutcome, PurchaseReceipt, DAILY_COOLDOWN_SECS, LOOT_BOX_UNIT_PRICE,
    PARTIAL_CONVERSION_THRESHOLD,
};
pub use lootbox::{draw_rarity, LootBox, Rarity};
pub use score::{levenshtein, message_score, word_richness};
