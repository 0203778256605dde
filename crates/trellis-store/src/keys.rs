//! Key builders for the flat, string-keyed persisted document.
//!
//! The document layout is intentionally flat so it stays greppable and
//! hand-editable. Platform-scoped keys (`prefix:<platform>`,
//! `<platform>:<localId>`, `link:<platform>_<localId>`) are built by
//! [`trellis_types::Platform`]; the economy keys live here.

use trellis_types::CanonicalId;

/// Global key: the currency display symbol.
pub const CURRENCY_EMOJI: &str = "currency_emoji";

/// Global key: canonical ids ordered descending by balance.
///
/// This is an approximate structure: a user is inserted once on their first
/// daily claim (with a one-time re-sort at that moment) and never moved
/// afterward, so it goes stale relative to live balances between
/// insertions. Documented tradeoff, not a bug.
pub const BALANCE_LEADERBOARD: &str = "bal:sorted";

/// Global key: users who asked to be reminded when dailies reset.
pub const DAILY_REMINDERS: &str = "daily_reminders_list";

/// Prefix shared by all pending-link records.
pub const PENDING_LINK_PREFIX: &str = "link:";

/// Whole-unit currency balance for a user.
pub fn balance(id: &CanonicalId) -> String {
    format!("bal:{id}")
}

/// Fractional accrual bucket (integer sub-units) for a user.
pub fn partial_balance(id: &CanonicalId) -> String {
    format!("partial_bal:{id}")
}

/// Unix timestamp of the user's most recent successful daily claim.
pub fn daily_claim_ts(id: &CanonicalId) -> String {
    format!("daily_ts:{id}")
}

/// Loot box inventory for a user.
pub fn loot_boxes(id: &CanonicalId) -> String {
    format!("boxes:{id}")
}

/// Static info text for a topic, e.g. `info("faq")` -> `"info:faq"`.
pub fn info(topic: &str) -> String {
    format!("info:{topic}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn economy_keys_embed_the_canonical_id() {
        let id = CanonicalId::from("42");
        assert_eq!(balance(&id), "bal:42");
        assert_eq!(partial_balance(&id), "partial_bal:42");
        assert_eq!(daily_claim_ts(&id), "daily_ts:42");
        assert_eq!(loot_boxes(&id), "boxes:42");
        assert_eq!(info("lobby"), "info:lobby");
    }
}
