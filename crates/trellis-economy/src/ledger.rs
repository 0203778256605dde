//! Balance mutations, daily claims, loot box purchases, leaderboard.
//!
//! Every mutating operation validates first, mutates second, and saves
//! once at the end. A failed validation leaves the document untouched; a
//! failed save rolls back the on-disk file (see the store) and surfaces
//! as `Persistence`, so the on-disk balance is never a partial batch.

use rand::Rng;
use serde_json::Value;
use tracing::{debug, info};

use trellis_store::{keys, BotData};
use trellis_types::{BotError, CanonicalId, Platform};

use crate::lootbox::{draw_rarity, LootBox};

/// Daily claims unlock 12 hours after the previous claim.
pub const DAILY_COOLDOWN_SECS: i64 = 12 * 60 * 60;

/// Sub-units of passive accrual per whole currency unit.
pub const PARTIAL_CONVERSION_THRESHOLD: u64 = 100;

/// Price of one loot box in whole currency units.
pub const LOOT_BOX_UNIT_PRICE: u64 = 50;

// ---------------------------------------------------------------------------
// Balance primitives (in-memory only; callers save)
// ---------------------------------------------------------------------------

pub fn balance(data: &BotData, id: &CanonicalId) -> u64 {
    data.get_u64(&keys::balance(id))
}

fn credit(data: &mut BotData, id: &CanonicalId, amount: u64) -> u64 {
    let new_balance = balance(data, id) + amount;
    data.set(keys::balance(id), new_balance);
    new_balance
}

fn debit(data: &mut BotData, id: &CanonicalId, amount: u64) -> Result<u64, BotError> {
    let available = balance(data, id);
    if amount > available {
        return Err(BotError::InsufficientFunds {
            needed: amount,
            available,
        });
    }
    let new_balance = available - amount;
    data.set(keys::balance(id), new_balance);
    Ok(new_balance)
}

// ---------------------------------------------------------------------------
// Passive accrual
// ---------------------------------------------------------------------------

/// Add one message's activity score to the user's sub-unit bucket,
/// converting whole units into the balance once the threshold is
/// crossed. Persists only when the score is non-zero.
///
/// Callers gate on live status and filter out the bot's own messages;
/// scores for those never reach this function.
pub async fn record_activity(
    data: &mut BotData,
    id: &CanonicalId,
    score: u64,
) -> Result<(), BotError> {
    if score == 0 {
        return Ok(());
    }

    let partial_key = keys::partial_balance(id);
    let mut partial = data.get_u64(&partial_key) + score;
    let whole_units = partial / PARTIAL_CONVERSION_THRESHOLD;
    partial %= PARTIAL_CONVERSION_THRESHOLD;

    data.set(partial_key, partial);
    if whole_units > 0 {
        let new_balance = credit(data, id, whole_units);
        debug!(id = %id, converted = whole_units, balance = new_balance, "partial balance converted");
    }
    data.save("chat activity").await
}

// ---------------------------------------------------------------------------
// Daily claim
// ---------------------------------------------------------------------------

/// Result of a daily-claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DailyOutcome {
    Claimed {
        reward: u64,
        total: u64,
        sub_bonus: bool,
    },
    /// Claimed within the last 12 hours; nothing mutated.
    OnCooldown,
}

/// Attempt a daily claim at `now` (unix seconds).
///
/// Callers verify the channel is live and the user is linked before
/// calling. The document is persisted before `Claimed` is returned, so a
/// success reply is never sent for an unsaved reward.
pub async fn daily_claim(
    data: &mut BotData,
    id: &CanonicalId,
    now: i64,
    is_subscriber: bool,
    rng: &mut impl Rng,
) -> Result<DailyOutcome, BotError> {
    let ts_key = keys::daily_claim_ts(id);
    let last_claim = data.get_i64(&ts_key);
    if now < last_claim + DAILY_COOLDOWN_SECS {
        return Ok(DailyOutcome::OnCooldown);
    }

    data.set(ts_key, now);
    let upper = if is_subscriber { 100 } else { 50 };
    let reward = rng.gen_range(10..=upper);
    let total = credit(data, id, reward);

    // First claim ever: enter the leaderboard, re-sorting once. After
    // this the array order is approximate by design.
    if last_claim == 0 {
        insert_into_leaderboard(data, id);
    }

    data.save("daily claim").await?;
    info!(id = %id, reward, total, sub_bonus = is_subscriber, "daily claimed");
    Ok(DailyOutcome::Claimed {
        reward,
        total,
        sub_bonus: is_subscriber,
    })
}

fn insert_into_leaderboard(data: &mut BotData, id: &CanonicalId) {
    let mut ids: Vec<String> = data
        .get_array(keys::BALANCE_LEADERBOARD)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    if !ids.iter().any(|existing| existing == id.as_str()) {
        ids.push(id.as_str().to_string());
    }
    ids.sort_by_key(|entry| std::cmp::Reverse(data.get_u64(&format!("bal:{entry}"))));
    data.set(keys::BALANCE_LEADERBOARD, ids);
}

/// Top `n` canonical ids by the approximate leaderboard order. Name
/// resolution is the caller's concern.
pub fn leaderboard_top(data: &BotData, n: usize) -> Vec<String> {
    data.get_array(keys::BALANCE_LEADERBOARD)
        .map(|entries| {
            entries
                .iter()
                .take(n)
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Loot box purchase
// ---------------------------------------------------------------------------

/// How many boxes to buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxQuantity {
    Count(u64),
    /// As many as the balance affords, at least one attempted.
    All,
}

/// Receipt for a completed batch purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseReceipt {
    pub count: u64,
    pub unit_price: u64,
    pub total_cost: u64,
    pub remaining_balance: u64,
}

/// Buy a batch of loot boxes: one debit, one save, however many boxes.
///
/// `InsufficientFunds` rejects the whole batch before any mutation.
#[allow(clippy::too_many_arguments)]
pub async fn buy_boxes(
    data: &mut BotData,
    id: &CanonicalId,
    quantity: BoxQuantity,
    source_platform: Platform,
    source_local_id: &str,
    was_subscriber: bool,
    now: i64,
    rng: &mut impl Rng,
) -> Result<PurchaseReceipt, BotError> {
    let count = match quantity {
        BoxQuantity::Count(n) => n.max(1),
        BoxQuantity::All => (balance(data, id) / LOOT_BOX_UNIT_PRICE).max(1),
    };
    // A quantity whose cost overflows u64 can never be affordable; it
    // must not wrap into a small debit.
    let Some(total_cost) = LOOT_BOX_UNIT_PRICE.checked_mul(count) else {
        return Err(BotError::InsufficientFunds {
            needed: u64::MAX,
            available: balance(data, id),
        });
    };
    let remaining_balance = debit(data, id, total_cost)?;

    let boxes_key = keys::loot_boxes(id);
    for _ in 0..count {
        let lootbox = LootBox {
            rarity: draw_rarity(rng),
            source_canonical_id: id.as_str().to_string(),
            source_platform,
            source_local_id: source_local_id.to_string(),
            created_at: now,
            was_subscriber_at_creation: was_subscriber,
        };
        let record = serde_json::to_value(&lootbox)
            .map_err(|e| BotError::Persistence(format!("encoding loot box: {e}")))?;
        data.push(&boxes_key, record);
    }

    data.save("loot box purchase").await?;
    info!(id = %id, count, total_cost, remaining_balance, "boxes purchased");
    Ok(PurchaseReceipt {
        count,
        unit_price: LOOT_BOX_UNIT_PRICE,
        total_cost,
        remaining_balance,
    })
}

/// The user's unopened boxes.
pub fn box_inventory(data: &BotData, id: &CanonicalId) -> Vec<LootBox> {
    data.get_array(&keys::loot_boxes(id))
        .map(|entries| {
            entries
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    async fn loaded_data(dir: &TempDir) -> BotData {
        let mut data = BotData::new(dir.path().join("data.json"), "~", "🌿");
        data.load().await.unwrap();
        data
    }

    fn id(s: &str) -> CanonicalId {
        CanonicalId::new(s)
    }

    #[tokio::test]
    async fn daily_claim_credits_and_persists() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let mut rng = StdRng::seed_from_u64(7);
        let user = id("42");

        let outcome = daily_claim(&mut data, &user, 1_700_000_000, false, &mut rng)
            .await
            .unwrap();
        let DailyOutcome::Claimed { reward, total, sub_bonus } = outcome else {
            panic!("expected a claim");
        };
        assert!((10..=50).contains(&reward));
        assert_eq!(total, reward);
        assert!(!sub_bonus);
        assert_eq!(balance(&data, &user), reward);

        // Persisted before the outcome was returned.
        let mut reloaded = BotData::new(dir.path().join("data.json"), "~", "🌿");
        reloaded.load().await.unwrap();
        assert_eq!(balance(&reloaded, &user), reward);
    }

    #[tokio::test]
    async fn daily_claim_respects_cooldown_without_mutation() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let mut rng = StdRng::seed_from_u64(7);
        let user = id("42");
        let start = 1_700_000_000;

        let first = daily_claim(&mut data, &user, start, false, &mut rng)
            .await
            .unwrap();
        let DailyOutcome::Claimed { total, .. } = first else {
            panic!("expected a claim");
        };

        // One second shy of the boundary.
        let early = daily_claim(
            &mut data,
            &user,
            start + DAILY_COOLDOWN_SECS - 1,
            false,
            &mut rng,
        )
        .await
        .unwrap();
        assert_eq!(early, DailyOutcome::OnCooldown);
        assert_eq!(balance(&data, &user), total);

        // Exactly at the boundary.
        let at_boundary = daily_claim(&mut data, &user, start + DAILY_COOLDOWN_SECS, false, &mut rng)
            .await
            .unwrap();
        assert!(matches!(at_boundary, DailyOutcome::Claimed { .. }));
    }

    #[tokio::test]
    async fn subscriber_reward_range_is_wider() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let mut rng = StdRng::seed_from_u64(1);
        let mut saw_above_fifty = false;
        for i in 0..200 {
            let user = id(&format!("u{i}"));
            let outcome = daily_claim(&mut data, &user, 1_700_000_000, true, &mut rng)
                .await
                .unwrap();
            let DailyOutcome::Claimed { reward, .. } = outcome else {
                panic!("expected a claim");
            };
            assert!((10..=100).contains(&reward));
            if reward > 50 {
                saw_above_fifty = true;
            }
        }
        assert!(saw_above_fifty);
    }

    #[tokio::test]
    async fn first_claim_enters_leaderboard_sorted_by_balance() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let mut rng = StdRng::seed_from_u64(7);

        let rich = id("rich");
        data.set("bal:rich", 1_000u64);
        daily_claim(&mut data, &rich, 1_700_000_000, false, &mut rng)
            .await
            .unwrap();

        let poor = id("poor");
        daily_claim(&mut data, &poor, 1_700_000_000, false, &mut rng)
            .await
            .unwrap();

        assert_eq!(leaderboard_top(&data, 10), vec!["rich", "poor"]);

        // A second claim must not re-insert or re-sort.
        daily_claim(
            &mut data,
            &poor,
            1_700_000_000 + DAILY_COOLDOWN_SECS,
            false,
            &mut rng,
        )
        .await
        .unwrap();
        assert_eq!(leaderboard_top(&data, 10).len(), 2);
    }

    #[tokio::test]
    async fn buybox_scenario_two_at_unit_price() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let mut rng = StdRng::seed_from_u64(7);
        let user = id("42");
        data.set("bal:42", 120u64);

        let receipt = buy_boxes(
            &mut data,
            &user,
            BoxQuantity::Count(2),
            Platform::Twitch,
            "42",
            false,
            1_700_000_000,
            &mut rng,
        )
        .await
        .unwrap();

        assert_eq!(receipt.count, 2);
        assert_eq!(receipt.total_cost, 100);
        assert_eq!(receipt.remaining_balance, 20);
        assert_eq!(balance(&data, &user), 20);

        let inventory = box_inventory(&data, &user);
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory[0].source_canonical_id, "42");
        assert_eq!(inventory[0].created_at, 1_700_000_000);

        // The whole batch landed in one save.
        let mut reloaded = BotData::new(dir.path().join("data.json"), "~", "🌿");
        reloaded.load().await.unwrap();
        assert_eq!(balance(&reloaded, &user), 20);
        assert_eq!(box_inventory(&reloaded, &user).len(), 2);
    }

    #[tokio::test]
    async fn insufficient_funds_rejects_before_mutation() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let mut rng = StdRng::seed_from_u64(7);
        let user = id("42");
        data.set("bal:42", 80u64);

        let err = buy_boxes(
            &mut data,
            &user,
            BoxQuantity::Count(2),
            Platform::Twitch,
            "42",
            false,
            1_700_000_000,
            &mut rng,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            BotError::InsufficientFunds {
                needed: 100,
                available: 80
            }
        ));
        assert_eq!(balance(&data, &user), 80);
        assert!(box_inventory(&data, &user).is_empty());
    }

    #[tokio::test]
    async fn buy_all_floors_to_affordable_count() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let mut rng = StdRng::seed_from_u64(7);
        let user = id("42");
        data.set("bal:42", 170u64);

        let receipt = buy_boxes(
            &mut data,
            &user,
            BoxQuantity::All,
            Platform::Discord,
            "999",
            true,
            1_700_000_000,
            &mut rng,
        )
        .await
        .unwrap();
        assert_eq!(receipt.count, 3);
        assert_eq!(receipt.remaining_balance, 20);
        assert!(box_inventory(&data, &user)
            .iter()
            .all(|b| b.was_subscriber_at_creation));
    }

    #[tokio::test]
    async fn overflowing_quantity_is_insufficient_without_mutation() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let mut rng = StdRng::seed_from_u64(7);
        let user = id("42");
        data.set("bal:42", 30u64);

        // 50 * this wraps to 30 in two's complement; the ledger must
        // reject it instead of passing the debit.
        let err = buy_boxes(
            &mut data,
            &user,
            BoxQuantity::Count(7_378_697_629_483_820_647),
            Platform::Twitch,
            "42",
            false,
            1_700_000_000,
            &mut rng,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BotError::InsufficientFunds { .. }));
        assert_eq!(balance(&data, &user), 30);
        assert!(box_inventory(&data, &user).is_empty());
    }

    #[tokio::test]
    async fn buy_all_with_empty_balance_is_insufficient() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let mut rng = StdRng::seed_from_u64(7);
        let user = id("42");

        let err = buy_boxes(
            &mut data,
            &user,
            BoxQuantity::All,
            Platform::Twitch,
            "42",
            false,
            1_700_000_000,
            &mut rng,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, BotError::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn activity_accrues_and_converts_with_carry() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let user = id("42");

        record_activity(&mut data, &user, 70).await.unwrap();
        assert_eq!(data.get_u64("partial_bal:42"), 70);
        assert_eq!(balance(&data, &user), 0);

        record_activity(&mut data, &user, 45).await.unwrap();
        assert_eq!(data.get_u64("partial_bal:42"), 15);
        assert_eq!(balance(&data, &user), 1);

        // Zero-score messages neither mutate nor save.
        record_activity(&mut data, &user, 0).await.unwrap();
        assert_eq!(data.get_u64("partial_bal:42"), 15);
    }

    #[tokio::test]
    async fn large_activity_score_converts_multiple_units() {
        let dir = TempDir::new().unwrap();
        let mut data = loaded_data(&dir).await;
        let user = id("42");

        record_activity(&mut data, &user, 250).await.unwrap();
        assert_eq!(balance(&data, &user), 2);
        assert_eq!(data.get_u64("partial_bal:42"), 50);
    }
}
