//! Loot box records and the rarity model.
//!
//! Boxes are purchase-only for now; opening them is a deliberate
//! extension point. Each box carries immutable provenance so future
//! opening mechanics can depend on the circumstances of the purchase.

use rand::Rng;
use serde::{Deserialize, Serialize};

use trellis_types::Platform;

/// Box rarity, rarest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Legendary,
    Mythic,
    Rare,
    Uncommon,
    Common,
}

impl Rarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Legendary => "legendary",
            Rarity::Mythic => "mythic",
            Rarity::Rare => "rare",
            Rarity::Uncommon => "uncommon",
            Rarity::Common => "common",
        }
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One independent rarity draw against cumulative thresholds on a
/// uniform [0, 1) roll: 1% legendary, 4% mythic, 10% rare, 25% uncommon,
/// 60% common.
pub fn draw_rarity(rng: &mut impl Rng) -> Rarity {
    let roll: f64 = rng.gen();
    if roll < 0.01 {
        Rarity::Legendary
    } else if roll < 0.05 {
        Rarity::Mythic
    } else if roll < 0.15 {
        Rarity::Rare
    } else if roll < 0.40 {
        Rarity::Uncommon
    } else {
        Rarity::Common
    }
}

/// A purchased, unopened box as stored in `boxes:<canonicalId>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LootBox {
    pub rarity: Rarity,
    /// Canonical account that bought the box.
    pub source_canonical_id: String,
    /// Platform the purchase came in from.
    pub source_platform: Platform,
    /// Platform-local id of the purchaser at purchase time.
    pub source_local_id: String,
    /// Unix timestamp of the purchase.
    pub created_at: i64,
    pub was_subscriber_at_creation: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rarity_distribution_converges() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut counts = [0u32; 5];
        let draws = 200_000;
        for _ in 0..draws {
            match draw_rarity(&mut rng) {
                Rarity::Legendary => counts[0] += 1,
                Rarity::Mythic => counts[1] += 1,
                Rarity::Rare => counts[2] += 1,
                Rarity::Uncommon => counts[3] += 1,
                Rarity::Common => counts[4] += 1,
            }
        }
        let fraction = |c: u32| f64::from(c) / f64::from(draws);
        assert!((fraction(counts[0]) - 0.01).abs() < 0.005);
        assert!((fraction(counts[1]) - 0.04).abs() < 0.005);
        assert!((fraction(counts[2]) - 0.10).abs() < 0.01);
        assert!((fraction(counts[3]) - 0.25).abs() < 0.01);
        assert!((fraction(counts[4]) - 0.60).abs() < 0.01);
    }

    #[test]
    fn box_record_round_trips_through_json() {
        let lootbox = LootBox {
            rarity: Rarity::Rare,
            source_canonical_id: "42".into(),
            source_platform: Platform::Discord,
            source_local_id: "999".into(),
            created_at: 1_700_000_000,
            was_subscriber_at_creation: true,
        };
        let value = serde_json::to_value(&lootbox).unwrap();
        assert_eq!(value["rarity"], "rare");
        assert_eq!(value["source_platform"], "discord");
        let back: LootBox = serde_json::from_value(value).unwrap();
        assert_eq!(back, lootbox);
    }
}
