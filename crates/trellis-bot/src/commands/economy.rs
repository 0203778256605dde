//! Ledger-backed commands: `daily`, `bal`, `lb`, `buybox`.

use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use tokio::sync::Mutex;
use tracing::warn;

use trellis_channel::{ChatDirectory, CommandContext, LiveStatus};
use trellis_economy::{
    balance, buy_boxes, daily_claim, leaderboard_top, BoxQuantity, DailyOutcome,
};
use trellis_store::keys;
use trellis_types::{BotError, CanonicalId};

use crate::dispatch::CommandHandler;

fn currency_emoji(ctx: &CommandContext<'_>) -> String {
    ctx.data
        .get_str(keys::CURRENCY_EMOJI)
        .unwrap_or_default()
        .to_string()
}

/// Resolve the canonical id or tell the user how to link.
async fn require_linked(ctx: &mut CommandContext<'_>) -> Result<Option<CanonicalId>, BotError> {
    if let Some(id) = ctx.canonical_id.clone() {
        return Ok(Some(id));
    }
    let discord_prefix = ctx
        .data
        .get_str(&trellis_types::Platform::Discord.prefix_key())
        .unwrap_or_default()
        .to_string();
    ctx.reply(&format!(
        "This command requires a linked account. Use {discord_prefix}link in Discord \
         to link your accounts."
    ))
    .await?;
    Ok(None)
}

// ---------------------------------------------------------------------------
// daily
// ---------------------------------------------------------------------------

pub struct DailyCommand {
    live: Arc<dyn LiveStatus>,
    broadcaster_channel: String,
    rng: Mutex<StdRng>,
}

impl DailyCommand {
    pub fn new(live: Arc<dyn LiveStatus>, broadcaster_channel: String, rng: StdRng) -> Self {
        Self {
            live,
            broadcaster_channel,
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl CommandHandler for DailyCommand {
    async fn run(&self, ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<(), BotError> {
        let Some(id) = require_linked(ctx).await? else {
            return Ok(());
        };
        if !self.live.is_live().await? {
            return ctx
                .reply(&format!(
                    "Since {} is not live, the daily command cannot be used.",
                    self.broadcaster_channel
                ))
                .await;
        }

        let subbed = ctx.subscriber_status().await.is_subscribed();
        let now = ctx.timestamp;
        let outcome = {
            let mut rng = self.rng.lock().await;
            daily_claim(ctx.data, &id, now, subbed, &mut *rng).await?
        };
        match outcome {
            DailyOutcome::Claimed {
                reward,
                total,
                sub_bonus,
            } => {
                let emoji = currency_emoji(ctx);
                let bonus = if sub_bonus { " (sub bonus)" } else { "" };
                ctx.reply(&format!(
                    "Thanks for claiming your daily! Got {reward}{emoji}{bonus}, \
                     Total: {total}{emoji}"
                ))
                .await
            }
            DailyOutcome::OnCooldown => {
                ctx.reply("You have already claimed a daily in the last 12 hours! Try again later.")
                    .await
            }
        }
    }
}

// ---------------------------------------------------------------------------
// bal
// ---------------------------------------------------------------------------

pub struct BalCommand;

#[async_trait]
impl CommandHandler for BalCommand {
    async fn run(&self, ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<(), BotError> {
        let Some(id) = require_linked(ctx).await? else {
            return Ok(());
        };
        let bal = balance(ctx.data, &id);
        let emoji = currency_emoji(ctx);
        ctx.reply(&format!("You have {bal}{emoji}")).await
    }
}

// ---------------------------------------------------------------------------
// lb
// ---------------------------------------------------------------------------

pub struct LbCommand {
    directory: Arc<dyn ChatDirectory>,
}

impl LbCommand {
    pub fn new(directory: Arc<dyn ChatDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl CommandHandler for LbCommand {
    async fn run(&self, ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<(), BotError> {
        let ids = leaderboard_top(ctx.data, 10);
        let mut entries = Vec::with_capacity(ids.len());
        for (rank, id) in ids.iter().enumerate() {
            let canonical = CanonicalId::new(id);
            let name = match self.directory.display_name(&canonical).await {
                Ok(name) => name,
                Err(e) => {
                    warn!(id = %id, error = %e, "leaderboard name lookup failed");
                    id.clone()
                }
            };
            entries.push(format!("{}. {name}", rank + 1));
        }
        let emoji = currency_emoji(ctx);
        ctx.reply(&format!("{emoji} leaderboard: {}", entries.join(", ")))
            .await
    }
}

// ---------------------------------------------------------------------------
// buybox
// ---------------------------------------------------------------------------

pub struct BuyboxCommand {
    rng: Mutex<StdRng>,
}

impl BuyboxCommand {
    pub fn new(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl CommandHandler for BuyboxCommand {
    async fn run(&self, ctx: &mut CommandContext<'_>, args: &[&str]) -> Result<(), BotError> {
        let Some(id) = require_linked(ctx).await? else {
            return Ok(());
        };
        let quantity = match args.first() {
            None => BoxQuantity::Count(1),
            Some(arg) if arg.eq_ignore_ascii_case("all") => BoxQuantity::All,
            Some(arg) => match arg.parse::<u64>() {
                Ok(n) if n > 0 => BoxQuantity::Count(n),
                _ => {
                    return ctx.reply("Usage: buybox <count|all>").await;
                }
            },
        };

        let subbed = ctx.subscriber_status().await.is_subscribed();
        let platform = ctx.platform();
        let local_id = ctx.local_id();
        let now = ctx.timestamp;
        let receipt = {
            let mut rng = self.rng.lock().await;
            buy_boxes(
                ctx.data, &id, quantity, platform, &local_id, subbed, now, &mut *rng,
            )
            .await?
        };

        let emoji = currency_emoji(ctx);
        let plural = if receipt.count == 1 { "box" } else { "boxes" };
        ctx.reply(&format!(
            "Bought {} {plural} for {}{emoji}! Remaining balance: {}{emoji}",
            receipt.count, receipt.total_cost, receipt.remaining_balance
        ))
        .await
    }
}
