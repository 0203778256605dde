//! The single-writer event loop.
//!
//! Every platform front-end delivers inbound traffic as a [`BotEvent`]
//! over one channel; this loop owns the [`BotData`] document exclusively
//! and processes events one at a time, which is what makes the store's
//! read-modify-write-save sequences atomic without locks.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, warn};

use trellis_channel::petal::mirror_line;
use trellis_channel::{ChatDirectory, CommandContext, CommandSource, LiveStatus};
use trellis_economy::{message_score, record_activity};
use trellis_store::BotData;
use trellis_types::{BotConfig, BotError, CanonicalId};

use crate::discord::{DiscordMessageEvent, DiscordReplySink, DiscordRest};
use crate::dispatch::CommandRegistry;
use crate::petal::{PetalReplySink, RelayMessage};
use crate::twitch::{TwitchChatMessage, TwitchIrc, TwitchReplySink};

/// One inbound event from any front-end.
#[derive(Debug)]
pub enum BotEvent {
    Twitch(TwitchChatMessage),
    Discord(DiscordMessageEvent),
    Petal(RelayMessage),
}

pub struct Runtime {
    config: BotConfig,
    data: BotData,
    registry: CommandRegistry,
    live: Arc<dyn LiveStatus>,
    directory: Arc<dyn ChatDirectory>,
    irc: Arc<TwitchIrc>,
    twitch_out: mpsc::Sender<String>,
    petal_out: mpsc::Sender<String>,
    rest: Arc<DiscordRest>,
}

impl Runtime {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: BotConfig,
        data: BotData,
        registry: CommandRegistry,
        live: Arc<dyn LiveStatus>,
        directory: Arc<dyn ChatDirectory>,
        irc: Arc<TwitchIrc>,
        twitch_out: mpsc::Sender<String>,
        petal_out: mpsc::Sender<String>,
        rest: Arc<DiscordRest>,
    ) -> Self {
        Self {
            config,
            data,
            registry,
            live,
            directory,
            irc,
            twitch_out,
            petal_out,
            rest,
        }
    }

    /// Drain events until every front-end sender is gone. Structural
    /// errors from a single event are logged, not fatal; the loop keeps
    /// serving the other platforms.
    pub async fn run(mut self, mut events: mpsc::Receiver<BotEvent>) {
        while let Some(event) = events.recv().await {
            if let Err(e) = self.handle_event(event).await {
                error!(error = %e, "event handling failed");
            }
        }
    }

    async fn handle_event(&mut self, event: BotEvent) -> Result<(), BotError> {
        let now = chrono::Utc::now().timestamp();
        match event {
            BotEvent::Twitch(msg) => self.handle_twitch(msg, now).await,
            BotEvent::Discord(msg) => self.handle_discord(msg, now).await,
            BotEvent::Petal(msg) => self.handle_petal(msg, now).await,
        }
    }

    async fn handle_twitch(&mut self, msg: TwitchChatMessage, now: i64) -> Result<(), BotError> {
        if !msg.channel.eq_ignore_ascii_case(&self.config.broadcaster_channel) {
            return Ok(());
        }
        // The bot's own messages neither dispatch nor score.
        if msg.login.eq_ignore_ascii_case(&self.config.bot_name) {
            return Ok(());
        }

        let sink = TwitchReplySink::new(self.twitch_out.clone(), self.irc.clone());
        let mut ctx = CommandContext::new(
            msg.to_source(),
            msg.text.clone(),
            msg.text.clone(),
            now,
            &mut self.data,
            &sink,
            self.directory.as_ref(),
        );
        let dispatched = self.registry.dispatch(&mut ctx).await?;
        drop(ctx);

        if !dispatched {
            self.score_chatter(&msg).await?;
        }
        Ok(())
    }

    /// Passive accrual for plain chatter while the channel is live.
    async fn score_chatter(&mut self, msg: &TwitchChatMessage) -> Result<(), BotError> {
        match self.live.is_live().await {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(e) => {
                warn!(error = %e, "live check failed, skipping chat scoring");
                return Ok(());
            }
        }
        let (words, distinct_emotes) = msg.activity_terms();
        let word_refs: Vec<&str> = words.iter().map(String::as_str).collect();
        let score = message_score(&word_refs, distinct_emotes);
        record_activity(&mut self.data, &CanonicalId::new(&msg.user_id), score).await
    }

    async fn handle_discord(&mut self, msg: DiscordMessageEvent, now: i64) -> Result<(), BotError> {
        if !self.config.discord_channel_ids.contains(&msg.channel_id) {
            return Ok(());
        }
        let sink = DiscordReplySink::new(self.rest.clone(), msg.channel_id);
        let mut ctx = CommandContext::new(
            msg.to_source(),
            msg.content.clone(),
            msg.clean_content.clone(),
            now,
            &mut self.data,
            &sink,
            self.directory.as_ref(),
        );
        self.registry.dispatch(&mut ctx).await?;
        Ok(())
    }

    async fn handle_petal(&mut self, msg: RelayMessage, now: i64) -> Result<(), BotError> {
        let sink = PetalReplySink::new(self.petal_out.clone(), &self.config.petal_name);
        let source = CommandSource::Petal {
            display_name: msg.name.clone().unwrap_or_else(|| "anon".to_string()),
        };
        let mut ctx = CommandContext::new(
            source,
            msg.body.clone(),
            msg.body.clone(),
            now,
            &mut self.data,
            &sink,
            self.directory.as_ref(),
        );
        let dispatched = self.registry.dispatch(&mut ctx).await?;
        drop(ctx);

        if !dispatched {
            let line = mirror_line(&self.config.petal_emoji, msg.name.as_deref(), &msg.body);
            if self
                .twitch_out
                .send(self.irc.build_privmsg(&line))
                .await
                .is_err()
            {
                warn!("twitch connection closed, relay mirror dropped");
            }
            if let Err(e) = self
                .rest
                .create_message(self.config.discord_bridge_channel_id, &line)
                .await
            {
                warn!(error = %e, "discord mirror failed");
            }
        }
        Ok(())
    }
}
