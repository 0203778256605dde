//! `sub`, `status`, and the moderator-only `alert`.

use std::sync::Arc;

use async_trait::async_trait;

use trellis_channel::{AlertSink, ChatDirectory, CommandContext, LiveStatus, SubStatus};
use trellis_types::BotError;

use crate::dispatch::CommandHandler;

// ---------------------------------------------------------------------------
// sub
// ---------------------------------------------------------------------------

pub struct SubCommand;

#[async_trait]
impl CommandHandler for SubCommand {
    async fn run(&self, ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<(), BotError> {
        match ctx.subscriber_status().await {
            SubStatus::Subscribed => ctx.reply("uwu yes you are a sub").await,
            SubStatus::NotSubscribed => ctx.reply("wtf why aren't you subbed????").await,
            SubStatus::Unknown => {
                ctx.reply("I can't tell whether you're subbed from here. Chat on Twitch first!")
                    .await
            }
        }
    }
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

pub struct StatusCommand {
    live: Arc<dyn LiveStatus>,
    directory: Arc<dyn ChatDirectory>,
    broadcaster_channel: String,
}

impl StatusCommand {
    pub fn new(
        live: Arc<dyn LiveStatus>,
        directory: Arc<dyn ChatDirectory>,
        broadcaster_channel: String,
    ) -> Self {
        Self {
            live,
            directory,
            broadcaster_channel,
        }
    }
}

#[async_trait]
impl CommandHandler for StatusCommand {
    async fn run(&self, ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<(), BotError> {
        let info = self.directory.channel_info().await?;
        let online = self.live.is_live().await?;
        let status = if online { "**Online**" } else { "Offline" };
        let stream_link = format!("https://twitch.tv/{}", self.broadcaster_channel);
        // Offline links are suppressed so Discord does not render an
        // embed for a dead stream.
        let stream_link = if online {
            stream_link
        } else {
            format!("<{stream_link}/>")
        };
        ctx.reply(&format!(
            "{status}\n**Title:** {}\n**Game:** ({})\n**Stream:** {stream_link}",
            info.title, info.game_name
        ))
        .await
    }
}

// ---------------------------------------------------------------------------
// alert
// ---------------------------------------------------------------------------

/// Stream alert fan-out: Discord announcement plus microblog post, then
/// an echo of what was composed. Moderator-only; silently ignored for
/// everyone else.
pub struct AlertCommand {
    alerts: Arc<dyn AlertSink>,
    directory: Arc<dyn ChatDirectory>,
    broadcaster_channel: String,
    alerts_role_id: u64,
}

impl AlertCommand {
    pub fn new(
        alerts: Arc<dyn AlertSink>,
        directory: Arc<dyn ChatDirectory>,
        broadcaster_channel: String,
        alerts_role_id: u64,
    ) -> Self {
        Self {
            alerts,
            directory,
            broadcaster_channel,
            alerts_role_id,
        }
    }

    fn discord_alert(&self, mention: &str, title: &str, game: &str) -> String {
        format!(
            "{mention}\n\n{title} ({game})\n\nhttps://twitch.tv/{}",
            self.broadcaster_channel
        )
    }
}

#[async_trait]
impl CommandHandler for AlertCommand {
    async fn run(&self, ctx: &mut CommandContext<'_>, _args: &[&str]) -> Result<(), BotError> {
        if !ctx.is_moderator() {
            return Ok(());
        }
        let info = self.directory.channel_info().await?;

        let mention = format!("<@&{}>", self.alerts_role_id);
        self.alerts
            .announce_discord(&self.discord_alert(&mention, &info.title, &info.game_name))
            .await?;
        self.alerts
            .post_microblog(&format!(
                "{} ({})\n\nhttps://twitch.tv/{}",
                info.title, info.game_name, self.broadcaster_channel
            ))
            .await?;

        // Echo without the role mention so the reply does not ping.
        ctx.reply(&format!(
            "**Created alert:**\n\n{}",
            self.discord_alert("(role mention removed)", &info.title, &info.game_name)
        ))
        .await
    }
}
