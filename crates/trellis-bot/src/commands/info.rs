//! Stored-text info commands and the `edit` command.
//!
//! Every info command follows the same shape: a moderator invoking it
//! with arguments updates the stored text; anyone else (or a moderator
//! with no arguments) gets the stored text back behind a fixed intro.

use async_trait::async_trait;

use trellis_channel::CommandContext;
use trellis_store::keys;
use trellis_types::BotError;

use crate::dispatch::CommandHandler;

/// Shown when a topic has no stored text yet.
const UNAVAILABLE: &str = "n/a";

/// (command names, topic key, label, intro) for every stored-text topic.
/// Aliases share one handler instance.
pub const INFO_TOPICS: &[(&[&str], &str, &str, &str)] = &[
    (&["code"], "lobby", "Lobby code", "Lobby code: "),
    (&["ddnet"], "ddnet", "DDNet profile", "DDNet player profile: "),
    (&["discord"], "discord", "Discord server", "Join the community Discord! "),
    (&["donate"], "donate", "Donate link", "Support the stream: "),
    (&["faq"], "faq", "FAQ link", "FAQ: "),
    (&["mc", "ip"], "mc", "Minecraft server info", "Join the community server! "),
    (&["survey"], "survey", "Survey info", "Please fill out this survey! "),
    (
        &["tournament", "tourney", "lcsg"],
        "tournament",
        "Tournament info",
        "Tournament rules: ",
    ),
    (
        &["twitter"],
        "twitter",
        "Twitter link",
        "Follow for stream notifications and updates: ",
    ),
    (
        &["youtube"],
        "youtube",
        "YouTube link",
        "Subscribe on YouTube: ",
    ),
];

/// One stored-text topic command.
pub struct InfoCommand {
    key: String,
    label: &'static str,
    intro: &'static str,
}

impl InfoCommand {
    pub fn new(topic: &str, label: &'static str, intro: &'static str) -> Self {
        Self {
            key: keys::info(topic),
            label,
            intro,
        }
    }
}

#[async_trait]
impl CommandHandler for InfoCommand {
    async fn run(&self, ctx: &mut CommandContext<'_>, args: &[&str]) -> Result<(), BotError> {
        if ctx.is_moderator() && !args.is_empty() {
            ctx.data.set(self.key.clone(), args.join(" "));
            ctx.data.save("info update").await?;
            ctx.reply(&format!("{} updated!", self.label)).await
        } else {
            let text = ctx.data.get_str(&self.key).unwrap_or(UNAVAILABLE).to_string();
            ctx.reply(&format!("{}{text}", self.intro)).await
        }
    }
}

/// `edit <name> <text...>`: moderator-only update of an existing topic.
/// Unlike the per-topic commands, this cannot create a new key.
pub struct EditCommand;

#[async_trait]
impl CommandHandler for EditCommand {
    async fn run(&self, ctx: &mut CommandContext<'_>, args: &[&str]) -> Result<(), BotError> {
        if !ctx.is_moderator() {
            return Ok(());
        }
        if args.len() < 2 {
            return ctx.reply("Missing info message argument.").await;
        }
        let name = args[0];
        let key = keys::info(name);
        if ctx.data.contains_key(&key) {
            ctx.data.set(key, args[1..].join(" "));
            ctx.data.save("info edit").await?;
            ctx.reply(&format!("Info for \"{name}\" updated!")).await
        } else {
            ctx.reply(&format!("Info for \"{name}\" was not found.")).await
        }
    }
}
