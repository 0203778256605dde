//! The `link` command: one name, two roles.
//!
//! From Discord or the relay it begins a link; from Twitch chat it
//! completes one. Twitch identities are canonical, so there is nothing
//! to begin from that side. Discord codes are delivered by direct
//! message; relay tokens are predictable and replied in place.

use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use tokio::sync::Mutex;

use trellis_channel::{CommandContext, PrivateMessenger};
use trellis_identity::{begin_link, complete_link};
use trellis_types::{BotError, Platform};

use crate::dispatch::CommandHandler;

pub struct LinkCommand {
    broadcaster_channel: String,
    dm: Arc<dyn PrivateMessenger>,
    rng: Mutex<StdRng>,
}

impl LinkCommand {
    pub fn new(broadcaster_channel: String, dm: Arc<dyn PrivateMessenger>, rng: StdRng) -> Self {
        Self {
            broadcaster_channel,
            dm,
            rng: Mutex::new(rng),
        }
    }

    fn code_instructions(&self, twitch_prefix: &str, code: &str) -> String {
        format!(
            "Use `{twitch_prefix}link {code}` in Twitch chat \
             (<https://twitch.tv/{}/>) to link your account.",
            self.broadcaster_channel
        )
    }
}

#[async_trait]
impl CommandHandler for LinkCommand {
    async fn run(&self, ctx: &mut CommandContext<'_>, args: &[&str]) -> Result<(), BotError> {
        let local_id = ctx.local_id();
        match ctx.platform() {
            Platform::Twitch => {
                let Some(code) = args.first() else {
                    let discord_prefix = ctx
                        .data
                        .get_str(&Platform::Discord.prefix_key())
                        .unwrap_or_default()
                        .to_string();
                    return ctx
                        .reply(&format!(
                            "Missing code argument. Use {discord_prefix}link in Discord \
                             to link your accounts."
                        ))
                        .await;
                };
                let handle = ctx.display_name().to_string();
                complete_link(ctx.data, code, &local_id, &handle).await?;
                ctx.reply("Your account was successfully linked!").await
            }
            Platform::Discord => {
                let code = {
                    let mut rng = self.rng.lock().await;
                    begin_link(ctx.data, Platform::Discord, &local_id, None, &mut *rng).await?
                };
                let twitch_prefix = ctx
                    .data
                    .get_str(&Platform::Twitch.prefix_key())
                    .unwrap_or_default()
                    .to_string();
                // The code is a secret: anyone who reads it can bind this
                // Discord identity to their own Twitch account. It only
                // ever travels in a direct message.
                self.dm
                    .send_private(&local_id, &self.code_instructions(&twitch_prefix, &code))
                    .await?;
                ctx.reply("A link code has been sent to you in a direct message!")
                    .await
            }
            Platform::Petal => {
                // Relay tokens are predictable, so they pin the Twitch
                // handle allowed to complete them.
                let Some(handle) = args.first() else {
                    return ctx
                        .reply("Usage: link <twitch_username> (the Twitch account to link to)")
                        .await;
                };
                let code = {
                    let mut rng = self.rng.lock().await;
                    begin_link(ctx.data, Platform::Petal, &local_id, Some(handle), &mut *rng)
                        .await?
                };
                let twitch_prefix = ctx
                    .data
                    .get_str(&Platform::Twitch.prefix_key())
                    .unwrap_or_default()
                    .to_string();
                ctx.reply(&self.code_instructions(&twitch_prefix, &code))
                    .await
            }
        }
    }
}
