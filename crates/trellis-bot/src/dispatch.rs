//! Command registry and dispatch.
//!
//! One registration per logical command, reachable from every platform.
//! Dispatch reads the live per-platform prefix, tokenizes on whitespace,
//! and routes to the handler. Validation-class errors become plain-text
//! replies here; structural errors propagate to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use trellis_channel::CommandContext;
use trellis_types::BotError;

/// One platform-agnostic command implementation.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Run the command. `args` holds the whitespace tokens after the
    /// command name; handlers that want quoting or flags parse their own
    /// tokens.
    async fn run(&self, ctx: &mut CommandContext<'_>, args: &[&str]) -> Result<(), BotError>;
}

/// Name → handler table shared by every platform front-end.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under a name. Re-registering a name replaces
    /// the prior handler; last registration wins.
    pub fn register(&mut self, name: &str, handler: Arc<dyn CommandHandler>) {
        let name = name.to_ascii_lowercase();
        if self.handlers.insert(name.clone(), handler).is_some() {
            warn!(command = %name, "command re-registered, replacing prior handler");
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_ascii_lowercase())
    }

    /// Dispatch one invocation. Returns `true` when a handler ran (even
    /// if it failed with a user error, which is replied and swallowed
    /// here) and `false` when the text was not a command or the command
    /// is unknown.
    pub async fn dispatch(&self, ctx: &mut CommandContext<'_>) -> Result<bool, BotError> {
        let prefix = ctx.prefix();
        let text = ctx.clean_text.clone();
        let Some(rest) = text.strip_prefix(&prefix) else {
            return Ok(false);
        };

        let mut tokens = rest.split_whitespace();
        let Some(name) = tokens.next() else {
            return Ok(false);
        };
        let args: Vec<&str> = tokens.collect();

        let Some(handler) = self.handlers.get(&name.to_ascii_lowercase()) else {
            debug!(command = %name, "unknown command ignored");
            return Ok(false);
        };

        match handler.run(ctx, &args).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_user_error() => {
                ctx.reply(&err.to_string()).await?;
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }
}
