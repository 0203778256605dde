//! Built-in command set.

mod economy;
mod info;
mod link;
mod status;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use trellis_channel::{AlertSink, ChatDirectory, LiveStatus, PrivateMessenger};
use trellis_types::BotConfig;

use crate::dispatch::CommandRegistry;

pub use economy::{BalCommand, BuyboxCommand, DailyCommand, LbCommand};
pub use info::{EditCommand, InfoCommand};
pub use link::LinkCommand;
pub use status::{AlertCommand, StatusCommand, SubCommand};

/// Collaborators the command set needs from the platform front-ends.
pub struct CommandDeps {
    pub live: Arc<dyn LiveStatus>,
    pub directory: Arc<dyn ChatDirectory>,
    pub alerts: Arc<dyn AlertSink>,
    pub dm: Arc<dyn PrivateMessenger>,
}

/// Build the full command registry.
pub fn register_all(config: &BotConfig, deps: CommandDeps) -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    for &(names, topic, label, intro) in info::INFO_TOPICS {
        let handler = Arc::new(InfoCommand::new(topic, label, intro));
        for name in names {
            registry.register(name, handler.clone());
        }
    }
    registry.register("edit", Arc::new(EditCommand));

    registry.register(
        "link",
        Arc::new(LinkCommand::new(
            config.broadcaster_channel.clone(),
            deps.dm.clone(),
            StdRng::from_entropy(),
        )),
    );

    registry.register(
        "daily",
        Arc::new(DailyCommand::new(
            deps.live.clone(),
            config.broadcaster_channel.clone(),
            StdRng::from_entropy(),
        )),
    );
    registry.register("bal", Arc::new(BalCommand));
    registry.register("lb", Arc::new(LbCommand::new(deps.directory.clone())));
    registry.register(
        "buybox",
        Arc::new(BuyboxCommand::new(StdRng::from_entropy())),
    );

    registry.register("sub", Arc::new(SubCommand));
    registry.register(
        "status",
        Arc::new(StatusCommand::new(
            deps.live.clone(),
            deps.directory.clone(),
            config.broadcaster_channel.clone(),
        )),
    );
    registry.register(
        "alert",
        Arc::new(AlertCommand::new(
            deps.alerts,
            deps.directory,
            config.broadcaster_channel.clone(),
            config.discord_alerts_role_id,
        )),
    );

    registry
}
