//! Trellis entry point.
//!
//! One process, no subcommands: load configuration from the environment
//! (optionally via a `.env` file), open the persistent document, wire
//! the front-ends to the event loop, and run until interrupted.

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use trellis_bot::commands::{register_all, CommandDeps};
use trellis_bot::discord::{DiscordAlertSink, DiscordGateway, DiscordRest, MicroblogPoster};
use trellis_bot::petal::PetalRelay;
use trellis_bot::runtime::{BotEvent, Runtime};
use trellis_bot::twitch::{self, HelixClient, TwitchIrc};
use trellis_store::BotData;
use trellis_types::BotConfig;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "trellis", version, about = "Cross-platform chat bot")]
struct Cli {
    /// Path to an env file to load before reading configuration.
    #[arg(long, default_value = ".env")]
    env_file: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    if dotenvy::from_path(&cli.env_file).is_err() {
        info!(path = %cli.env_file.display(), "no env file, using process environment");
    }

    let config = BotConfig::from_env()?;
    info!(bot = %config.bot_name, version = VERSION, "starting");

    // A malformed document is a startup failure; a missing one is seeded
    // with defaults inside load().
    let mut data = BotData::new(
        config.data_path.clone(),
        &config.default_prefix,
        &config.default_currency_emoji,
    );
    data.load().await?;

    let http = reqwest::Client::new();
    let helix = Arc::new(HelixClient::new(
        http.clone(),
        &config.twitch_client_id,
        &config.twitch_token,
        &config.broadcaster_channel,
    ));
    let rest = Arc::new(DiscordRest::new(http.clone(), &config.discord_token));
    let microblog = match (&config.microblog_endpoint, &config.microblog_token) {
        (Some(endpoint), Some(token)) => Some(MicroblogPoster::new(http, endpoint, token)),
        _ => None,
    };
    let alerts = Arc::new(DiscordAlertSink::new(
        rest.clone(),
        config.discord_alerts_channel_id,
        microblog,
    ));

    let registry = register_all(
        &config,
        CommandDeps {
            live: helix.clone(),
            directory: helix.clone(),
            alerts,
            dm: rest.clone(),
        },
    );

    let irc = Arc::new(TwitchIrc::new(
        &config.twitch_token,
        &config.bot_name,
        &config.broadcaster_channel,
    )?);

    let (event_tx, event_rx) = mpsc::channel::<BotEvent>(256);
    let (twitch_out_tx, twitch_out_rx) = mpsc::channel::<String>(64);
    let (petal_out_tx, petal_out_rx) = mpsc::channel::<String>(64);

    // Twitch IRC connection.
    {
        let irc = irc.clone();
        let event_tx = event_tx.clone();
        let (chat_tx, mut chat_rx) = mpsc::channel(64);
        tokio::spawn(async move {
            if let Err(e) = twitch::run_irc(irc, twitch_out_rx, chat_tx).await {
                error!(error = %e, "twitch connection ended");
            }
        });
        tokio::spawn(async move {
            while let Some(msg) = chat_rx.recv().await {
                if event_tx.send(BotEvent::Twitch(msg)).await.is_err() {
                    break;
                }
            }
        });
    }

    // Discord gateway connection.
    {
        let gateway = DiscordGateway::new(
            &config.discord_token,
            config.discord_staff_channel_id,
            config.discord_subscriber_role_id,
            rest.clone(),
        );
        let event_tx = event_tx.clone();
        let (message_tx, mut message_rx) = mpsc::channel(64);
        tokio::spawn(async move {
            if let Err(e) = gateway.run(message_tx).await {
                error!(error = %e, "discord connection ended");
            }
        });
        tokio::spawn(async move {
            while let Some(msg) = message_rx.recv().await {
                if event_tx.send(BotEvent::Discord(msg)).await.is_err() {
                    break;
                }
            }
        });
    }

    // Petal relay connection.
    {
        let relay = PetalRelay {
            server: config.petal_server.clone(),
            name: config.petal_name.clone(),
            token: config.petal_token.clone(),
        };
        let event_tx = event_tx.clone();
        let (relay_tx, mut relay_rx) = mpsc::channel(64);
        tokio::spawn(async move {
            if let Err(e) = relay.run(petal_out_rx, relay_tx).await {
                error!(error = %e, "relay connection ended");
            }
        });
        tokio::spawn(async move {
            while let Some(msg) = relay_rx.recv().await {
                if event_tx.send(BotEvent::Petal(msg)).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(event_tx);

    let runtime = Runtime::new(
        config,
        data,
        registry,
        helix.clone(),
        helix,
        irc,
        twitch_out_tx,
        petal_out_tx,
        rest,
    );

    tokio::select! {
        _ = runtime.run(event_rx) => {
            info!("all front-ends disconnected, shutting down");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("interrupt received, shutting down");
        }
    }
    Ok(())
}
