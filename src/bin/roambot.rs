//! roambot binary
//!
//! Connects to the collaborator bridge, opens the UI port and runs one
//! session until it stops or is interrupted.
//!
//! ## Configuration
//!
//! `BotConfig` is read from an optional TOML file and then overridden by
//! `ROAMBOT__*` environment variables (nested keys separated by `__`).
//!
//! | Key                          | Default              | Description                     |
//! |------------------------------|----------------------|---------------------------------|
//! | `session`                    | `default`            | Session name on observer events |
//! | `start.lat` / `start.lng`    | Paris, 6e            | Starting position               |
//! | `speed_kmh`                  | `4.6`                | Base walking speed              |
//! | `catch_pokemon`              | `true`               | Attempt catches                 |
//! | `interaction_range_m`        | `38`                 | Stop visit range                |
//! | `incubator_chance`           | `0.3`                | Incubator dispatch probability  |
//! | `delays.*`                   | see `Delays`         | Pacing delays (seconds)         |
//! | `api.*`                      | `US` / `en` / ...    | Locale + app version            |
//! | `seed`                       | random               | RNG seed                        |
//! | `state_path`                 | `data/state.json`    | State snapshot                  |
//! | `templates_path`             | `data/item_templates.json` | Item-template cache       |

use anyhow::{Context, Result};
use clap::Parser;
use roambot::{
    BotConfig, BridgeClient, ChannelObserver, Collaborators, ExitReason, Position,
    SessionController, UiServer,
};
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "roambot", about = "Location-based game agent", version)]
struct Args {
    /// TOML config file (optional)
    #[arg(long, env = "ROAMBOT_CONFIG", default_value = "data/config.toml")]
    config: String,

    /// Collaborator bridge address
    #[arg(long, env = "ROAMBOT_BRIDGE", default_value = "127.0.0.1:7878")]
    bridge: String,

    /// Address the UI server listens on
    #[arg(long, env = "ROAMBOT_UI_LISTEN", default_value = "0.0.0.0:8000")]
    ui_listen: String,

    /// Broadcast buffer per UI connection
    #[arg(long, env = "ROAMBOT_UI_BUFFER", default_value_t = 256)]
    ui_buffer: usize,
}

fn load_config(path: &str) -> Result<BotConfig> {
    config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("ROAMBOT").separator("__"))
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("roambot=debug".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args.config)?;

    tracing::info!(
        "Starting roambot (session='{}', start={}, speed={}km/h)",
        config.session,
        config.start,
        config.speed_kmh,
    );

    let bridge = Arc::new(
        BridgeClient::connect(&args.bridge, Position::from(config.start))
            .await
            .context("Failed to reach the collaborator bridge")?,
    );

    let hub = ChannelObserver::new(&config.session, args.ui_buffer);
    let (request_tx, request_rx) = mpsc::channel(32);
    let ui = UiServer::bind(&args.ui_listen, hub.clone(), request_tx).await?;
    let ui_handle = tokio::spawn(ui.run());

    let io = Collaborators {
        client: bridge.clone(),
        mapping: bridge.clone(),
        solver: bridge.clone(),
        proxy: bridge,
        observer: Arc::new(hub),
    };
    let mut controller = SessionController::new(config, io).with_requests(request_rx);

    let reason = tokio::select! {
        reason = controller.run() => reason,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down (SIGINT)");
            ExitReason::Shutdown
        }
    };

    ui_handle.abort();
    controller.shutdown().await;

    let code = reason.exit_code();
    if code != 0 {
        tracing::error!("Exiting: {}", reason);
        std::process::exit(code);
    }
    Ok(())
}
