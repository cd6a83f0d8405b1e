use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use badge_watch::api::BadgeClient;
use badge_watch::chat::DiscordClient;
use badge_watch::config::{AppConfig, CONFIG_PATH};
use badge_watch::notifier::Notifier;
use badge_watch::scheduler::{Phase, Scheduler, SchedulerOptions};
use badge_watch::state::TrackedItem;
use badge_watch::store::JsonStore;
use badge_watch::types::TrackingStatus;

#[derive(Parser)]
#[command(name = "badge-watch", about = "Announce badge award increases in a Discord channel")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Clear the stored badge data and status file before polling (forces a fresh baseline)
    #[arg(long)]
    reset: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if dotenvy::dotenv().is_ok() {
        info!("Loaded environment from .env");
    }

    // Load config
    let mut config = AppConfig::load(&args.config)?;
    config.apply_env()?;
    config.validate()?;
    info!("Loaded config from {}", args.config.display());

    let data_store: JsonStore<TrackedItem> = JsonStore::new(&config.settings.data_file);
    let status_store: Option<JsonStore<TrackingStatus>> =
        config.settings.tracking_file.as_ref().map(JsonStore::new);

    let source = BadgeClient::new(&config.settings.api_base, config.settings.request_timeout())?;
    let chat = DiscordClient::new(
        &config.settings.discord_api_base,
        config.discord.token.clone(),
        config.discord.channel_id,
    )?;
    let notifier = Notifier::new(chat, config.discord.channel_id, config.discord.mention_role_id);

    info!(
        "Starting badge-watch — badges={} threshold={} item_delay={}ms cycle={}s data={}",
        config.tracking.badge_ids.len(),
        config.tracking.threshold,
        config.settings.item_delay_ms,
        config.settings.cycle_delay_secs,
        data_store.path().display(),
    );

    let mut scheduler = Scheduler::new(
        source,
        notifier,
        data_store,
        status_store,
        config.tracking.badge_ids.clone(),
        SchedulerOptions::from_config(&config),
    );

    if args.reset || config.settings.reset_on_start {
        info!("Resetting stored badge data...");
        scheduler.reset().context("failed to reset badge data")?;
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    let phase = scheduler.run_until(shutdown).await?;
    match phase {
        Phase::Sleeping => info!("Exited from sleep mode"),
        Phase::Polling | Phase::WaitingForConnection => info!("Stopped ({phase:?})"),
    }

    Ok(())
}
