//! setup-bot — First-time setup for the badge announcer.
//!
//! Expects `config.toml` to already exist (copied from `config.toml.template`).
//! Validates the Discord bot token, checks that the bot can see the
//! configured channel, and stores the token in the existing config file.
//!
//! By default, reads the token interactively (hidden input) to avoid
//! leaking it into shell history. Use `--token` only for scripted/CI use.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use badge_watch::chat::DiscordClient;
use badge_watch::config::{AppConfig, CONFIG_PATH};

#[derive(Parser)]
#[command(
    name = "setup-bot",
    about = "Validate the Discord bot token and channel, and save the token to config.toml"
)]
struct Cli {
    /// Discord bot token. If omitted, reads interactively with hidden input (recommended).
    #[arg(long)]
    token: Option<String>,

    /// Channel ID to post to (overrides the one in config.toml)
    #[arg(long)]
    channel_id: Option<u64>,

    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_path();

    // Load existing config
    let mut app_config = AppConfig::load(config_path).with_context(|| {
        format!(
            "{} not found — copy config.toml.template to config.toml first",
            config_path.display()
        )
    })?;

    println!("=== Badge Watch — Bot Setup ===\n");

    // ── Step 1: Read token ─────────────────────────────────────────
    let token = match cli.token {
        Some(token) => token.trim().to_string(),
        None => {
            let token = rpassword::prompt_password("Enter Discord bot token: ")
                .context("failed to read token")?;
            token.trim().to_string()
        }
    };
    if token.is_empty() {
        bail!("token cannot be empty");
    }
    if let Some(channel_id) = cli.channel_id {
        app_config.discord.channel_id = channel_id;
    }
    if app_config.discord.channel_id == 0 {
        bail!("no channel configured — pass --channel-id or set discord.channel_id");
    }

    let client = DiscordClient::new(
        &app_config.settings.discord_api_base,
        token.clone(),
        app_config.discord.channel_id,
    )?;

    // ── Step 2: Validate token ─────────────────────────────────────
    println!("Validating bot token...");
    let user = client
        .current_user()
        .await
        .context("token validation failed — check the token in the Discord developer portal")?;
    println!("  Bot user: {} ({})", user.username, user.id);
    println!();

    // ── Step 3: Check channel access ───────────────────────────────
    println!("Checking channel {}...", app_config.discord.channel_id);
    let channel = client
        .channel()
        .await
        .context("channel lookup failed — is the bot a member of that server?")?;
    println!(
        "  Channel: #{} ({})",
        channel.name.as_deref().unwrap_or("unnamed"),
        channel.id
    );
    println!();

    // ── Step 4: Update token in config.toml ────────────────────────
    println!("Updating token in {}...", config_path.display());
    app_config.discord.token = token;
    app_config.save(config_path)?;
    println!("  Config updated successfully");
    println!();

    // ── Summary ────────────────────────────────────────────────────
    println!("=== Setup Complete ===");
    println!();
    println!("Tracking {} badge(s), threshold {}", app_config.tracking.badge_ids.len(), app_config.tracking.threshold);
    println!();
    println!("Next steps:");
    println!("  cargo run --bin badge-watch -- --config {}", config_path.display());

    Ok(())
}
