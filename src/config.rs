use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::engine::StopNotice;
use crate::types::{BadgeId, ChannelId};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Environment variable overriding `discord.token`.
pub const TOKEN_ENV: &str = "DISCORD_TOKEN";

/// Environment variable overriding `discord.channel_id`.
pub const CHANNEL_ENV: &str = "CHANNEL_ID";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Chat credentials and destination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token (without the `Bot ` prefix).
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub channel_id: ChannelId,
    /// Role pinged on progress messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mention_role_id: Option<u64>,
}

/// Which badges to watch and when to stop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    pub badge_ids: Vec<BadgeId>,
    /// Cumulative increase from baseline at which a badge stops being tracked.
    #[serde(default = "default_threshold")]
    pub threshold: u64,
    #[serde(default)]
    pub stop_notice: StopNotice,
    /// Post a final message when every badge has stopped.
    #[serde(default = "default_true")]
    pub announce_sleep: bool,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_discord_api_base")]
    pub discord_api_base: String,
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,
    /// Optional `{id, name, tracking}` status file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_file: Option<PathBuf>,
    /// Clear the data file at startup, forcing a fresh baseline.
    #[serde(default)]
    pub reset_on_start: bool,
    /// Pause after each processed badge.
    #[serde(default = "default_item_delay")]
    pub item_delay_ms: u64,
    /// Pause after a failed fetch.
    #[serde(default = "default_failure_delay")]
    pub failure_delay_ms: u64,
    /// Pause after a re-initialization.
    #[serde(default = "default_reinit_delay")]
    pub reinit_delay_secs: u64,
    /// Pause between full passes.
    #[serde(default = "default_cycle_delay")]
    pub cycle_delay_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_threshold() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

fn default_api_base() -> String {
    crate::BADGES_API_BASE.to_string()
}

fn default_discord_api_base() -> String {
    crate::DISCORD_API_BASE.to_string()
}

fn default_data_file() -> PathBuf {
    PathBuf::from("badge_data.json")
}

fn default_item_delay() -> u64 {
    500
}

fn default_failure_delay() -> u64 {
    2000
}

fn default_reinit_delay() -> u64 {
    2
}

fn default_cycle_delay() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            discord_api_base: default_discord_api_base(),
            data_file: default_data_file(),
            tracking_file: None,
            reset_on_start: false,
            item_delay_ms: default_item_delay(),
            failure_delay_ms: default_failure_delay(),
            reinit_delay_secs: default_reinit_delay(),
            cycle_delay_secs: default_cycle_delay(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl SettingsConfig {
    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }

    pub fn failure_delay(&self) -> Duration {
        Duration::from_millis(self.failure_delay_ms)
    }

    pub fn reinit_delay(&self) -> Duration {
        Duration::from_secs(self.reinit_delay_secs)
    }

    pub fn cycle_delay(&self) -> Duration {
        Duration::from_secs(self.cycle_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Apply `DISCORD_TOKEN` / `CHANNEL_ID` from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(TOKEN_ENV).ok(),
            std::env::var(CHANNEL_ENV).ok(),
        )
    }

    /// Override credentials. A channel value that is not a number is fatal.
    pub fn apply_overrides(&mut self, token: Option<String>, channel: Option<String>) -> Result<()> {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.discord.token = token.trim().to_string();
        }
        if let Some(channel) = channel.filter(|c| !c.trim().is_empty()) {
            self.discord.channel_id = channel
                .trim()
                .parse()
                .with_context(|| format!("{CHANNEL_ENV} is not a valid channel ID: {channel}"))?;
        }
        Ok(())
    }

    /// Startup checks. Any failure here stops the process before polling.
    pub fn validate(&self) -> Result<()> {
        if self.discord.token.trim().is_empty() {
            bail!("Discord token is missing (set {TOKEN_ENV} or discord.token)");
        }
        if self.discord.channel_id == 0 {
            bail!("Channel ID is missing (set {CHANNEL_ENV} or discord.channel_id)");
        }
        if self.tracking.badge_ids.is_empty() {
            bail!("tracking.badge_ids must list at least one badge");
        }
        let mut seen = HashSet::new();
        for id in &self.tracking.badge_ids {
            if !seen.insert(id) {
                bail!("tracking.badge_ids lists {id} more than once");
            }
        }
        if self.tracking.threshold == 0 {
            bail!("tracking.threshold must be positive");
        }
        Ok(())
    }
}
