pub mod api;
pub mod chat;
pub mod config;
pub mod engine;
pub mod notifier;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod types;

/// Roblox badges API base URL (public, no auth required)
pub const BADGES_API_BASE: &str = "https://badges.roblox.com/v1/badges";

/// Discord REST API base URL (bot token auth)
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Base URL for game links; append the universe's root place ID.
pub const GAME_URL_BASE: &str = "https://www.roblox.com/games";
