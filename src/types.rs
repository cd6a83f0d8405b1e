use serde::{Deserialize, Serialize};

/// Badge identifier as issued by the statistics API.
pub type BadgeId = u64;

/// Discord channel (or role) snowflake.
pub type ChannelId = u64;

/// The game a badge is awarded in. Only used to build display links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardingUniverse {
    pub id: u64,
    pub name: String,
    pub root_place_id: u64,
}

impl AwardingUniverse {
    /// Public game page for this universe.
    pub fn game_link(&self) -> String {
        format!("{}/{}", crate::GAME_URL_BASE, self.root_place_id)
    }
}

/// Normalized result of one successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeSnapshot {
    pub id: BadgeId,
    pub name: String,
    /// Cumulative `awardedCount`.
    pub current_count: u64,
    pub past_day_count: u64,
    pub win_rate_percentage: f64,
    pub awarding_universe: AwardingUniverse,
}

/// Whether a badge is still being polled. Persisted in the status file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tracking {
    Online,
    Stopped,
}

/// One line of the optional tracking status file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingStatus {
    pub id: BadgeId,
    pub name: String,
    pub tracking: Tracking,
}

/// Everything the bot ever posts to the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    /// Counter went up but the badge is still below its threshold.
    Progress {
        badge_id: BadgeId,
        badge_name: String,
        universe: AwardingUniverse,
        previous: u64,
        current: u64,
        increase: u64,
    },
    /// Cumulative increase since baseline reached the threshold; sent once.
    TrackingStopped {
        badge_id: BadgeId,
        badge_name: String,
        cumulative: u64,
        threshold: u64,
    },
    /// The store was empty and every configured badge was fetched again.
    Reinitialized { tracked: usize, configured: usize },
    /// Every badge has stopped; the scheduler will not poll again.
    SleepMode,
}
