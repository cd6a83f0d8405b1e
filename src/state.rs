use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AwardingUniverse, BadgeId, BadgeSnapshot, Tracking, TrackingStatus};

/// Persisted per-badge record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedItem {
    pub id: BadgeId,
    pub name: String,
    /// `awardedCount` at first observation. Never rewritten.
    pub baseline_count: u64,
    pub last_seen_count: u64,
    pub active: bool,
    pub awarding_universe: AwardingUniverse,
    pub tracked_since: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
}

impl TrackedItem {
    /// First observation of a badge: the current count becomes the baseline.
    pub fn from_snapshot(snapshot: &BadgeSnapshot, now: DateTime<Utc>) -> Self {
        Self {
            id: snapshot.id,
            name: snapshot.name.clone(),
            baseline_count: snapshot.current_count,
            last_seen_count: snapshot.current_count,
            active: true,
            awarding_universe: snapshot.awarding_universe.clone(),
            tracked_since: now,
            stopped_at: None,
        }
    }

    /// Increase since tracking began.
    pub fn cumulative_increase(&self) -> u64 {
        self.last_seen_count.saturating_sub(self.baseline_count)
    }

    /// Permanently stop tracking. Calling it again keeps the first timestamp.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        if self.active {
            self.active = false;
            self.stopped_at = Some(now);
        }
    }

    pub fn status(&self) -> TrackingStatus {
        TrackingStatus {
            id: self.id,
            name: self.name.clone(),
            tracking: if self.active {
                Tracking::Online
            } else {
                Tracking::Stopped
            },
        }
    }
}

/// The collection of tracked badges, in stored order.
///
/// Owned by the scheduler; only the diff engine mutates individual records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackingState {
    items: Vec<TrackedItem>,
}

impl TrackingState {
    /// Build from loaded records, dropping later duplicates of an id so the
    /// collection stays keyed by id.
    pub fn from_items(items: Vec<TrackedItem>) -> Self {
        let mut seen = HashSet::new();
        let items = items.into_iter().filter(|i| seen.insert(i.id)).collect();
        Self { items }
    }

    pub fn items(&self) -> &[TrackedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, id: BadgeId) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    pub fn get(&self, id: BadgeId) -> Option<&TrackedItem> {
        self.items.iter().find(|i| i.id == id)
    }

    pub fn get_mut(&mut self, id: BadgeId) -> Option<&mut TrackedItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    /// Add a new record. Returns `false` (and changes nothing) if the id is
    /// already tracked, since baselines are set exactly once.
    pub fn insert(&mut self, item: TrackedItem) -> bool {
        if self.contains(item.id) {
            return false;
        }
        self.items.push(item);
        true
    }

    /// IDs still being polled, in stored order.
    pub fn active_ids(&self) -> Vec<BadgeId> {
        self.items.iter().filter(|i| i.active).map(|i| i.id).collect()
    }

    pub fn all_inactive(&self) -> bool {
        self.items.iter().all(|i| !i.active)
    }

    /// Force records marked `stopped` in the status file inactive.
    ///
    /// Only ever turns tracking off; an `online` entry never revives a record.
    pub fn apply_statuses(&mut self, statuses: &[TrackingStatus], now: DateTime<Utc>) {
        for status in statuses.iter().filter(|s| s.tracking == Tracking::Stopped) {
            if let Some(item) = self.get_mut(status.id) {
                item.deactivate(now);
            }
        }
    }

    pub fn statuses(&self) -> Vec<TrackingStatus> {
        self.items.iter().map(TrackedItem::status).collect()
    }

    pub fn into_items(self) -> Vec<TrackedItem> {
        self.items
    }
}
