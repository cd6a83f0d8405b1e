use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state::TrackedItem;
use crate::types::{BadgeSnapshot, Notification};

/// How a threshold crossing is announced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopNotice {
    /// Only the "tracking stopped" message.
    #[default]
    Replace,
    /// The usual progress message, then "tracking stopped".
    WithProgress,
}

/// Result of comparing a fresh count against a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOutcome {
    /// Record is already stopped.
    Inactive,
    NoChange,
    /// Remote count went below the stored one (upstream reset). Ignored.
    Decreased { stored: u64, observed: u64 },
    Progress {
        previous: u64,
        current: u64,
        increase: u64,
    },
    ThresholdCrossed {
        previous: u64,
        current: u64,
        increase: u64,
        cumulative: u64,
    },
}

/// Classify `current` against the stored record. Pure.
///
/// `threshold` applies to the cumulative increase from the baseline, not to
/// the per-cycle increase.
pub fn diff(record: &TrackedItem, current: u64, threshold: u64) -> DiffOutcome {
    if !record.active {
        return DiffOutcome::Inactive;
    }
    let previous = record.last_seen_count;
    if current == previous {
        return DiffOutcome::NoChange;
    }
    if current < previous {
        return DiffOutcome::Decreased {
            stored: previous,
            observed: current,
        };
    }

    let increase = current - previous;
    let cumulative = current.saturating_sub(record.baseline_count);
    if cumulative >= threshold {
        DiffOutcome::ThresholdCrossed {
            previous,
            current,
            increase,
            cumulative,
        }
    } else {
        DiffOutcome::Progress {
            previous,
            current,
            increase,
        }
    }
}

/// Apply a snapshot to its record and return what should be announced.
///
/// Only increases touch the record. A threshold crossing deactivates the
/// record for good, so the stop notice can be produced at most once.
pub fn apply(
    record: &mut TrackedItem,
    snapshot: &BadgeSnapshot,
    threshold: u64,
    stop_notice: StopNotice,
    now: DateTime<Utc>,
) -> (DiffOutcome, Vec<Notification>) {
    let outcome = diff(record, snapshot.current_count, threshold);
    let mut notifications = Vec::new();

    match outcome {
        DiffOutcome::Inactive | DiffOutcome::NoChange => {}
        DiffOutcome::Decreased { stored, observed } => {
            warn!(
                "{} count went down ({stored} -> {observed}), keeping stored value",
                record.name
            );
        }
        DiffOutcome::Progress {
            previous,
            current,
            increase,
        } => {
            record.last_seen_count = current;
            info!(
                "{} +{increase} (cumulative increase: {})",
                record.name,
                record.cumulative_increase()
            );
            notifications.push(progress(record, previous, current, increase));
        }
        DiffOutcome::ThresholdCrossed {
            previous,
            current,
            increase,
            cumulative,
        } => {
            record.last_seen_count = current;
            record.deactivate(now);
            info!(
                "Badge {} reached a cumulative increase of {cumulative}. No longer tracking.",
                record.name
            );
            if stop_notice == StopNotice::WithProgress {
                notifications.push(progress(record, previous, current, increase));
            }
            notifications.push(Notification::TrackingStopped {
                badge_id: record.id,
                badge_name: record.name.clone(),
                cumulative,
                threshold,
            });
        }
    }

    (outcome, notifications)
}

fn progress(record: &TrackedItem, previous: u64, current: u64, increase: u64) -> Notification {
    Notification::Progress {
        badge_id: record.id,
        badge_name: record.name.clone(),
        universe: record.awarding_universe.clone(),
        previous,
        current,
        increase,
    }
}
