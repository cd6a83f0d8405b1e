use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::api::BadgeSource;
use crate::chat::ChatSink;
use crate::config::AppConfig;
use crate::engine::{self, DiffOutcome, StopNotice};
use crate::notifier::Notifier;
use crate::state::{TrackedItem, TrackingState};
use crate::store::JsonStore;
use crate::types::{BadgeId, Notification, TrackingStatus};

/// Scheduler lifecycle. `Sleeping` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    WaitingForConnection,
    Polling,
    Sleeping,
}

/// Tracking and pacing knobs, lifted out of [`AppConfig`].
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub threshold: u64,
    pub stop_notice: StopNotice,
    pub announce_sleep: bool,
    pub item_delay: Duration,
    pub failure_delay: Duration,
    pub reinit_delay: Duration,
    pub cycle_delay: Duration,
}

impl SchedulerOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            threshold: config.tracking.threshold,
            stop_notice: config.tracking.stop_notice,
            announce_sleep: config.tracking.announce_sleep,
            item_delay: config.settings.item_delay(),
            failure_delay: config.settings.failure_delay(),
            reinit_delay: config.settings.reinit_delay(),
            cycle_delay: config.settings.cycle_delay(),
        }
    }
}

/// Counters for one pass, logged at the end of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub checked: usize,
    pub failed: usize,
    pub increased: usize,
    pub stopped: usize,
    pub added: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The store was empty; baselines were rebuilt for `tracked` badges.
    Reinitialized { tracked: usize },
    Completed(PassReport),
    /// Nothing is active any more.
    AllStopped,
}

/// Drives fetch → diff → notify → persist over every active badge.
pub struct Scheduler<S, C> {
    source: S,
    notifier: Notifier<C>,
    data: JsonStore<TrackedItem>,
    status: Option<JsonStore<TrackingStatus>>,
    badge_ids: Vec<BadgeId>,
    options: SchedulerOptions,
    state: TrackingState,
    /// The last save failed; disk holds an older collection than `state`.
    unsaved: bool,
    phase: Phase,
}

impl<S: BadgeSource, C: ChatSink> Scheduler<S, C> {
    pub fn new(
        source: S,
        notifier: Notifier<C>,
        data: JsonStore<TrackedItem>,
        status: Option<JsonStore<TrackingStatus>>,
        badge_ids: Vec<BadgeId>,
        options: SchedulerOptions,
    ) -> Self {
        Self {
            source,
            notifier,
            data,
            status,
            badge_ids,
            options,
            state: TrackingState::default(),
            unsaved: false,
            phase: Phase::WaitingForConnection,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &TrackingState {
        &self.state
    }

    /// Wait for the chat sink, then poll until every badge has stopped or
    /// `shutdown` resolves. Returns the phase the scheduler ended in.
    ///
    /// Only a readiness failure is an error; everything after that is logged
    /// and retried on the next cycle.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<Phase>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!("Waiting for chat connection...");
        tokio::select! {
            biased;
            ready = self.notifier.wait_until_ready() => ready?,
            _ = &mut shutdown => {
                info!("Shutdown signal received before connection");
                return Ok(self.phase);
            }
        }

        self.phase = Phase::Polling;
        info!(
            "Entering polling loop ({} badges, threshold {}). Press Ctrl+C to stop.",
            self.badge_ids.len(),
            self.options.threshold
        );

        loop {
            let pause = match self.run_pass().await {
                PassOutcome::AllStopped => {
                    self.enter_sleep().await;
                    shutdown.as_mut().await;
                    info!("Shutdown signal received while sleeping");
                    return Ok(self.phase);
                }
                PassOutcome::Reinitialized { .. } => self.options.reinit_delay,
                PassOutcome::Completed(report) => {
                    info!(
                        "Pass complete: checked={} failed={} increased={} stopped={} added={}",
                        report.checked, report.failed, report.increased, report.stopped, report.added
                    );
                    self.options.cycle_delay
                }
            };

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    return Ok(self.phase);
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Clear the data file and the status file, and forget in-memory state.
    /// The next pass rebuilds every baseline.
    pub fn reset(&mut self) -> Result<()> {
        self.data
            .reset()
            .with_context(|| format!("failed to reset {}", self.data.path().display()))?;
        if let Some(status) = &self.status {
            status
                .reset()
                .with_context(|| format!("failed to reset {}", status.path().display()))?;
        }
        self.state = TrackingState::default();
        self.unsaved = false;
        Ok(())
    }

    /// One sweep over the store. An emptied or corrupted file triggers a
    /// rebuild; otherwise the in-memory collection stays authoritative once
    /// loaded. The caller owns the pause that follows the pass.
    pub async fn run_pass(&mut self) -> PassOutcome {
        let loaded = self.load_state();
        // An empty file after a failed save is ours, not an external wipe.
        if loaded.is_empty() && !self.unsaved {
            warn!("No badge data found! Re-initializing...");
            let tracked = self.reinitialize().await;
            return PassOutcome::Reinitialized { tracked };
        }
        if self.state.is_empty() {
            self.state = loaded;
        } else {
            if let Some(status) = &self.status {
                self.state.apply_statuses(&status.load(), Utc::now());
            }
            if self.unsaved {
                info!("Retrying save of {}", self.data.path().display());
                self.persist();
            }
        }

        let mut report = PassReport::default();
        self.adopt_new_badges(&mut report).await;

        let all_configured = self.badge_ids.iter().all(|id| self.state.contains(*id));
        if all_configured && self.state.all_inactive() {
            return PassOutcome::AllStopped;
        }

        let ids = self.state.active_ids();
        let total = ids.len();
        for (idx, id) in ids.into_iter().enumerate() {
            let name = self
                .state
                .get(id)
                .map(|i| i.name.clone())
                .unwrap_or_default();
            debug!("Checking badge {}/{total}: {name}", idx + 1);

            let Some(snapshot) = self.source.fetch(id).await else {
                warn!("Failed to fetch fresh data for {name}, skipping this cycle");
                report.failed += 1;
                tokio::time::sleep(self.options.failure_delay).await;
                continue;
            };
            report.checked += 1;

            let Some(record) = self.state.get_mut(id) else {
                continue;
            };
            let (outcome, notifications) = engine::apply(
                record,
                &snapshot,
                self.options.threshold,
                self.options.stop_notice,
                Utc::now(),
            );

            self.notifier.notify_all(&notifications).await;

            match outcome {
                DiffOutcome::Progress { .. } => {
                    report.increased += 1;
                    self.persist();
                }
                DiffOutcome::ThresholdCrossed { .. } => {
                    report.increased += 1;
                    report.stopped += 1;
                    self.persist();
                }
                DiffOutcome::Inactive | DiffOutcome::NoChange | DiffOutcome::Decreased { .. } => {}
            }

            tokio::time::sleep(self.options.item_delay).await;
        }

        PassOutcome::Completed(report)
    }

    /// Fetch every configured badge from scratch and rebuild baselines.
    /// Returns the number of badges now tracked.
    pub async fn reinitialize(&mut self) -> usize {
        info!("Initializing badge data...");
        let mut state = TrackingState::default();
        for &id in &self.badge_ids {
            match self.source.fetch(id).await {
                Some(snapshot) => {
                    info!("Fetched badge: {}", snapshot.name);
                    state.insert(TrackedItem::from_snapshot(&snapshot, Utc::now()));
                }
                None => warn!("Failed to fetch badge: {id}"),
            }
        }
        // A rebuilt baseline must not revive badges already marked stopped.
        if let Some(status) = &self.status {
            state.apply_statuses(&status.load(), Utc::now());
        }

        let tracked = state.len();
        self.state = state;
        if tracked == 0 {
            warn!("No badges could be fetched, will retry");
            return 0;
        }

        self.persist();
        info!("Badge data initialized: {tracked}/{} badges", self.badge_ids.len());
        self.notifier
            .notify(&Notification::Reinitialized {
                tracked,
                configured: self.badge_ids.len(),
            })
            .await;
        tracked
    }

    async fn enter_sleep(&mut self) {
        info!("All badges have stopped. Entering sleep mode");
        if self.options.announce_sleep {
            self.notifier.notify(&Notification::SleepMode).await;
        }
        self.phase = Phase::Sleeping;
    }

    /// Configured badges missing from the store get a baseline on their first
    /// successful fetch. A failed fetch is retried next pass.
    async fn adopt_new_badges(&mut self, report: &mut PassReport) {
        let missing: Vec<BadgeId> = self
            .badge_ids
            .iter()
            .copied()
            .filter(|id| !self.state.contains(*id))
            .collect();
        for id in missing {
            let Some(snapshot) = self.source.fetch(id).await else {
                warn!("Failed to fetch new badge {id}, will retry next pass");
                report.failed += 1;
                tokio::time::sleep(self.options.failure_delay).await;
                continue;
            };
            info!("Now tracking new badge: {}", snapshot.name);
            if self
                .state
                .insert(TrackedItem::from_snapshot(&snapshot, Utc::now()))
            {
                report.added += 1;
            }
        }
        if report.added > 0 {
            self.persist();
        }
    }

    fn load_state(&self) -> TrackingState {
        let mut state = TrackingState::from_items(self.data.load());
        if let Some(status) = &self.status {
            state.apply_statuses(&status.load(), Utc::now());
        }
        state
    }

    /// Save the collection (and status file). A failure is logged and
    /// retried at the start of the next pass.
    fn persist(&mut self) {
        let mut ok = true;
        if let Err(e) = self.data.save(self.state.items()) {
            error!("Failed to save {}: {e:#}", self.data.path().display());
            ok = false;
        }
        if let Some(status) = &self.status {
            if let Err(e) = status.save(&self.state.statuses()) {
                error!("Failed to save {}: {e:#}", status.path().display());
                ok = false;
            }
        }
        self.unsaved = !ok;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::tests::RecordingChat;
    use crate::state::tests::make_item;
    use crate::types::{AwardingUniverse, BadgeSnapshot, Tracking};
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Replays scripted counts per badge. `None` is a failed fetch; the last
    /// scripted value repeats once the queue is down to one entry.
    #[derive(Default)]
    struct ScriptedSource {
        script: Mutex<HashMap<BadgeId, VecDeque<Option<u64>>>>,
        calls: Mutex<Vec<BadgeId>>,
    }

    impl ScriptedSource {
        fn with(entries: &[(BadgeId, Vec<Option<u64>>)]) -> Arc<Self> {
            let source = Self::default();
            {
                let mut script = source.script.lock().unwrap();
                for (id, counts) in entries {
                    script.insert(*id, counts.iter().copied().collect());
                }
            }
            Arc::new(source)
        }

        fn calls(&self) -> Vec<BadgeId> {
            self.calls.lock().unwrap().clone()
        }

        fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl BadgeSource for ScriptedSource {
        async fn fetch(&self, id: BadgeId) -> Option<BadgeSnapshot> {
            self.calls.lock().unwrap().push(id);
            let mut script = self.script.lock().unwrap();
            let queue = script.get_mut(&id)?;
            let count = if queue.len() > 1 {
                queue.pop_front()?
            } else {
                *queue.front()?
            }?;
            Some(BadgeSnapshot {
                id,
                name: format!("Badge {id}"),
                current_count: count,
                past_day_count: 0,
                win_rate_percentage: 0.0,
                awarding_universe: AwardingUniverse {
                    id: 10,
                    name: "Obby".into(),
                    root_place_id: 20,
                },
            })
        }
    }

    struct NeverReady;

    #[async_trait]
    impl ChatSink for NeverReady {
        async fn wait_until_ready(&self) -> Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }

        async fn send_message(&self, _channel_id: u64, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    struct RejectedToken;

    #[async_trait]
    impl ChatSink for RejectedToken {
        async fn wait_until_ready(&self) -> Result<()> {
            anyhow::bail!("invalid token")
        }

        async fn send_message(&self, _channel_id: u64, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    fn options() -> SchedulerOptions {
        SchedulerOptions {
            threshold: 15,
            stop_notice: StopNotice::Replace,
            announce_sleep: true,
            item_delay: Duration::ZERO,
            failure_delay: Duration::ZERO,
            reinit_delay: Duration::ZERO,
            cycle_delay: Duration::ZERO,
        }
    }

    struct Harness {
        _dir: TempDir,
        source: Arc<ScriptedSource>,
        chat: Arc<RecordingChat>,
        data_path: std::path::PathBuf,
        status_path: std::path::PathBuf,
        scheduler: Scheduler<Arc<ScriptedSource>, Arc<RecordingChat>>,
    }

    fn harness(
        ids: &[BadgeId],
        script: &[(BadgeId, Vec<Option<u64>>)],
        with_status: bool,
    ) -> Harness {
        let dir = TempDir::new().unwrap();
        let data_path = dir.path().join("badge_data.json");
        let status_path = dir.path().join("badge_tracking.json");
        let source = ScriptedSource::with(script);
        let chat = Arc::new(RecordingChat::default());
        let scheduler = Scheduler::new(
            source.clone(),
            Notifier::new(chat.clone(), 99, None),
            JsonStore::new(&data_path),
            with_status.then(|| JsonStore::new(&status_path)),
            ids.to_vec(),
            options(),
        );
        Harness {
            _dir: dir,
            source,
            chat,
            data_path,
            status_path,
            scheduler,
        }
    }

    fn stored(path: &std::path::Path) -> Vec<TrackedItem> {
        JsonStore::<TrackedItem>::new(path).load()
    }

    #[tokio::test]
    async fn empty_store_reinitializes_every_configured_badge() {
        let mut h = harness(&[1, 2, 3], &[(1, vec![Some(10)]), (2, vec![Some(20)]), (3, vec![None])], false);

        let outcome = h.scheduler.run_pass().await;

        assert_eq!(outcome, PassOutcome::Reinitialized { tracked: 2 });
        assert_eq!(h.source.calls(), vec![1, 2, 3]);
        let items = stored(&h.data_path);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].baseline_count, 10);
        assert_eq!(items[1].last_seen_count, 20);
        assert_eq!(h.chat.messages().len(), 1);
        assert!(h.chat.messages()[0].contains("2/3"));
    }

    #[tokio::test]
    async fn increase_then_threshold_then_excluded() {
        let mut h = harness(&[1], &[(1, vec![Some(100), Some(105), Some(118), Some(130)])], false);

        h.scheduler.run_pass().await;
        h.chat.sent.lock().unwrap().clear();

        let outcome = h.scheduler.run_pass().await;
        assert!(matches!(outcome, PassOutcome::Completed(ref r) if r.increased == 1));
        let msgs = h.chat.messages();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("Previous: **100** → New: **105**"));
        assert!(msgs[0].contains("Increase: **5**"));
        let item = &stored(&h.data_path)[0];
        assert_eq!(item.last_seen_count, 105);
        assert!(item.active);

        let outcome = h.scheduler.run_pass().await;
        assert!(matches!(outcome, PassOutcome::Completed(ref r) if r.stopped == 1));
        let msgs = h.chat.messages();
        assert_eq!(msgs.len(), 2);
        assert!(msgs[1].contains("will no longer be tracked"));
        let item = &stored(&h.data_path)[0];
        assert_eq!(item.last_seen_count, 118);
        assert!(!item.active);

        h.source.clear_calls();
        assert_eq!(h.scheduler.run_pass().await, PassOutcome::AllStopped);
        assert!(h.source.calls().is_empty());
        assert_eq!(h.chat.messages().len(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_skips_without_mutation() {
        let mut h = harness(
            &[1, 2],
            &[(1, vec![Some(50), None, Some(50)]), (2, vec![Some(7), Some(9)])],
            false,
        );
        h.scheduler.run_pass().await;
        h.chat.sent.lock().unwrap().clear();

        let outcome = h.scheduler.run_pass().await;
        let PassOutcome::Completed(report) = outcome else {
            panic!("expected a completed pass");
        };
        assert_eq!(report.failed, 1);
        assert_eq!(report.checked, 1);
        let items = stored(&h.data_path);
        assert_eq!(items[0].last_seen_count, 50);
        assert_eq!(items[1].last_seen_count, 9);
        assert_eq!(h.chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn stopped_badge_is_never_fetched_again() {
        let mut h = harness(&[1, 2], &[(1, vec![Some(0), Some(20)]), (2, vec![Some(5)])], false);
        h.scheduler.run_pass().await;
        h.scheduler.run_pass().await;
        assert!(!h.scheduler.state().get(1).unwrap().active);

        for _ in 0..3 {
            h.source.clear_calls();
            h.scheduler.run_pass().await;
            assert_eq!(h.source.calls(), vec![2]);
        }
        let stops = h
            .chat
            .messages()
            .iter()
            .filter(|m| m.contains("no longer be tracked"))
            .count();
        assert_eq!(stops, 1);
    }

    #[tokio::test]
    async fn restart_with_existing_store_does_not_replay() {
        let mut h = harness(&[1], &[(1, vec![Some(110)])], false);
        let mut item = make_item(1, 100);
        item.last_seen_count = 110;
        JsonStore::<TrackedItem>::new(&h.data_path).save(&[item]).unwrap();

        let outcome = h.scheduler.run_pass().await;
        assert!(matches!(outcome, PassOutcome::Completed(_)));
        assert!(h.chat.messages().is_empty());
        assert_eq!(stored(&h.data_path)[0].baseline_count, 100);
    }

    #[tokio::test]
    async fn decreased_count_is_not_persisted() {
        let mut h = harness(&[1], &[(1, vec![Some(90)])], false);
        let mut item = make_item(1, 100);
        item.last_seen_count = 104;
        JsonStore::<TrackedItem>::new(&h.data_path).save(&[item]).unwrap();

        h.scheduler.run_pass().await;
        assert_eq!(stored(&h.data_path)[0].last_seen_count, 104);
        assert!(h.chat.messages().is_empty());
    }

    #[tokio::test]
    async fn corrupt_store_triggers_reinitialization() {
        let mut h = harness(&[1], &[(1, vec![Some(3)])], false);
        std::fs::write(&h.data_path, "garbage").unwrap();
        assert_eq!(
            h.scheduler.run_pass().await,
            PassOutcome::Reinitialized { tracked: 1 }
        );
        assert_eq!(stored(&h.data_path).len(), 1);
    }

    #[tokio::test]
    async fn new_configured_badge_is_adopted_lazily() {
        let mut h = harness(&[1, 2], &[(1, vec![Some(10)]), (2, vec![Some(40), Some(41)])], false);
        JsonStore::<TrackedItem>::new(&h.data_path)
            .save(&[make_item(1, 10)])
            .unwrap();

        let PassOutcome::Completed(report) = h.scheduler.run_pass().await else {
            panic!("expected a completed pass");
        };
        assert_eq!(report.added, 1);
        let items = stored(&h.data_path);
        assert_eq!(items[1].id, 2);
        assert_eq!(items[1].baseline_count, 40);
        assert_eq!(items[1].last_seen_count, 41);
    }

    #[tokio::test]
    async fn status_file_keeps_stopped_badges_stopped() {
        let mut h = harness(&[1, 2], &[(1, vec![Some(10)]), (2, vec![Some(20)])], true);
        JsonStore::<TrackingStatus>::new(&h.status_path)
            .save(&[TrackingStatus {
                id: 1,
                name: "Badge 1".into(),
                tracking: Tracking::Stopped,
            }])
            .unwrap();

        h.scheduler.run_pass().await;
        let items = stored(&h.data_path);
        assert!(!items[0].active);
        assert!(items[1].active);

        h.source.clear_calls();
        h.scheduler.run_pass().await;
        assert_eq!(h.source.calls(), vec![2]);

        let statuses = JsonStore::<TrackingStatus>::new(&h.status_path).load();
        assert_eq!(statuses[0].tracking, Tracking::Stopped);
        assert_eq!(statuses[1].tracking, Tracking::Online);
    }

    #[tokio::test]
    async fn all_stopped_enters_terminal_sleep() {
        let mut h = harness(&[1], &[(1, vec![Some(5)])], false);
        let mut item = make_item(1, 0);
        item.deactivate(Utc::now());
        JsonStore::<TrackedItem>::new(&h.data_path).save(&[item]).unwrap();

        let phase = h.scheduler.run_until(async {}).await.unwrap();

        assert_eq!(phase, Phase::Sleeping);
        assert_eq!(h.scheduler.phase(), Phase::Sleeping);
        assert!(h.source.calls().is_empty());
        let msgs = h.chat.messages();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].contains("sleep mode"));
    }

    #[tokio::test]
    async fn sleep_announcement_can_be_disabled() {
        let mut h = harness(&[1], &[(1, vec![Some(5)])], false);
        let mut item = make_item(1, 0);
        item.deactivate(Utc::now());
        JsonStore::<TrackedItem>::new(&h.data_path).save(&[item]).unwrap();
        h.scheduler.options.announce_sleep = false;

        let phase = h.scheduler.run_until(async {}).await.unwrap();
        assert_eq!(phase, Phase::Sleeping);
        assert!(h.chat.messages().is_empty());
    }

    #[tokio::test]
    async fn shutdown_before_ready_never_polls() {
        let dir = TempDir::new().unwrap();
        let source = ScriptedSource::with(&[(1, vec![Some(1)])]);
        let mut scheduler = Scheduler::new(
            source.clone(),
            Notifier::new(NeverReady, 1, None),
            JsonStore::new(dir.path().join("badge_data.json")),
            None,
            vec![1],
            options(),
        );

        let phase = scheduler.run_until(async {}).await.unwrap();
        assert_eq!(phase, Phase::WaitingForConnection);
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_save_keeps_stopped_badge_stopped() {
        let mut h = harness(&[1], &[(1, vec![Some(100), Some(118)])], false);
        h.scheduler.run_pass().await;
        let blocker = h.data_path.with_file_name("badge_data.json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        for _ in 0..3 {
            h.scheduler.run_pass().await;
        }
        let stops = h
            .chat
            .messages()
            .iter()
            .filter(|m| m.contains("no longer be tracked"))
            .count();
        assert_eq!(stops, 1);
        assert!(!h.scheduler.state().get(1).unwrap().active);
        assert!(stored(&h.data_path)[0].active);

        std::fs::remove_dir(&blocker).unwrap();
        h.scheduler.run_pass().await;
        let item = &stored(&h.data_path)[0];
        assert!(!item.active);
        assert_eq!(item.last_seen_count, 118);
    }

    #[tokio::test]
    async fn failed_save_after_reinit_does_not_rebuild_again() {
        let mut h = harness(&[1], &[(1, vec![Some(100)])], false);
        let blocker = h.data_path.with_file_name("badge_data.json.tmp");
        std::fs::create_dir(&blocker).unwrap();

        assert_eq!(
            h.scheduler.run_pass().await,
            PassOutcome::Reinitialized { tracked: 1 }
        );
        assert!(matches!(h.scheduler.run_pass().await, PassOutcome::Completed(_)));
        assert_eq!(h.chat.messages().len(), 1);

        std::fs::remove_dir(&blocker).unwrap();
        h.scheduler.run_pass().await;
        assert_eq!(stored(&h.data_path)[0].baseline_count, 100);
    }

    #[tokio::test]
    async fn unfetched_new_badge_does_not_trigger_sleep() {
        let mut h = harness(&[1, 2], &[(1, vec![Some(5)]), (2, vec![None, Some(5)])], false);
        let mut item = make_item(1, 0);
        item.deactivate(Utc::now());
        JsonStore::<TrackedItem>::new(&h.data_path).save(&[item]).unwrap();

        let PassOutcome::Completed(report) = h.scheduler.run_pass().await else {
            panic!("expected a completed pass");
        };
        assert_eq!(report.failed, 1);
        assert_eq!(report.added, 0);

        let PassOutcome::Completed(report) = h.scheduler.run_pass().await else {
            panic!("expected a completed pass");
        };
        assert_eq!(report.added, 1);
        assert!(h.scheduler.state().get(2).unwrap().active);
        assert!(h.chat.messages().is_empty());
    }

    #[tokio::test]
    async fn reset_clears_data_and_status_files() {
        let mut h = harness(&[1], &[(1, vec![Some(30)])], true);
        let mut item = make_item(1, 0);
        item.deactivate(Utc::now());
        JsonStore::<TrackedItem>::new(&h.data_path).save(&[item]).unwrap();
        JsonStore::<TrackingStatus>::new(&h.status_path)
            .save(&[TrackingStatus {
                id: 1,
                name: "Badge 1".into(),
                tracking: Tracking::Stopped,
            }])
            .unwrap();

        h.scheduler.reset().unwrap();
        assert!(stored(&h.data_path).is_empty());
        assert!(JsonStore::<TrackingStatus>::new(&h.status_path).load().is_empty());

        assert_eq!(
            h.scheduler.run_pass().await,
            PassOutcome::Reinitialized { tracked: 1 }
        );
        let item = &stored(&h.data_path)[0];
        assert!(item.active);
        assert_eq!(item.baseline_count, 30);
    }

    #[tokio::test]
    async fn readiness_failure_is_fatal_and_never_polls() {
        let dir = TempDir::new().unwrap();
        let source = ScriptedSource::with(&[(1, vec![Some(1)])]);
        let mut scheduler = Scheduler::new(
            source.clone(),
            Notifier::new(RejectedToken, 1, None),
            JsonStore::new(dir.path().join("badge_data.json")),
            None,
            vec![1],
            options(),
        );

        let err = scheduler
            .run_until(std::future::pending::<()>())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("invalid token"));
        assert_eq!(scheduler.phase(), Phase::WaitingForConnection);
        assert!(source.calls().is_empty());
    }
}
