// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Poll driver
//!
//! The host calls [`PollDriver::tick`] periodically from its control thread.
//! Each tick:
//!
//! 1. Polls the session monitor (cheap, done inline)
//! 2. Offloads one unit of work that records a finished session in the ledger,
//!    then reconciles local game state and notifies the host of changes
//! 3. Every `refresh_every` ticks, additionally offloads a bulk ledger refresh
//!    that waits `refresh_grace` first, giving the host time to fetch the
//!    library before time updates arrive
//!
//! Offloaded work runs on the tokio blocking pool. `tick` never waits for it.
//! Overlapping reconciliations are tolerated; the snapshot cache keeps the
//! result of whichever finishes last.

use super::catalog::Catalog;
use super::clock::Clock;
use super::error::IntegrationError;
use super::ledger::TimeLedger;
use super::models::Title;
use super::notify::NotificationSink;
use super::reconciler::{snapshot, LocalStateCache};
use super::session::{SessionMonitor, SessionResult};
use log::{debug, error};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Ticks between bulk ledger refreshes
pub const REFRESH_EVERY_TICKS: u64 = 5;

/// Delay before a bulk refresh reads the ledger
pub const REFRESH_GRACE: Duration = Duration::from_secs(60);

/// Poll cadence settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    pub refresh_every: u64,
    pub refresh_grace: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            refresh_every: REFRESH_EVERY_TICKS,
            refresh_grace: REFRESH_GRACE,
        }
    }
}

/// State reachable from offloaded work
pub struct SharedState {
    pub ledger: TimeLedger,
    pub catalog: Arc<dyn Catalog>,
    pub sink: Arc<dyn NotificationSink>,
    pub cache: LocalStateCache,

    /// Titles from the most recent catalog fetch
    titles: RwLock<Vec<Title>>,

    /// Storage failure from offloaded work, reported by the next ledger operation
    deferred_error: Mutex<Option<IntegrationError>>,

    /// Message of the last error logged at `error` level
    last_logged: Mutex<Option<String>>,
}

impl SharedState {
    pub fn new(
        ledger: TimeLedger,
        catalog: Arc<dyn Catalog>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            ledger,
            catalog,
            sink,
            cache: LocalStateCache::new(),
            titles: RwLock::new(Vec::new()),
            deferred_error: Mutex::new(None),
            last_logged: Mutex::new(None),
        }
    }

    /// Titles from the most recent catalog fetch
    pub fn titles(&self) -> Vec<Title> {
        self.titles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Look up a title by id
    pub fn find_title(&self, title_id: &str) -> Option<Title> {
        self.titles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|t| t.id == title_id)
            .cloned()
    }

    pub fn set_titles(&self, titles: Vec<Title>) {
        *self.titles.write().unwrap_or_else(PoisonError::into_inner) = titles;
    }

    /// Retain an error raised by offloaded work
    ///
    /// A failure repeating the previous one is logged at `debug` only.
    pub fn defer_error(&self, err: IntegrationError) {
        if self.is_new_error(&err) {
            error!("{}", err);
        } else {
            debug!("{} (repeated)", err);
        }
        *self
            .deferred_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err);
    }

    fn is_new_error(&self, err: &IntegrationError) -> bool {
        let message = err.to_string();
        let mut last = self
            .last_logged
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if last.as_deref() == Some(message.as_str()) {
            return false;
        }
        *last = Some(message);
        true
    }

    fn clear_logged_error(&self) {
        *self
            .last_logged
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Take the retained error, if any
    pub fn take_deferred_error(&self) -> Option<IntegrationError> {
        self.deferred_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Record a finished session and notify the host of the new total
    pub fn record_session(&self, result: &SessionResult) {
        match self
            .ledger
            .increment(&result.title_id, result.duration, result.end_time)
        {
            Ok(record) => self.sink.notify_time_update(record),
            Err(e) => self.defer_error(e),
        }
    }

    /// Fetch the catalog, diff against the cached snapshot and notify changes
    ///
    /// A catalog failure skips this cycle and keeps the previous snapshot.
    pub fn reconcile(&self) {
        let titles = match self.catalog.get_titles() {
            Ok(titles) => titles,
            Err(e) => {
                debug!("Reconciliation skipped: {}", e);
                return;
            }
        };

        match self.ledger.register_titles(&titles) {
            Ok(_) => self.clear_logged_error(),
            Err(e) => self.defer_error(e),
        }

        let current = snapshot(&titles);
        self.set_titles(titles);

        for status in self.cache.reconcile(current) {
            self.sink.notify_local_state_change(status);
        }
    }

    /// Push every ledger record to the host
    ///
    /// Catalog titles go first, in catalog order, followed by records for
    /// titles no longer in the catalog.
    pub fn refresh_times(&self) {
        let mut records = match self.ledger.read_all() {
            Ok(records) => records,
            Err(e) => {
                self.defer_error(e);
                return;
            }
        };

        for title in self.titles() {
            if let Some(record) = records.remove(&title.id) {
                self.sink.notify_time_update(record);
            }
        }
        for record in records.into_values() {
            self.sink.notify_time_update(record);
        }
    }
}

/// Work spawned by one tick
///
/// Dropping the handles does not cancel the work.
pub struct TickHandles {
    /// Session recording plus reconciliation
    pub cycle: JoinHandle<()>,

    /// Delayed bulk ledger refresh, on every `refresh_every`-th tick
    pub refresh: Option<JoinHandle<()>>,
}

/// Periodic driver owning the session monitor and tick counter
pub struct PollDriver {
    shared: Arc<SharedState>,
    monitor: SessionMonitor,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    config: DriverConfig,
    tick_count: u64,
}

impl PollDriver {
    pub fn new(
        shared: Arc<SharedState>,
        clock: Arc<dyn Clock>,
        runtime: Handle,
        config: DriverConfig,
    ) -> Self {
        Self {
            shared,
            monitor: SessionMonitor::new(),
            clock,
            runtime,
            config,
            tick_count: 0,
        }
    }

    pub fn shared(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn monitor(&self) -> &SessionMonitor {
        &self.monitor
    }

    pub fn monitor_mut(&mut self) -> &mut SessionMonitor {
        &mut self.monitor
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Record a session whose emulator has already exited
    ///
    /// Runs on the caller's thread. Returns whether a session was closed.
    pub fn settle_session(&mut self) -> bool {
        match self.monitor.check(self.clock.now()) {
            Some(result) => {
                self.shared.record_session(&result);
                true
            }
            None => false,
        }
    }

    /// Run one poll cycle
    pub fn tick(&mut self) -> TickHandles {
        let finished = self.monitor.check(self.clock.now());
        let cycle = self.spawn_cycle(finished);

        self.tick_count += 1;
        let refresh = if self.config.refresh_every > 0
            && self.tick_count % self.config.refresh_every == 0
        {
            Some(self.spawn_refresh())
        } else {
            None
        };

        TickHandles { cycle, refresh }
    }

    fn spawn_cycle(&self, finished: Option<SessionResult>) -> JoinHandle<()> {
        let shared = self.shared.clone();
        self.runtime.spawn_blocking(move || {
            if let Some(result) = finished {
                shared.record_session(&result);
            }
            shared.reconcile();
        })
    }

    fn spawn_refresh(&self) -> JoinHandle<()> {
        let shared = self.shared.clone();
        let grace = self.config.refresh_grace;
        self.runtime.spawn(async move {
            tokio::time::sleep(grace).await;
            let result = tokio::task::spawn_blocking(move || shared.refresh_times()).await;
            if let Err(e) = result {
                error!("Ledger refresh task failed: {}", e);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Result;
    use crate::core::models::{LocalGameState, LocalGameStatus, TimeRecord};
    use crate::core::notify::{ChannelSink, Notification};
    use crate::core::session::{ProcessExit, ProcessHandle};
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use tempfile::TempDir;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct FixedCatalog(Mutex<Result<Vec<Title>>>);

    impl FixedCatalog {
        fn set(&self, titles: Result<Vec<Title>>) {
            *self.0.lock().unwrap() = titles;
        }
    }

    impl Catalog for FixedCatalog {
        fn get_titles(&self) -> Result<Vec<Title>> {
            match &*self.0.lock().unwrap() {
                Ok(titles) => Ok(titles.clone()),
                Err(e) => Err(IntegrationError::CatalogUnavailable(e.to_string())),
            }
        }
    }

    struct ManualClock(AtomicI64);

    impl Clock for ManualClock {
        fn now(&self) -> i64 {
            self.0.load(Ordering::SeqCst)
        }
    }

    struct FlagProcess(Arc<AtomicBool>);

    impl ProcessHandle for FlagProcess {
        fn poll(&mut self) -> io::Result<Option<ProcessExit>> {
            Ok(self
                .0
                .load(Ordering::SeqCst)
                .then_some(ProcessExit { code: Some(0) }))
        }
    }

    struct Fixture {
        _dir: TempDir,
        driver: PollDriver,
        catalog: Arc<FixedCatalog>,
        clock: Arc<ManualClock>,
        rx: UnboundedReceiver<Notification>,
    }

    fn fixture(titles: Vec<Title>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let catalog = Arc::new(FixedCatalog(Mutex::new(Ok(titles))));
        let clock = Arc::new(ManualClock(AtomicI64::new(0)));
        let (sink, rx) = ChannelSink::new();
        let shared = Arc::new(SharedState::new(
            TimeLedger::new(dir.path().join("game_times.json")),
            catalog.clone(),
            Arc::new(sink),
        ));
        let driver = PollDriver::new(
            shared,
            clock.clone(),
            Handle::current(),
            DriverConfig::default(),
        );
        Fixture {
            _dir: dir,
            driver,
            catalog,
            clock,
            rx,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    fn installed(id: &str) -> Notification {
        Notification::LocalStateChanged(LocalGameStatus::new(id, LocalGameState::Installed))
    }

    #[tokio::test]
    async fn test_tick_emits_only_changes() {
        let mut fx = fixture(vec![Title::new("1", "Game A", "a.iso")]);

        fx.driver.tick().cycle.await.unwrap();
        assert_eq!(drain(&mut fx.rx), vec![installed("1")]);

        fx.driver.tick().cycle.await.unwrap();
        assert!(drain(&mut fx.rx).is_empty());

        fx.catalog.set(Ok(vec![
            Title::new("1", "Game A", "a.iso"),
            Title::new("2", "Game B", "b.iso"),
        ]));
        fx.driver.tick().cycle.await.unwrap();
        assert_eq!(drain(&mut fx.rx), vec![installed("2")]);
        assert_eq!(fx.driver.tick_count(), 3);
    }

    #[tokio::test]
    async fn test_catalog_failure_keeps_previous_snapshot() {
        let mut fx = fixture(vec![Title::new("1", "Game A", "a.iso")]);
        fx.driver.tick().cycle.await.unwrap();
        drain(&mut fx.rx);

        fx.catalog
            .set(Err(IntegrationError::CatalogUnavailable("offline".to_string())));
        fx.driver.tick().cycle.await.unwrap();
        assert!(drain(&mut fx.rx).is_empty());
        assert_eq!(fx.driver.shared().cache.statuses().len(), 1);

        fx.catalog.set(Ok(vec![Title::new("1", "Game A", "a.iso")]));
        fx.driver.tick().cycle.await.unwrap();
        assert!(drain(&mut fx.rx).is_empty());
    }

    #[tokio::test]
    async fn test_reconciliation_seeds_ledger() {
        let mut fx = fixture(vec![Title::new("1", "Game A", "a.iso")]);
        fx.driver.tick().cycle.await.unwrap();

        let records = fx.driver.shared().ledger.read_all().unwrap();
        assert_eq!(records["1"], TimeRecord::unplayed("1"));
    }

    #[tokio::test]
    async fn test_finished_session_is_recorded() {
        let mut fx = fixture(vec![Title::new("1", "Game A", "a.iso")]);
        let exited = Arc::new(AtomicBool::new(false));
        fx.driver
            .monitor_mut()
            .start("1", Box::new(FlagProcess(exited.clone())), 0)
            .unwrap();

        fx.clock.0.store(10, Ordering::SeqCst);
        fx.driver.tick().cycle.await.unwrap();
        assert!(fx.driver.monitor().is_active());
        drain(&mut fx.rx);

        exited.store(true, Ordering::SeqCst);
        fx.clock.0.store(50, Ordering::SeqCst);
        fx.driver.tick().cycle.await.unwrap();

        assert!(!fx.driver.monitor().is_active());
        let expected = TimeRecord {
            title_id: "1".to_string(),
            total_seconds: 50,
            last_played: Some(50),
        };
        assert_eq!(
            drain(&mut fx.rx),
            vec![Notification::TimeUpdated(expected.clone())]
        );
        assert_eq!(fx.driver.shared().ledger.read_all().unwrap()["1"], expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_every_fifth_tick_after_grace() {
        let mut fx = fixture(vec![Title::new("1", "Game A", "a.iso")]);

        for _ in 0..4 {
            let handles = fx.driver.tick();
            assert!(handles.refresh.is_none());
            handles.cycle.await.unwrap();
        }
        drain(&mut fx.rx);

        let start = tokio::time::Instant::now();
        let handles = fx.driver.tick();
        handles.cycle.await.unwrap();
        handles.refresh.unwrap().await.unwrap();

        assert!(start.elapsed() >= REFRESH_GRACE);
        assert_eq!(
            drain(&mut fx.rx),
            vec![Notification::TimeUpdated(TimeRecord::unplayed("1"))]
        );
    }

    #[tokio::test]
    async fn test_storage_failure_is_deferred() {
        let mut fx = fixture(vec![Title::new("1", "Game A", "a.iso")]);
        std::fs::write(fx.driver.shared().ledger.path(), "garbage").unwrap();

        fx.driver.tick().cycle.await.unwrap();

        // Reconciliation still reports state
        assert_eq!(drain(&mut fx.rx), vec![installed("1")]);
        let err = fx.driver.shared().take_deferred_error().unwrap();
        assert!(err.is_storage());
        assert!(fx.driver.shared().take_deferred_error().is_none());
    }

    #[tokio::test]
    async fn test_repeated_storage_failure_is_logged_once() {
        let mut fx = fixture(vec![Title::new("1", "Game A", "a.iso")]);
        let path = fx.driver.shared().ledger.path().to_path_buf();
        std::fs::write(&path, "garbage").unwrap();

        fx.driver.tick().cycle.await.unwrap();
        let err = fx.driver.shared().take_deferred_error().unwrap();
        assert!(!fx.driver.shared().is_new_error(&err));

        // Still retained for the host even when not logged again
        fx.driver.tick().cycle.await.unwrap();
        assert!(fx.driver.shared().take_deferred_error().is_some());

        std::fs::remove_file(&path).unwrap();
        fx.driver.tick().cycle.await.unwrap();
        assert!(fx.driver.shared().take_deferred_error().is_none());
        assert!(fx.driver.shared().is_new_error(&err));
    }

    #[tokio::test]
    async fn test_idle_tick_leaves_ledger_untouched() {
        let mut fx = fixture(vec![Title::new("1", "Game A", "a.iso")]);
        fx.driver.tick().cycle.await.unwrap();
        drain(&mut fx.rx);

        let path = fx.driver.shared().ledger.path().to_path_buf();
        let before = std::fs::read_to_string(&path).unwrap();
        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();

        fx.clock.0.store(500, Ordering::SeqCst);
        fx.driver.tick().cycle.await.unwrap();

        assert!(drain(&mut fx.rx).is_empty());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }

    struct GatedCatalog(Mutex<std::sync::mpsc::Receiver<()>>);

    impl Catalog for GatedCatalog {
        fn get_titles(&self) -> Result<Vec<Title>> {
            let _ = self.0.lock().unwrap().recv();
            Ok(vec![Title::new("1", "Game A", "a.iso")])
        }
    }

    #[tokio::test]
    async fn test_tick_does_not_wait_for_slow_catalog() {
        let dir = TempDir::new().unwrap();
        let (release, gate) = std::sync::mpsc::channel();
        let (sink, mut rx) = ChannelSink::new();
        let shared = Arc::new(SharedState::new(
            TimeLedger::new(dir.path().join("game_times.json")),
            Arc::new(GatedCatalog(Mutex::new(gate))),
            Arc::new(sink),
        ));
        let mut driver = PollDriver::new(
            shared,
            Arc::new(ManualClock(AtomicI64::new(0))),
            Handle::current(),
            DriverConfig::default(),
        );

        let handles = driver.tick();
        assert_eq!(driver.tick_count(), 1);
        assert!(!handles.cycle.is_finished());
        assert!(drain(&mut rx).is_empty());

        release.send(()).unwrap();
        handles.cycle.await.unwrap();
        assert_eq!(drain(&mut rx), vec![installed("1")]);
    }

    #[tokio::test]
    async fn test_settle_session_records_exited_emulator() {
        let mut fx = fixture(vec![Title::new("1", "Game A", "a.iso")]);
        assert!(!fx.driver.settle_session());

        let exited = Arc::new(AtomicBool::new(false));
        fx.driver
            .monitor_mut()
            .start("1", Box::new(FlagProcess(exited.clone())), 100)
            .unwrap();
        fx.clock.0.store(130, Ordering::SeqCst);
        assert!(!fx.driver.settle_session());

        exited.store(true, Ordering::SeqCst);
        assert!(fx.driver.settle_session());
        assert!(!fx.driver.monitor().is_active());
        assert_eq!(
            fx.driver.shared().ledger.read_all().unwrap()["1"].total_seconds,
            30
        );
    }

    #[tokio::test]
    async fn test_refresh_follows_catalog_order() {
        let mut fx = fixture(vec![
            Title::new("b", "Game B", "b.iso"),
            Title::new("a", "Game A", "a.iso"),
        ]);
        fx.driver.tick().cycle.await.unwrap();
        fx.driver.shared().ledger.increment("orphan", 5, 1).unwrap();
        drain(&mut fx.rx);

        fx.driver.shared().refresh_times();

        let ids: Vec<String> = drain(&mut fx.rx)
            .into_iter()
            .map(|n| match n {
                Notification::TimeUpdated(record) => record.title_id,
                other => panic!("unexpected notification: {:?}", other),
            })
            .collect();
        assert_eq!(ids, vec!["b", "a", "orphan"]);
    }
}
