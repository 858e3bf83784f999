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

//! Host-facing integration surface
//!
//! This ties the catalog, launcher, session monitor, ledger and poll driver
//! together behind the operations a game-library host invokes. The transport
//! carrying those calls is not part of this crate.
//!
//! # Example
//!
//! ```no_run
//! use ps2_integration::core::config::Settings;
//! use ps2_integration::core::integration::{Collaborators, Integration};
//! use ps2_integration::core::notify::ChannelSink;
//!
//! # async fn run() -> ps2_integration::core::error::Result<()> {
//! let settings = Settings::from_file("ps2_integration.toml")?;
//! let (sink, mut notifications) = ChannelSink::new();
//! let collaborators = Collaborators::system(&settings, sink);
//! let mut integration = Integration::new(
//!     settings,
//!     collaborators,
//!     tokio::runtime::Handle::current(),
//!     Default::default(),
//! )?;
//!
//! let games = integration.get_owned_games().await?;
//! integration.launch_game(&games[0].game_id)?;
//! integration.tick();
//! # Ok(())
//! # }
//! ```

use super::catalog::{Catalog, RomDirectoryCatalog};
use super::clock::{Clock, SystemClock};
use super::config::Settings;
use super::driver::{DriverConfig, PollDriver, SharedState, TickHandles};
use super::error::{IntegrationError, Result};
use super::launcher::{self, ProcessSpawner, SystemSpawner};
use super::ledger::TimeLedger;
use super::models::{Account, LocalGameStatus, OwnedGame, TimeRecord};
use super::notify::NotificationSink;
use log::info;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Account id reported to the host
pub const USER_ID: &str = "pcsx2_user";

/// External collaborators the integration depends on
pub struct Collaborators {
    pub catalog: Arc<dyn Catalog>,
    pub spawner: Arc<dyn ProcessSpawner>,
    pub sink: Arc<dyn NotificationSink>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// ROM directory catalog, real process spawning and the system clock
    pub fn system(settings: &Settings, sink: impl NotificationSink + 'static) -> Self {
        Self {
            catalog: Arc::new(RomDirectoryCatalog::new(&settings.roms_path)),
            spawner: Arc::new(SystemSpawner),
            sink: Arc::new(sink),
            clock: Arc::new(SystemClock),
        }
    }
}

/// PCSX2 game-library integration
pub struct Integration {
    settings: Settings,
    driver: PollDriver,
    spawner: Arc<dyn ProcessSpawner>,
    clock: Arc<dyn Clock>,
}

impl Integration {
    /// Build the integration
    ///
    /// Local game state is first reported by the first `tick()`.
    pub fn new(
        settings: Settings,
        collaborators: Collaborators,
        runtime: Handle,
        config: DriverConfig,
    ) -> Result<Self> {
        let ledger = TimeLedger::new(settings.ledger_path()?);
        info!("Playtime ledger: {}", ledger.path().display());

        let shared = Arc::new(SharedState::new(
            ledger,
            collaborators.catalog,
            collaborators.sink,
        ));
        let driver = PollDriver::new(shared, collaborators.clock.clone(), runtime, config);

        Ok(Self {
            settings,
            driver,
            spawner: collaborators.spawner,
            clock: collaborators.clock,
        })
    }

    fn shared(&self) -> &Arc<SharedState> {
        self.driver.shared()
    }

    /// Report the local account; the ROM directory doubles as the user name
    pub fn authenticate(&self) -> Account {
        Account {
            user_id: USER_ID.to_string(),
            user_name: self.settings.roms_path.display().to_string(),
        }
    }

    /// Fetch the catalog and return every title as an owned game
    pub async fn get_owned_games(&self) -> Result<Vec<OwnedGame>> {
        let shared = self.shared().clone();
        let titles = self
            .driver
            .runtime()
            .spawn_blocking(move || shared.catalog.get_titles())
            .await
            .map_err(|e| IntegrationError::CatalogUnavailable(e.to_string()))??;

        let games = titles.iter().map(OwnedGame::from).collect();
        self.shared().set_titles(titles);
        Ok(games)
    }

    /// Installed-state snapshot from the last reconciliation
    pub fn get_local_games(&self) -> Vec<LocalGameStatus> {
        self.shared().cache.statuses()
    }

    /// Launch PCSX2 for a title and start tracking the session
    ///
    /// # Errors
    ///
    /// - `UnknownTitle` if the id is not in the last catalog fetch
    /// - `SessionAlreadyActive` if another session is running; nothing is spawned.
    ///   A session whose emulator already exited is recorded first and does not
    ///   count as running.
    /// - `ProcessSpawnFailed` if the emulator cannot be started
    pub fn launch_game(&mut self, title_id: &str) -> Result<()> {
        let title = self
            .shared()
            .find_title(title_id)
            .ok_or_else(|| IntegrationError::UnknownTitle(title_id.to_string()))?;

        self.driver.settle_session();
        if let Some(running) = self.driver.monitor().running_title() {
            return Err(IntegrationError::SessionAlreadyActive {
                title_id: running.to_string(),
            });
        }

        let process = launcher::launch(
            self.spawner.as_ref(),
            &title,
            &self.settings.launch_options(),
        )?;
        let now = self.clock.now();
        self.driver.monitor_mut().start(&title.id, process, now)
    }

    /// Read the ledger (creating it if needed) for a batch of time lookups
    ///
    /// A storage failure from earlier background work is returned first.
    pub async fn prepare_game_times_context(&self) -> Result<BTreeMap<String, TimeRecord>> {
        if let Some(err) = self.shared().take_deferred_error() {
            return Err(err);
        }

        let shared = self.shared().clone();
        self.driver
            .runtime()
            .spawn_blocking(move || shared.ledger.load_or_init(&shared.titles()))
            .await
            .map_err(|e| IntegrationError::storage(self.shared().ledger.path(), e))?
    }

    /// Look up one title's time in a prepared context and push it to the host
    pub fn get_game_time(
        &self,
        title_id: &str,
        context: &BTreeMap<String, TimeRecord>,
    ) -> Option<TimeRecord> {
        let record = context.get(title_id)?.clone();
        self.shared().sink.notify_time_update(record.clone());
        Some(record)
    }

    /// Periodic host tick
    pub fn tick(&mut self) -> TickHandles {
        self.driver.tick()
    }

    /// Whether an emulator session is running
    pub fn is_playing(&self) -> bool {
        self.driver.monitor().is_active()
    }
}
