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

//! Test fixtures: fake collaborators and a ready-made host

use ps2_integration::core::catalog::Catalog;
use ps2_integration::core::clock::Clock;
use ps2_integration::core::config::Settings;
use ps2_integration::core::error::{IntegrationError, Result};
use ps2_integration::core::integration::{Collaborators, Integration};
use ps2_integration::core::launcher::ProcessSpawner;
use ps2_integration::core::models::{Timestamp, Title};
use ps2_integration::core::notify::{ChannelSink, Notification};
use ps2_integration::core::session::{ProcessExit, ProcessHandle};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

/// Catalog returning whatever the test last set
#[derive(Default)]
pub struct StaticCatalog {
    titles: Mutex<Option<Vec<Title>>>,
}

impl StaticCatalog {
    pub fn with_titles(titles: Vec<Title>) -> Self {
        Self {
            titles: Mutex::new(Some(titles)),
        }
    }

    pub fn set(&self, titles: Vec<Title>) {
        *self.titles.lock().unwrap() = Some(titles);
    }

    /// Make the next lookups fail
    #[allow(dead_code)]
    pub fn go_offline(&self) {
        *self.titles.lock().unwrap() = None;
    }
}

impl Catalog for StaticCatalog {
    fn get_titles(&self) -> Result<Vec<Title>> {
        self.titles
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| IntegrationError::CatalogUnavailable("offline".to_string()))
    }
}

/// Clock advanced by hand
#[derive(Default)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    pub fn set(&self, now: Timestamp) {
        self.0.store(now, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.0.load(Ordering::SeqCst)
    }
}

/// Emulator process that exits when the test says so
pub struct FakeProcess {
    exited: Arc<AtomicBool>,
}

impl ProcessHandle for FakeProcess {
    fn poll(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self
            .exited
            .load(Ordering::SeqCst)
            .then_some(ProcessExit { code: Some(0) }))
    }
}

/// Spawner recording every launch
#[derive(Default)]
pub struct FakeSpawner {
    pub launches: Mutex<Vec<(PathBuf, Vec<OsString>)>>,
    exited: Arc<AtomicBool>,
    fail: AtomicBool,
}

impl FakeSpawner {
    /// Make the running emulator exit
    pub fn exit_emulator(&self) {
        self.exited.store(true, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn fail_next(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }
}

impl ProcessSpawner for FakeSpawner {
    fn spawn(&self, program: &Path, args: &[OsString]) -> io::Result<Box<dyn ProcessHandle>> {
        if self.fail.swap(false, Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such emulator"));
        }
        self.launches
            .lock()
            .unwrap()
            .push((program.to_path_buf(), args.to_vec()));
        self.exited.store(false, Ordering::SeqCst);
        Ok(Box::new(FakeProcess {
            exited: self.exited.clone(),
        }))
    }
}

/// Integration wired to fakes, with its ledger in a temp dir
pub struct TestHost {
    pub dir: TempDir,
    pub integration: Integration,
    pub notifications: UnboundedReceiver<Notification>,
    pub catalog: Arc<StaticCatalog>,
    pub spawner: Arc<FakeSpawner>,
    pub clock: Arc<ManualClock>,
}

impl TestHost {
    pub fn new(titles: Vec<Title>) -> Self {
        let dir = TempDir::new().unwrap();
        let settings = Settings::from_toml_str(&format!(
            "roms_path = \"/roms\"\nemu_path = \"pcsx2\"\nfullscreen = true\nledger_path = {:?}\n",
            dir.path().join("ps2").join("game_times.json")
        ))
        .unwrap();

        let catalog = Arc::new(StaticCatalog::with_titles(titles));
        let spawner = Arc::new(FakeSpawner::default());
        let clock = Arc::new(ManualClock::default());
        let (sink, notifications) = ChannelSink::new();

        let integration = Integration::new(
            settings,
            Collaborators {
                catalog: catalog.clone(),
                spawner: spawner.clone(),
                sink: Arc::new(sink),
                clock: clock.clone(),
            },
            tokio::runtime::Handle::current(),
            Default::default(),
        )
        .unwrap();

        Self {
            dir,
            integration,
            notifications,
            catalog,
            spawner,
            clock,
        }
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.dir.path().join("ps2").join("game_times.json")
    }

    /// Tick once and wait for the session/reconciliation work
    pub async fn tick(&mut self) {
        self.integration.tick().cycle.await.unwrap();
    }

    /// Everything notified so far
    pub fn drain(&mut self) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = self.notifications.try_recv() {
            out.push(n);
        }
        out
    }
}

pub fn game(id: &str, name: &str) -> Title {
    Title::new(id, name, format!("/roms/{}.iso", id))
}
