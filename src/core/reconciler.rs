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

//! Local game state reconciliation
//!
//! Every catalog title is reported as installed. Each cycle the fresh snapshot
//! is diffed against the previous one and only changed entries are emitted.
//!
//! Titles that disappear from the catalog are not reported as uninstalled.
//! The host only ever learns about installs from this side.

use super::models::{LocalGameState, LocalGameStatus, Title};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Map every title to an installed status, in catalog order
pub fn snapshot(titles: &[Title]) -> Vec<LocalGameStatus> {
    titles
        .iter()
        .map(|title| LocalGameStatus::new(title.id.clone(), LocalGameState::Installed))
        .collect()
}

/// Entries of `current` whose state differs from `previous`
///
/// Titles absent from `previous` are always included. Order follows `current`.
pub fn diff(previous: &[LocalGameStatus], current: &[LocalGameStatus]) -> Vec<LocalGameStatus> {
    let known: HashMap<&str, LocalGameState> = previous
        .iter()
        .map(|status| (status.title_id.as_str(), status.state))
        .collect();

    current
        .iter()
        .filter(|status| known.get(status.title_id.as_str()) != Some(&status.state))
        .cloned()
        .collect()
}

/// Cached snapshot of the last reconciliation
///
/// Overlapping reconciliations are allowed; the last one to finish wins.
#[derive(Debug, Default)]
pub struct LocalStateCache {
    statuses: Mutex<Vec<LocalGameStatus>>,
}

impl LocalStateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cached snapshot
    pub fn statuses(&self) -> Vec<LocalGameStatus> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the cache with `current` and return what changed
    pub fn reconcile(&self, current: Vec<LocalGameStatus>) -> Vec<LocalGameStatus> {
        let mut cached = self.statuses.lock().unwrap_or_else(PoisonError::into_inner);
        let changes = diff(&cached, &current);
        *cached = current;
        changes
    }
}
