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

//! Data types shared between the catalog, ledger and host-facing surface

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Absolute time in whole seconds since the Unix epoch
pub type Timestamp = i64;

/// A game known to the catalog
///
/// Identity is `id`. Titles are immutable once loaded from a catalog snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    /// Catalog identifier (e.g., the ROM file stem)
    pub id: String,

    /// Display name
    pub name: String,

    /// Path to the disc image
    pub path: PathBuf,
}

impl Title {
    pub fn new(id: impl Into<String>, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Installation state reported to the host
///
/// Only `Installed` is ever produced here; absence from the catalog means
/// not installed by omission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocalGameState {
    NotInstalled,
    Installed,
    Installing,
    Uninstalling,
}

/// Unit of local state change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalGameStatus {
    pub title_id: String,
    pub state: LocalGameState,
}

impl LocalGameStatus {
    pub fn new(title_id: impl Into<String>, state: LocalGameState) -> Self {
        Self {
            title_id: title_id.into(),
            state,
        }
    }
}

/// Accumulated playtime for one title
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRecord {
    pub title_id: String,

    /// Total playtime in seconds
    pub total_seconds: u64,

    /// End of the most recent session, `None` if never played
    pub last_played: Option<Timestamp>,
}

impl TimeRecord {
    /// A record for a title that has never been played
    pub fn unplayed(title_id: impl Into<String>) -> Self {
        Self {
            title_id: title_id.into(),
            total_seconds: 0,
            last_played: None,
        }
    }
}

/// License attached to an owned game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseType {
    SinglePurchase,
}

/// Owned-game record returned to the host library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedGame {
    pub game_id: String,
    pub title: String,
    pub license: LicenseType,
}

impl From<&Title> for OwnedGame {
    fn from(title: &Title) -> Self {
        Self {
            game_id: title.id.clone(),
            title: title.name.clone(),
            license: LicenseType::SinglePurchase,
        }
    }
}

/// Account reported on authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user_id: String,
    pub user_name: String,
}
