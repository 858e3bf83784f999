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

//! Custom assertions for ledger and notification checks

use ps2_integration::core::models::{LocalGameState, LocalGameStatus, TimeRecord};
use ps2_integration::core::notify::Notification;
use std::path::Path;

/// Assert the ledger file parses to `expected`
pub fn assert_ledger_json(path: &Path, expected: serde_json::Value) {
    let contents = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read ledger {}: {}", path.display(), e));
    let actual: serde_json::Value = serde_json::from_str(&contents).expect("ledger is not JSON");
    assert_eq!(
        actual, expected,
        "Ledger mismatch: expected {}, got {}",
        expected, actual
    );
}

pub fn installed(id: &str) -> Notification {
    Notification::LocalStateChanged(LocalGameStatus::new(id, LocalGameState::Installed))
}

#[allow(dead_code)]
pub fn time_update(id: &str, total_seconds: u64, last_played: Option<i64>) -> Notification {
    Notification::TimeUpdated(TimeRecord {
        title_id: id.to_string(),
        total_seconds,
        last_played,
    })
}
