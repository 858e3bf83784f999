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

//! Persistent playtime ledger
//!
//! The ledger maps title ids to accumulated playtime and is stored as a single
//! JSON document so that other tools reading the same file keep working.
//!
//! # File Format
//!
//! ```text
//! {
//!     "SLUS-20062": {
//!         "name": "Gran Turismo 3",
//!         "time_played": 3600,
//!         "last_time_played": 1700000000
//!     }
//! }
//! ```
//!
//! - `name`: informational only, may be absent
//! - `time_played`: total seconds
//! - `last_time_played`: epoch seconds, or `null` if never played
//!
//! Any other fields in an entry are kept as-is when the file is rewritten.
//!
//! # Consistency
//!
//! Every mutation is a read-modify-write of the whole document. All of them go
//! through one mutex so concurrent increments cannot lose updates, and each
//! write lands in a temporary sibling file that is synced to disk and then
//! renamed over the ledger, so a reader never sees a half-written document.
//!
//! # Example
//!
//! ```no_run
//! use ps2_integration::core::ledger::TimeLedger;
//!
//! let ledger = TimeLedger::new("game_times.json");
//! let record = ledger.increment("SLUS-20062", 120, 1_700_000_000).unwrap();
//! assert!(record.total_seconds >= 120);
//! ```

use super::error::{IntegrationError, Result};
use super::models::{TimeRecord, Timestamp, Title};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// File name used when only a storage directory is configured
pub const LEDGER_FILE_NAME: &str = "game_times.json";

/// One value of the persisted document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LedgerEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    #[serde(default)]
    time_played: u64,

    #[serde(default)]
    last_time_played: Option<Timestamp>,

    /// Fields written by other tools, carried through rewrites
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl LedgerEntry {
    fn unplayed(name: Option<String>) -> Self {
        Self {
            name,
            time_played: 0,
            last_time_played: None,
            extra: serde_json::Map::new(),
        }
    }

    fn to_record(&self, title_id: &str) -> TimeRecord {
        TimeRecord {
            title_id: title_id.to_string(),
            total_seconds: self.time_played,
            last_played: self.last_time_played,
        }
    }
}

type LedgerDocument = BTreeMap<String, LedgerEntry>;

/// Playtime ledger backed by a JSON file
#[derive(Debug)]
pub struct TimeLedger {
    path: PathBuf,

    /// Serializes every access to the file
    lock: Mutex<()>,
}

impl TimeLedger {
    /// Create a ledger handle for `path`
    ///
    /// Nothing is touched on disk until the first operation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Path of the ledger file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the ledger, creating it first if it does not exist
    ///
    /// A new ledger is seeded with one unplayed record per title. An existing
    /// ledger is returned as-is, even if some titles are missing from it.
    ///
    /// # Errors
    ///
    /// `StorageUnavailable` if the directory or file cannot be created or read,
    /// or if the existing file is malformed. A malformed ledger is never
    /// reinitialized, to avoid erasing history.
    pub fn load_or_init(&self, titles: &[Title]) -> Result<BTreeMap<String, TimeRecord>> {
        let _guard = self.lock();

        let document = match self.read_document()? {
            Some(document) => document,
            None => {
                let document: LedgerDocument = titles
                    .iter()
                    .map(|t| (t.id.clone(), LedgerEntry::unplayed(Some(t.name.clone()))))
                    .collect();
                self.write_document(&document)?;
                info!(
                    "Created playtime ledger at {} with {} titles",
                    self.path.display(),
                    document.len()
                );
                // Re-read so the caller sees exactly what was persisted
                self.read_document()?.ok_or_else(|| {
                    IntegrationError::storage(&self.path, "ledger vanished after creation")
                })?
            }
        };

        Ok(to_records(&document))
    }

    /// Add `delta_seconds` to a title's total and stamp `played_at`
    ///
    /// Titles without an entry start from zero. Returns the updated record.
    pub fn increment(
        &self,
        title_id: &str,
        delta_seconds: u64,
        played_at: Timestamp,
    ) -> Result<TimeRecord> {
        let _guard = self.lock();

        let mut document = self.read_document()?.unwrap_or_default();
        let entry = document
            .entry(title_id.to_string())
            .or_insert_with(|| LedgerEntry::unplayed(None));
        entry.time_played = entry.time_played.saturating_add(delta_seconds);
        entry.last_time_played = Some(played_at);
        let record = entry.to_record(title_id);

        self.write_document(&document)?;
        debug!(
            "Ledger: {} += {}s (total {}s)",
            title_id, delta_seconds, record.total_seconds
        );

        Ok(record)
    }

    /// Read every record
    ///
    /// A missing file yields an empty map; the file is never created here.
    pub fn read_all(&self) -> Result<BTreeMap<String, TimeRecord>> {
        let _guard = self.lock();
        Ok(self
            .read_document()?
            .map(|document| to_records(&document))
            .unwrap_or_default())
    }

    /// Add unplayed records for titles missing from the ledger
    ///
    /// Creates the ledger if needed. The file is only rewritten when at least
    /// one record was added. Returns the number of records added.
    pub fn register_titles(&self, titles: &[Title]) -> Result<usize> {
        let _guard = self.lock();

        let mut document = self.read_document()?.unwrap_or_default();
        let mut added = 0;
        for title in titles {
            if !document.contains_key(&title.id) {
                document.insert(
                    title.id.clone(),
                    LedgerEntry::unplayed(Some(title.name.clone())),
                );
                added += 1;
            }
        }

        if added > 0 || !self.path.exists() {
            self.write_document(&document)?;
            debug!("Ledger: registered {} new titles", added);
        }

        Ok(added)
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // Guards the file only; no in-memory state to poison
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_document(&self) -> Result<Option<LedgerDocument>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IntegrationError::storage(&self.path, e)),
        };

        serde_json::from_str(&contents).map(Some).map_err(|e| {
            IntegrationError::storage(&self.path, format!("malformed ledger: {}", e))
        })
    }

    fn write_document(&self, document: &LedgerDocument) -> Result<()> {
        let storage_err = |e: io::Error| IntegrationError::storage(&self.path, e);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(storage_err)?;
            }
        }

        let bytes =
            encode_document(document).map_err(|e| IntegrationError::storage(&self.path, e))?;

        let tmp_path = self.tmp_path()?;
        {
            let mut file = fs::File::create(&tmp_path).map_err(storage_err)?;
            file.write_all(&bytes).map_err(storage_err)?;
            file.sync_all().map_err(storage_err)?;
        }

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(storage_err(e));
        }
        Ok(())
    }

    fn tmp_path(&self) -> Result<PathBuf> {
        match self.path.file_name() {
            Some(name) => {
                let mut tmp_name = OsString::from(name);
                tmp_name.push(".tmp");
                Ok(self.path.with_file_name(tmp_name))
            }
            None => Err(IntegrationError::storage(
                &self.path,
                "ledger path has no file name",
            )),
        }
    }
}

/// Pretty-print with four-space indentation
fn encode_document(document: &LedgerDocument) -> serde_json::Result<Vec<u8>> {
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    document.serialize(&mut serializer)?;
    Ok(out)
}

fn to_records(document: &LedgerDocument) -> BTreeMap<String, TimeRecord> {
    document
        .iter()
        .map(|(id, entry)| (id.clone(), entry.to_record(id)))
        .collect()
}
