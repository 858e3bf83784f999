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

/// Integration error types
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for integration operations
pub type Result<T> = std::result::Result<T, IntegrationError>;

/// Main error type for the integration
#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("Playtime ledger unavailable at {}: {reason}", path.display())]
    StorageUnavailable { path: PathBuf, reason: String },

    #[error("A session is already running for title {title_id}")]
    SessionAlreadyActive { title_id: String },

    #[error("Failed to spawn {}: {source}", program.display())]
    ProcessSpawnFailed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Game catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Unknown title: {0}")]
    UnknownTitle(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntegrationError {
    /// Build a `StorageUnavailable` error for the ledger at `path`
    pub fn storage(path: &Path, reason: impl ToString) -> Self {
        IntegrationError::StorageUnavailable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error concerns the persisted playtime ledger
    pub fn is_storage(&self) -> bool {
        matches!(self, IntegrationError::StorageUnavailable { .. })
    }
}

impl From<toml::de::Error> for IntegrationError {
    fn from(err: toml::de::Error) -> Self {
        IntegrationError::Config(err.to_string())
    }
}
