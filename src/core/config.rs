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

//! User configuration
//!
//! Settings are read from a TOML file:
//!
//! ```text
//! roms_path = "D:/Games/PS2"
//! emu_path = "C:/Program Files/PCSX2/pcsx2.exe"
//! fullscreen = true
//! no_gui = true
//! use_config = true
//! config_root = "C:/Program Files/PCSX2/game_configs"
//! ```
//!
//! # Ledger Location
//!
//! 1. `ledger_path` from the file, if set
//! 2. `$PS2_INTEGRATION_DATA_DIR/game_times.json`
//! 3. `<local data dir>/GOG.com/Galaxy/Configuration/plugins/ps2/game_times.json`

use super::error::{IntegrationError, Result};
use super::launcher::LaunchOptions;
use super::ledger::LEDGER_FILE_NAME;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the ledger's storage directory
pub const DATA_DIR_ENV: &str = "PS2_INTEGRATION_DATA_DIR";

/// Ledger directory relative to the platform local data dir
const DEFAULT_LEDGER_SUBDIR: &str = "GOG.com/Galaxy/Configuration/plugins/ps2";

/// User configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// Directory holding the disc images
    pub roms_path: PathBuf,

    /// PCSX2 executable
    pub emu_path: PathBuf,

    #[serde(default)]
    pub fullscreen: bool,

    #[serde(default)]
    pub no_gui: bool,

    #[serde(default)]
    pub use_config: bool,

    #[serde(default)]
    pub config_root: Option<PathBuf>,

    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            IntegrationError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.emu_path.as_os_str().is_empty() {
            return Err(IntegrationError::Config("emu_path is empty".to_string()));
        }
        if self.use_config && self.config_root.is_none() {
            return Err(IntegrationError::Config(
                "use_config is set but config_root is missing".to_string(),
            ));
        }
        Ok(())
    }

    /// Emulator launch parameters
    pub fn launch_options(&self) -> LaunchOptions {
        LaunchOptions {
            emu_path: self.emu_path.clone(),
            fullscreen: self.fullscreen,
            no_gui: self.no_gui,
            use_config: self.use_config,
            config_root: self.config_root.clone(),
        }
    }

    /// Resolve the ledger file location
    pub fn ledger_path(&self) -> Result<PathBuf> {
        let env_dir = std::env::var_os(DATA_DIR_ENV).map(PathBuf::from);
        resolve_ledger_path(self.ledger_path.as_deref(), env_dir)
    }
}

fn resolve_ledger_path(explicit: Option<&Path>, env_dir: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(dir) = env_dir.filter(|d| !d.as_os_str().is_empty()) {
        return Ok(dir.join(LEDGER_FILE_NAME));
    }

    let dirs = directories::BaseDirs::new().ok_or_else(|| {
        IntegrationError::Config("cannot determine the local data directory".to_string())
    })?;
    Ok(dirs
        .data_local_dir()
        .join(DEFAULT_LEDGER_SUBDIR)
        .join(LEDGER_FILE_NAME))
}
