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

//! PCSX2 launching
//!
//! Builds the emulator command line for a title and spawns the process.
//!
//! # Command Line
//!
//! ```text
//! pcsx2 [--cfgpath=<config_root>/<rom stem>] [--fullscreen] [--nogui] [--fullboot] <rom>
//! ```
//!
//! - `--cfgpath` is passed when per-game config is enabled and the title's
//!   config directory exists
//! - `--fullboot` is passed when that directory contains `fullboot.ini`

use super::error::{IntegrationError, Result};
use super::models::Title;
use super::session::ProcessHandle;
use log::info;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Marker file requesting a full BIOS boot
pub const FULLBOOT_MARKER: &str = "fullboot.ini";

/// Emulator launch parameters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Path to the PCSX2 executable
    pub emu_path: PathBuf,

    pub fullscreen: bool,

    /// Hide the emulator's own GUI
    pub no_gui: bool,

    /// Use per-title config directories under `config_root`
    pub use_config: bool,

    pub config_root: Option<PathBuf>,
}

impl LaunchOptions {
    /// Per-title config directory, named after the ROM file stem
    pub fn title_config_dir(&self, title: &Title) -> Option<PathBuf> {
        let root = self.config_root.as_ref()?;
        let stem = title.path.file_stem()?;
        Some(root.join(stem))
    }
}

/// Build the emulator arguments for `title`
pub fn build_args(title: &Title, options: &LaunchOptions) -> Vec<OsString> {
    let mut args = Vec::new();
    let config_dir = options.title_config_dir(title);

    if let Some(dir) = &config_dir {
        if options.use_config && dir.is_dir() {
            let mut arg = OsString::from("--cfgpath=");
            arg.push(dir.as_os_str());
            args.push(arg);
        }
    }
    if options.fullscreen {
        args.push(OsString::from("--fullscreen"));
    }
    if options.no_gui {
        args.push(OsString::from("--nogui"));
    }
    if let Some(dir) = &config_dir {
        if dir.join(FULLBOOT_MARKER).exists() {
            args.push(OsString::from("--fullboot"));
        }
    }
    args.push(title.path.clone().into_os_string());

    args
}

/// Spawns external processes
pub trait ProcessSpawner: Send + Sync {
    fn spawn(&self, program: &Path, args: &[OsString]) -> io::Result<Box<dyn ProcessHandle>>;
}

/// Spawner backed by `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSpawner;

impl ProcessSpawner for SystemSpawner {
    fn spawn(&self, program: &Path, args: &[OsString]) -> io::Result<Box<dyn ProcessHandle>> {
        let child = Command::new(program).args(args).spawn()?;
        Ok(Box::new(child))
    }
}

/// Launch PCSX2 for `title`
///
/// # Errors
///
/// `ProcessSpawnFailed` if the emulator cannot be started. No retry is made.
pub fn launch(
    spawner: &dyn ProcessSpawner,
    title: &Title,
    options: &LaunchOptions,
) -> Result<Box<dyn ProcessHandle>> {
    let args = build_args(title, options);
    info!(
        "Launching {} ({}): {} {:?}",
        title.name,
        title.id,
        options.emu_path.display(),
        args
    );

    spawner
        .spawn(&options.emu_path, &args)
        .map_err(|source| IntegrationError::ProcessSpawnFailed {
            program: options.emu_path.clone(),
            source,
        })
}
