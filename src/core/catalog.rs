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

//! Game catalog strategies
//!
//! A catalog produces the list of titles the user owns. Lookups may touch the
//! filesystem, so callers run them off the control thread.

use super::error::{IntegrationError, Result};
use super::models::Title;
use log::debug;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Disc image extensions recognized by the directory scan
pub const DISC_EXTENSIONS: &[&str] = &["iso", "bin", "chd", "cso", "gz", "img", "mdf", "nrg"];

/// Source of owned titles
pub trait Catalog: Send + Sync {
    /// Current list of titles
    ///
    /// # Errors
    ///
    /// `CatalogUnavailable` if the backing source cannot be read.
    fn get_titles(&self) -> Result<Vec<Title>>;
}

/// Catalog built from the disc images found directly under a ROM directory
///
/// The title id is the file stem and the display name is the stem with
/// underscores turned into spaces. When several images share a stem, the
/// first path in sorted order wins.
#[derive(Debug, Clone)]
pub struct RomDirectoryCatalog {
    root: PathBuf,
}

impl RomDirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Catalog for RomDirectoryCatalog {
    fn get_titles(&self) -> Result<Vec<Title>> {
        let entries = fs::read_dir(&self.root).map_err(|e| {
            IntegrationError::CatalogUnavailable(format!("{}: {}", self.root.display(), e))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_disc_image(path))
            .collect();
        paths.sort();

        let mut seen = HashSet::new();
        let mut titles = Vec::with_capacity(paths.len());
        for title in paths.into_iter().filter_map(title_from_path) {
            if seen.insert(title.id.clone()) {
                titles.push(title);
            } else {
                debug!(
                    "Catalog: skipping {}, id {} already taken",
                    title.path.display(),
                    title.id
                );
            }
        }
        debug!(
            "Catalog: {} titles under {}",
            titles.len(),
            self.root.display()
        );
        Ok(titles)
    }
}

fn is_disc_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            DISC_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn title_from_path(path: PathBuf) -> Option<Title> {
    let stem = path.file_stem()?.to_str()?.to_string();
    let name = stem.replace('_', " ");
    Some(Title {
        id: stem,
        name,
        path,
    })
}
