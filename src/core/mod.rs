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

//! Integration components
//!
//! This module contains the pieces behind the host-facing surface:
//! - Playtime ledger (persistent per-title counters)
//! - Session monitor (emulator process lifecycle)
//! - Local state reconciler (installed-title diffs)
//! - Poll driver (periodic tick)
//! - Catalog, launcher and configuration collaborators

pub mod catalog;
pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod integration;
pub mod launcher;
pub mod ledger;
pub mod models;
pub mod notify;
pub mod reconciler;
pub mod session;

// Re-export commonly used types
pub use config::Settings;
pub use driver::PollDriver;
pub use error::{IntegrationError, Result};
pub use integration::Integration;
pub use ledger::TimeLedger;
pub use session::SessionMonitor;
