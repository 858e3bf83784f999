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

//! PCSX2 game-library integration
//!
//! This library lets a game-library host track which PlayStation 2 titles are
//! installed, launch PCSX2 with per-title configuration, and accumulate
//! playtime across sessions in a persistent ledger.
//!
//! # Example
//!
//! ```
//! use ps2_integration::core::models::{LocalGameState, LocalGameStatus};
//! use ps2_integration::core::reconciler::diff;
//!
//! let previous = vec![LocalGameStatus::new("1", LocalGameState::Installed)];
//! let current = vec![
//!     LocalGameStatus::new("1", LocalGameState::Installed),
//!     LocalGameStatus::new("2", LocalGameState::Installed),
//! ];
//!
//! assert_eq!(diff(&previous, &current), vec![current[1].clone()]);
//! ```

pub mod core;
