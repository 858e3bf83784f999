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

//! Emulator session monitor
//!
//! Tracks at most one running emulator process and detects its exit by
//! polling. The process-launch primitive only offers a point-in-time liveness
//! query, so exit is noticed on the first `check()` after it happens.
//!
//! # State Machine
//!
//! ```text
//! Idle --start()--> Running --check() sees exit--> Idle
//! ```

use super::error::{IntegrationError, Result};
use super::models::Timestamp;
use log::{debug, info};
use std::io;
use std::process::Child;

/// Exit information reported by a finished process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit {
    /// Exit code, `None` if terminated by a signal
    pub code: Option<i32>,
}

/// Point-in-time liveness query for a launched process
///
/// Implementations must not block.
pub trait ProcessHandle: Send {
    /// `Ok(None)` while running, `Ok(Some(_))` once exited
    fn poll(&mut self) -> io::Result<Option<ProcessExit>>;
}

impl ProcessHandle for Child {
    fn poll(&mut self) -> io::Result<Option<ProcessExit>> {
        Ok(self.try_wait()?.map(|status| ProcessExit {
            code: status.code(),
        }))
    }
}

/// Outcome of a finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionResult {
    pub title_id: String,

    /// Session length in seconds
    pub duration: u64,

    /// Time the exit was observed
    pub end_time: Timestamp,
}

/// A running emulator process for one title
struct PlaySession {
    title_id: String,
    start_time: Timestamp,
    process: Box<dyn ProcessHandle>,
}

/// Session monitor
///
/// Holds the single live session, if any.
#[derive(Default)]
pub struct SessionMonitor {
    active: Option<PlaySession>,
}

impl SessionMonitor {
    pub fn new() -> Self {
        Self { active: None }
    }

    /// Whether a session is running
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Title of the running session
    pub fn running_title(&self) -> Option<&str> {
        self.active.as_ref().map(|s| s.title_id.as_str())
    }

    /// Begin tracking a launched process
    ///
    /// # Errors
    ///
    /// `SessionAlreadyActive` if a session is already running. The existing
    /// session is left untouched.
    pub fn start(
        &mut self,
        title_id: &str,
        process: Box<dyn ProcessHandle>,
        start_time: Timestamp,
    ) -> Result<()> {
        if let Some(current) = &self.active {
            return Err(IntegrationError::SessionAlreadyActive {
                title_id: current.title_id.clone(),
            });
        }

        info!("Session started: {} at {}", title_id, start_time);
        self.active = Some(PlaySession {
            title_id: title_id.to_string(),
            start_time,
            process,
        });
        Ok(())
    }

    /// Poll the running process
    ///
    /// Returns the finished session once the process has exited, closing it.
    /// Returns `None` while the process runs or when idle. A process handle
    /// that can no longer be queried closes the session without a result.
    pub fn check(&mut self, now: Timestamp) -> Option<SessionResult> {
        let session = self.active.as_mut()?;

        match session.process.poll() {
            Ok(None) => None,
            Ok(Some(exit)) => {
                let session = self.active.take()?;
                let duration = now.saturating_sub(session.start_time).max(0) as u64;
                info!(
                    "Session ended: {} after {}s (exit code {:?})",
                    session.title_id, duration, exit.code
                );
                Some(SessionResult {
                    title_id: session.title_id,
                    duration,
                    end_time: now,
                })
            }
            Err(e) => {
                debug!(
                    "Dropping session for {}: process handle unusable: {}",
                    session.title_id, e
                );
                self.active = None;
                None
            }
        }
    }
}
