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

//! Host notifications

use super::models::{LocalGameStatus, TimeRecord};
use log::debug;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Receiver of fire-and-forget notifications for the host
///
/// Called from worker threads. Calls made within one tick keep catalog order.
pub trait NotificationSink: Send + Sync {
    fn notify_local_state_change(&self, status: LocalGameStatus);

    fn notify_time_update(&self, record: TimeRecord);
}

/// A notification queued for the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    LocalStateChanged(LocalGameStatus),
    TimeUpdated(TimeRecord),
}

/// Sink that queues notifications for the host's control thread
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<Notification>,
}

impl ChannelSink {
    /// Create a sink and the receiver the host drains
    pub fn new() -> (Self, UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("Notification dropped: host receiver closed");
        }
    }
}

impl NotificationSink for ChannelSink {
    fn notify_local_state_change(&self, status: LocalGameStatus) {
        self.send(Notification::LocalStateChanged(status));
    }

    fn notify_time_update(&self, record: TimeRecord) {
        self.send(Notification::TimeUpdated(record));
    }
}
