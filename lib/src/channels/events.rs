// Copyright 2025 The Drasi Authors.
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

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// Supervision status of a materialized source
///
/// `ComponentStatus` is what the runtime's supervision channel reports about a
/// poll loop entity. It is coarser than [`PollLoopState`]: the loop flips
/// between `Polling` and `Idle` on every tick, but only reports `Running` once.
///
/// ```text
/// Starting → Running → Stopping → Stopped
///               ↓  ↑
///              Error
/// ```
///
/// `Error` is reported for every failed poll or rejected delivery. Whether the
/// loop goes back to `Running` or on to `Stopped` afterwards is decided by the
/// runtime's [`FailurePolicy`](crate::config::FailurePolicy).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ComponentStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

/// Lifecycle state of a poll loop entity.
///
/// ```text
/// Created → Scheduled → (Polling ⇄ Idle) → Stopped
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PollLoopState {
    /// Source bound, task not spawned yet
    Created,
    /// Task spawned and timer registered, first tick pending
    Scheduled,
    /// A `poll()` call is in flight or its batch is being forwarded
    Polling,
    /// Waiting for the next tick
    Idle,
    /// Terminal; no further polls happen
    Stopped,
}

impl PollLoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PollLoopState::Stopped)
    }
}

impl fmt::Display for PollLoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollLoopState::Created => write!(f, "created"),
            PollLoopState::Scheduled => write!(f, "scheduled"),
            PollLoopState::Polling => write!(f, "polling"),
            PollLoopState::Idle => write!(f, "idle"),
            PollLoopState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Supervision event emitted by a poll loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentEvent {
    pub component_id: String,
    pub status: ComponentStatus,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub message: Option<String>,
}

impl ComponentEvent {
    pub fn new(
        component_id: impl Into<String>,
        status: ComponentStatus,
        message: Option<String>,
    ) -> Self {
        Self {
            component_id: component_id.into(),
            status,
            timestamp: chrono::Utc::now(),
            message,
        }
    }
}

pub type ComponentEventReceiver = mpsc::Receiver<ComponentEvent>;
pub type ComponentEventSender = mpsc::Sender<ComponentEvent>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_loop_state_display() {
        assert_eq!(PollLoopState::Created.to_string(), "created");
        assert_eq!(PollLoopState::Polling.to_string(), "polling");
        assert_eq!(PollLoopState::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_only_stopped_is_terminal() {
        assert!(PollLoopState::Stopped.is_terminal());
        for state in [
            PollLoopState::Created,
            PollLoopState::Scheduled,
            PollLoopState::Polling,
            PollLoopState::Idle,
        ] {
            assert!(!state.is_terminal());
        }
    }

    #[test]
    fn test_component_event_serialization() {
        let event = ComponentEvent::new(
            "orders",
            ComponentStatus::Error,
            Some("poll failed".to_string()),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["component_id"], "orders");
        assert_eq!(json["status"], "Error");
        assert_eq!(json["message"], "poll failed");
    }
}
