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

use tokio::sync::mpsc::error::TrySendError;

use crate::channels::{ComponentEvent, ComponentEventSender, ComponentStatus};
use crate::config::FailurePolicy;
use crate::error::PipesError;
use crate::managers::{log_component_error, log_component_warning};

/// What a poll loop does after reporting a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionDirective {
    /// Stay scheduled and poll again on the next tick
    Resume,
    /// Stop the loop
    Stop,
}

/// Receives lifecycle events and failures from poll loops.
///
/// Every event is logged and, when a supervision channel was supplied to the
/// runtime, sent on it. Sending never waits: if the channel is full the event
/// is dropped with a warning so that a slow monitor cannot stall polling.
#[derive(Clone)]
pub struct Supervisor {
    event_tx: Option<ComponentEventSender>,
    policy: FailurePolicy,
}

impl Supervisor {
    pub fn new(event_tx: Option<ComponentEventSender>, policy: FailurePolicy) -> Self {
        Self { event_tx, policy }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Same channel, different failure policy.
    pub fn with_policy(&self, policy: FailurePolicy) -> Self {
        Self {
            event_tx: self.event_tx.clone(),
            policy,
        }
    }

    /// Send a supervision event for `component_id`.
    pub fn report(&self, component_id: &str, status: ComponentStatus, message: Option<String>) {
        let Some(tx) = &self.event_tx else {
            return;
        };

        let event = ComponentEvent::new(component_id, status, message);
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log_component_warning(
                    "Supervisor",
                    &event.component_id,
                    &format!("event channel full, dropping {:?} event", event.status),
                );
            }
            Err(TrySendError::Closed(_)) => {
                // Nobody is listening anymore
            }
        }
    }

    /// Report a failed poll and decide whether the loop keeps running.
    pub fn handle_poll_failure(
        &self,
        component_id: &str,
        error: &PipesError,
    ) -> SupervisionDirective {
        log_component_error("PollLoop", component_id, &error.to_string());
        self.report(component_id, ComponentStatus::Error, Some(error.to_string()));

        match self.policy {
            FailurePolicy::Resume => {
                self.report(
                    component_id,
                    ComponentStatus::Running,
                    Some("Resuming after poll failure".to_string()),
                );
                SupervisionDirective::Resume
            }
            FailurePolicy::Stop => SupervisionDirective::Stop,
        }
    }

    /// Report a rejected delivery. The loop always stops: the rest of the
    /// batch could not be forwarded.
    pub fn handle_dispatch_failure(&self, component_id: &str, error: &PipesError) {
        log_component_error("PollLoop", component_id, &error.to_string());
        self.report(component_id, ComponentStatus::Error, Some(error.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_report_sends_event() {
        let (tx, mut rx) = mpsc::channel(10);
        let supervisor = Supervisor::new(Some(tx), FailurePolicy::Resume);

        supervisor.report("orders", ComponentStatus::Running, None);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.component_id, "orders");
        assert_eq!(event.status, ComponentStatus::Running);
    }

    #[tokio::test]
    async fn test_report_without_channel_is_noop() {
        let supervisor = Supervisor::new(None, FailurePolicy::Resume);
        supervisor.report("orders", ComponentStatus::Running, None);
    }

    #[tokio::test]
    async fn test_full_channel_drops_event() {
        let (tx, mut rx) = mpsc::channel(1);
        let supervisor = Supervisor::new(Some(tx), FailurePolicy::Resume);

        supervisor.report("orders", ComponentStatus::Starting, None);
        supervisor.report("orders", ComponentStatus::Running, None);

        assert_eq!(rx.recv().await.unwrap().status, ComponentStatus::Starting);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_poll_failure_with_resume_policy() {
        let (tx, mut rx) = mpsc::channel(10);
        let supervisor = Supervisor::new(Some(tx), FailurePolicy::Resume);
        let error = PipesError::poll_failed("orders", "boom");

        let directive = supervisor.handle_poll_failure("orders", &error);
        assert_eq!(directive, SupervisionDirective::Resume);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.status, ComponentStatus::Error);
        assert!(event.message.unwrap().contains("boom"));
        assert_eq!(rx.recv().await.unwrap().status, ComponentStatus::Running);
    }

    #[tokio::test]
    async fn test_poll_failure_with_stop_policy() {
        let (tx, mut rx) = mpsc::channel(10);
        let supervisor =
            Supervisor::new(Some(tx), FailurePolicy::Resume).with_policy(FailurePolicy::Stop);
        let error = PipesError::poll_failed("orders", "boom");

        assert_eq!(
            supervisor.handle_poll_failure("orders", &error),
            SupervisionDirective::Stop
        );
        assert_eq!(rx.recv().await.unwrap().status, ComponentStatus::Error);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_with_policy_keeps_channel() {
        let (tx, mut rx) = mpsc::channel(10);
        let supervisor = Supervisor::new(Some(tx), FailurePolicy::Resume);
        assert_eq!(supervisor.policy(), FailurePolicy::Resume);

        let stopping = supervisor.with_policy(FailurePolicy::Stop);
        assert_eq!(stopping.policy(), FailurePolicy::Stop);
        assert_eq!(supervisor.policy(), FailurePolicy::Resume);

        stopping.report("orders", ComponentStatus::Running, None);
        assert_eq!(rx.try_recv().unwrap().status, ComponentStatus::Running);
    }
}
