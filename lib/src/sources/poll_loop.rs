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

//! The poll loop: the scheduled entity that drains a source.
//!
//! A poll loop owns one source, a timer and a downstream dispatcher. It moves
//! through the states
//!
//! ```text
//! Created → Scheduled → (Polling ⇄ Idle) → Stopped
//! ```
//!
//! On every tick it calls `poll()`, awaits the result and forwards each record
//! of a non-empty batch, in order, before going idle again. `poll()` is awaited
//! inline, so there is never more than one call in flight; ticks that fire
//! while a poll or a delivery is still running are skipped, not queued. A
//! `poll()` that panics is handled like one that returned an error.

use futures::FutureExt;
use log::{debug, info};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::channels::{ComponentStatus, Downstream, PollLoopState};
use crate::config::FailurePolicy;
use crate::error::{PipesError, Result};
use crate::managers::log_component_start;
use crate::record::Batch;
use crate::runtime::{SupervisionDirective, Supervisor};
use crate::sources::materialized::PollLoopMetrics;
use crate::sources::Source;

/// Parameters for materializing a source with non-default settings.
///
/// Every field is optional; unset fields fall back to the runtime's
/// [`PipesConfig`](crate::config::PipesConfig).
///
/// # Example
///
/// ```ignore
/// let params = PollLoopParams::new()
///     .with_id("orders")
///     .with_interval(Duration::from_millis(250))
///     .with_failure_policy(FailurePolicy::Stop)
///     .with_max_consecutive_empty_polls(3);
///
/// let handle = runtime.materialize_with(source, params, downstream).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollLoopParams {
    /// Entity id; a unique `source-<uuid>` id is generated when unset
    pub id: Option<String>,
    /// Poll interval
    pub interval: Option<Duration>,
    /// What to do after a failed poll
    pub failure_policy: Option<FailurePolicy>,
    /// Stop after this many empty polls in a row
    pub max_consecutive_empty_polls: Option<u32>,
    /// Grace period for `stop()` before the task is aborted
    pub shutdown_timeout: Option<Duration>,
}

impl PollLoopParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = Some(policy);
        self
    }

    /// Treat the source as exhausted after `count` empty polls in a row.
    ///
    /// An empty batch is not an exhaustion signal by itself, so the loop keeps
    /// polling forever unless this is set.
    pub fn with_max_consecutive_empty_polls(mut self, count: u32) -> Self {
        self.max_consecutive_empty_polls = Some(count);
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(PipesError::invalid_config("poll loop id cannot be empty"));
            }
        }
        if self.interval == Some(Duration::ZERO) {
            return Err(PipesError::invalid_config("poll interval cannot be 0"));
        }
        if self.shutdown_timeout == Some(Duration::ZERO) {
            return Err(PipesError::invalid_config("shutdown timeout cannot be 0"));
        }
        if self.max_consecutive_empty_polls == Some(0) {
            return Err(PipesError::invalid_config(
                "max_consecutive_empty_polls must be at least 1",
            ));
        }
        Ok(())
    }
}

enum StopReason {
    Requested,
    Exhausted(u32),
    PollFailed,
    DispatchFailed,
}

impl StopReason {
    fn message(&self) -> String {
        match self {
            StopReason::Requested => "Poll loop stopped".to_string(),
            StopReason::Exhausted(n) => {
                format!("Poll loop stopped after {n} consecutive empty polls")
            }
            StopReason::PollFailed => "Poll loop stopped after a poll failure".to_string(),
            StopReason::DispatchFailed => {
                "Poll loop stopped after downstream delivery failed".to_string()
            }
        }
    }
}

pub(crate) struct PollLoop<T>
where
    T: Send + Sync + 'static,
{
    pub id: String,
    pub source: Arc<dyn Source<T>>,
    pub interval: Duration,
    pub downstream: Downstream<T>,
    pub max_consecutive_empty_polls: Option<u32>,
    pub supervisor: Supervisor,
    pub state_tx: Arc<watch::Sender<PollLoopState>>,
    pub metrics: Arc<PollLoopMetrics>,
}

impl<T> PollLoop<T>
where
    T: Send + Sync + 'static,
{
    fn set_state(&self, state: PollLoopState) {
        self.state_tx.send_replace(state);
    }

    /// Drive the loop until a stop is requested or a stop condition is hit.
    ///
    /// The loop also ends when the shutdown sender is dropped.
    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        log_component_start("PollLoop", &self.id);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.set_state(PollLoopState::Scheduled);
        self.supervisor.report(
            &self.id,
            ComponentStatus::Running,
            Some(format!("Polling every {:?}", self.interval)),
        );

        let mut consecutive_empty = 0u32;

        let reason = loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => break StopReason::Requested,

                _ = ticker.tick() => {}
            }

            self.set_state(PollLoopState::Polling);
            PollLoopMetrics::incr(&self.metrics.polls);
            let result = match AssertUnwindSafe(self.source.poll()).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(anyhow::anyhow!(
                    "poll panicked: {}",
                    panic_message(payload.as_ref())
                )),
            };

            let stopping = *shutdown_rx.borrow();
            if stopping {
                if let Ok(batch) = &result {
                    if !batch.is_empty() {
                        debug!(
                            "[{}] Discarding batch of {} records polled during shutdown",
                            self.id,
                            batch.len()
                        );
                        PollLoopMetrics::add(&self.metrics.records_discarded, batch.len());
                    }
                }
                break StopReason::Requested;
            }

            match result {
                Ok(batch) if batch.is_empty() => {
                    PollLoopMetrics::incr(&self.metrics.empty_polls);
                    consecutive_empty += 1;
                    if let Some(max) = self.max_consecutive_empty_polls {
                        if consecutive_empty >= max {
                            break StopReason::Exhausted(consecutive_empty);
                        }
                    }
                }
                Ok(batch) => {
                    consecutive_empty = 0;
                    if let Err(e) = self.forward(batch).await {
                        self.supervisor.handle_dispatch_failure(&self.id, &e);
                        break StopReason::DispatchFailed;
                    }
                }
                Err(e) => {
                    PollLoopMetrics::incr(&self.metrics.poll_failures);
                    let error = PipesError::poll_failed(&self.id, format!("{e:#}"));
                    match self.supervisor.handle_poll_failure(&self.id, &error) {
                        SupervisionDirective::Resume => {}
                        SupervisionDirective::Stop => break StopReason::PollFailed,
                    }
                }
            }

            self.set_state(PollLoopState::Idle);
        };

        self.set_state(PollLoopState::Stopped);
        info!("[{}] {}", self.id, reason.message());
        self.supervisor
            .report(&self.id, ComponentStatus::Stopped, Some(reason.message()));
    }

    /// Forward every record of `batch` in order.
    async fn forward(&self, batch: Batch<T>) -> Result<()> {
        let count = batch.len();
        for record in batch {
            self.downstream
                .dispatch_record(Arc::new(record))
                .await
                .map_err(|e| PipesError::dispatch_failed(&self.id, e.to_string()))?;
            PollLoopMetrics::incr(&self.metrics.records_forwarded);
        }
        PollLoopMetrics::incr(&self.metrics.batches_forwarded);
        debug!("[{}] Forwarded batch of {count} records", self.id);
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_default_to_unset() {
        let params = PollLoopParams::new();
        assert_eq!(params.id, None);
        assert_eq!(params.interval, None);
        assert_eq!(params.failure_policy, None);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_builder() {
        let params = PollLoopParams::new()
            .with_id("orders")
            .with_interval(Duration::from_millis(20))
            .with_failure_policy(FailurePolicy::Stop)
            .with_max_consecutive_empty_polls(2)
            .with_shutdown_timeout(Duration::from_secs(1));

        assert_eq!(params.id.as_deref(), Some("orders"));
        assert_eq!(params.interval, Some(Duration::from_millis(20)));
        assert_eq!(params.failure_policy, Some(FailurePolicy::Stop));
        assert_eq!(params.max_consecutive_empty_polls, Some(2));
        assert_eq!(params.shutdown_timeout, Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_params_validation() {
        assert!(PollLoopParams::new()
            .with_interval(Duration::ZERO)
            .validate()
            .is_err());
        assert!(PollLoopParams::new().with_id("").validate().is_err());
        assert!(PollLoopParams::new()
            .with_max_consecutive_empty_polls(0)
            .validate()
            .is_err());
        assert!(PollLoopParams::new()
            .with_shutdown_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_panic_message_extracts_payload() {
        let static_payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(static_payload.as_ref()), "static message");

        let owned_payload: Box<dyn Any + Send> = Box::new(format!("owned {}", 1));
        assert_eq!(panic_message(owned_payload.as_ref()), "owned 1");

        let other_payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(other_payload.as_ref()), "unknown panic payload");
    }
}
