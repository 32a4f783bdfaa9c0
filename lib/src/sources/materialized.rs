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

//! Handle to a materialized (live, scheduled) source.

use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::channels::{ComponentStatus, PollLoopState};
use crate::managers::log_component_stop;
use crate::runtime::Supervisor;

/// Counters updated by a running poll loop.
#[derive(Debug, Default)]
pub(crate) struct PollLoopMetrics {
    pub polls: AtomicU64,
    pub empty_polls: AtomicU64,
    pub poll_failures: AtomicU64,
    pub batches_forwarded: AtomicU64,
    pub records_forwarded: AtomicU64,
    pub records_discarded: AtomicU64,
}

impl PollLoopMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PollLoopStats {
        PollLoopStats {
            polls: self.polls.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            poll_failures: self.poll_failures.load(Ordering::Relaxed),
            batches_forwarded: self.batches_forwarded.load(Ordering::Relaxed),
            records_forwarded: self.records_forwarded.load(Ordering::Relaxed),
            records_discarded: self.records_discarded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a poll loop's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollLoopStats {
    /// `poll()` calls issued, including failed ones
    pub polls: u64,
    /// Polls that resolved to an empty batch
    pub empty_polls: u64,
    /// Polls that resolved to an error
    pub poll_failures: u64,
    /// Non-empty batches forwarded in full
    pub batches_forwarded: u64,
    /// Records delivered downstream
    pub records_forwarded: u64,
    /// Records polled after a stop request and dropped instead of forwarded
    pub records_discarded: u64,
}

/// Opaque handle to a materialized source.
///
/// Returned by [`Source::materialize`](crate::Source::materialize). Clones
/// share the same poll loop. The runtime keeps one clone in its registry
/// until the loop stops, so dropping handles does not stop the loop; use
/// [`stop`](Materialized::stop) or the runtime's `stop_entity` / `shutdown`.
#[derive(Clone)]
pub struct Materialized {
    inner: Arc<MaterializedInner>,
}

struct MaterializedInner {
    id: String,
    interval: Duration,
    shutdown_timeout: Duration,
    state_tx: Arc<watch::Sender<PollLoopState>>,
    shutdown_tx: watch::Sender<bool>,
    metrics: Arc<PollLoopMetrics>,
    task_handle: Mutex<Option<JoinHandle<()>>>,
    supervisor: Supervisor,
}

impl std::fmt::Debug for Materialized {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Materialized")
            .field("id", &self.inner.id)
            .field("interval", &self.inner.interval)
            .field("state", &self.state())
            .finish()
    }
}

impl Materialized {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: String,
        interval: Duration,
        shutdown_timeout: Duration,
        state_tx: Arc<watch::Sender<PollLoopState>>,
        shutdown_tx: watch::Sender<bool>,
        metrics: Arc<PollLoopMetrics>,
        task_handle: JoinHandle<()>,
        supervisor: Supervisor,
    ) -> Self {
        Self {
            inner: Arc::new(MaterializedInner {
                id,
                interval,
                shutdown_timeout,
                state_tx,
                shutdown_tx,
                metrics,
                task_handle: Mutex::new(Some(task_handle)),
                supervisor,
            }),
        }
    }

    /// The poll loop's entity id.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    pub fn state(&self) -> PollLoopState {
        *self.inner.state_tx.borrow()
    }

    pub fn is_stopped(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn stats(&self) -> PollLoopStats {
        self.inner.metrics.snapshot()
    }

    /// Whether this handle belongs to the loop publishing on `state_tx`.
    pub(crate) fn is_driven_by(&self, state_tx: &Arc<watch::Sender<PollLoopState>>) -> bool {
        Arc::ptr_eq(&self.inner.state_tx, state_tx)
    }

    /// Receiver that observes every state transition of the loop.
    pub fn subscribe_state(&self) -> watch::Receiver<PollLoopState> {
        self.inner.state_tx.subscribe()
    }

    /// Wait until the loop reaches `Stopped`. Returns `false` on timeout.
    pub async fn wait_for_stop(&self, timeout: Duration) -> bool {
        let mut rx = self.inner.state_tx.subscribe();
        let result =
            tokio::time::timeout(timeout, rx.wait_for(|state| state.is_terminal())).await;
        matches!(result, Ok(Ok(_)))
    }

    /// Stop the poll loop.
    ///
    /// Safe to call from any task, any number of times. A poll that is in
    /// flight when the stop is requested is allowed to finish, but its batch is
    /// discarded. A batch that already started forwarding is forwarded in full.
    /// If the loop does not finish within the shutdown timeout it is aborted.
    pub async fn stop(&self) {
        let handle = self.inner.task_handle.lock().await.take();
        let Some(mut handle) = handle else {
            // Another caller is already stopping the loop
            self.wait_for_stop(self.inner.shutdown_timeout).await;
            return;
        };

        if self.is_stopped() {
            // The loop ended on its own; reap the finished task
            let _ = handle.await;
            return;
        }

        log_component_stop("PollLoop", &self.inner.id);
        self.inner.supervisor.report(
            &self.inner.id,
            ComponentStatus::Stopping,
            Some("Stop requested".to_string()),
        );
        self.inner.shutdown_tx.send_replace(true);

        match tokio::time::timeout(self.inner.shutdown_timeout, &mut handle).await {
            Ok(Ok(())) => {
                info!("Poll loop '{}' task completed successfully", self.inner.id);
            }
            Ok(Err(e)) => {
                error!("Poll loop '{}' task panicked: {}", self.inner.id, e);
            }
            Err(_) => {
                error!(
                    "Poll loop '{}' task did not complete within {:?}, aborting",
                    self.inner.id, self.inner.shutdown_timeout
                );
                handle.abort();
                let _ = handle.await;
            }
        }

        if !self.is_stopped() {
            // Aborted or panicked before reporting its own end
            self.inner.state_tx.send_replace(PollLoopState::Stopped);
            self.inner.supervisor.report(
                &self.inner.id,
                ComponentStatus::Stopped,
                Some("Poll loop aborted".to_string()),
            );
        }
    }
}
