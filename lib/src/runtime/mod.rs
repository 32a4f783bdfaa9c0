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

//! Materialization registry.
//!
//! `PipelineRuntime` is where passive sources become live poll loops. It
//! provides the four operations a poll loop needs from its environment:
//!
//! - create and supervise a named entity ([`PipelineRuntime::materialize_with`])
//! - register a recurring timer (owned by the spawned poll loop task)
//! - deliver records downstream ([`RecordDispatcher`](crate::channels::RecordDispatcher))
//! - tear down an entity ([`PipelineRuntime::stop_entity`], [`PipelineRuntime::shutdown`])

mod supervisor;

pub use supervisor::{SupervisionDirective, Supervisor};

use log::{debug, info};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tracing::Instrument;

use crate::channels::{
    create_dispatcher, ComponentEventSender, ComponentStatus, Downstream, PollLoopState,
};
use crate::config::PipesConfig;
use crate::error::{PipesError, Result};
use crate::sources::materialized::PollLoopMetrics;
use crate::sources::poll_loop::PollLoop;
use crate::sources::{Materialized, PollLoopParams, Source};

/// Creates, tracks and tears down poll loops.
///
/// # Example
///
/// ```no_run
/// use drasi_pipes::{CollectionSource, PipelineRuntime, PipesConfig, Source};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (event_tx, _event_rx) = tokio::sync::mpsc::channel(100);
/// let runtime = PipelineRuntime::new(PipesConfig::default(), event_tx)?;
///
/// let downstream = runtime.create_downstream::<u32>();
/// let mut receiver = downstream.create_receiver().await?;
///
/// let source = Arc::new(CollectionSource::from_array([1, 2, 3]));
/// let handle = source.materialize(&runtime, downstream).await?;
///
/// let first = receiver.recv().await?;
/// assert_eq!(*first.value(), 1);
///
/// handle.stop().await;
/// # Ok(())
/// # }
/// ```
pub struct PipelineRuntime {
    config: PipesConfig,
    supervisor: Supervisor,
    entities: Arc<RwLock<HashMap<String, Materialized>>>,
    shut_down: AtomicBool,
}

impl PipelineRuntime {
    /// Create a runtime that reports supervision events on `event_tx`.
    pub fn new(config: PipesConfig, event_tx: ComponentEventSender) -> Result<Self> {
        Self::build(config, Some(event_tx))
    }

    /// Create a runtime without a supervision channel. Failures are only logged.
    pub fn standalone(config: PipesConfig) -> Result<Self> {
        Self::build(config, None)
    }

    fn build(config: PipesConfig, event_tx: Option<ComponentEventSender>) -> Result<Self> {
        config.validate()?;
        let supervisor = Supervisor::new(event_tx, config.failure_policy);
        Ok(Self {
            config,
            supervisor,
            entities: Arc::new(RwLock::new(HashMap::new())),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &PipesConfig {
        &self.config
    }

    /// Interval used by sources materialized without an explicit one.
    pub fn default_poll_interval(&self) -> Duration {
        self.config.default_poll_interval()
    }

    /// A dispatcher using the runtime's configured mode and capacity.
    pub fn create_downstream<T>(&self) -> Downstream<T>
    where
        T: Send + Sync + 'static,
    {
        create_dispatcher(self.config.dispatch_mode, self.config.dispatch_buffer_capacity)
    }

    /// Materialize `source` through its own [`Source::materialize`].
    pub async fn materialize<T, S>(
        &self,
        source: Arc<S>,
        downstream: Downstream<T>,
    ) -> Result<Materialized>
    where
        T: Send + Sync + 'static,
        S: Source<T> + ?Sized + 'static,
    {
        source.materialize(self, downstream).await
    }

    /// Spawn a poll loop for `source` with the given interval and defaults for
    /// everything else.
    pub async fn spawn_poll_loop<T>(
        &self,
        source: Arc<dyn Source<T>>,
        interval: Duration,
        downstream: Downstream<T>,
    ) -> Result<Materialized>
    where
        T: Send + Sync + 'static,
    {
        let params = PollLoopParams::new().with_interval(interval);
        self.materialize_with(source, params, downstream).await
    }

    /// Spawn a poll loop for `source` and register it under its entity id.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if the runtime was shut down
    /// - `InvalidConfig` if `params` are invalid
    /// - `AlreadyExists` if an entity with the same id is registered
    pub async fn materialize_with<T>(
        &self,
        source: Arc<dyn Source<T>>,
        params: PollLoopParams,
        downstream: Downstream<T>,
    ) -> Result<Materialized>
    where
        T: Send + Sync + 'static,
    {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(PipesError::invalid_state(format!(
                "runtime '{}' has been shut down",
                self.config.id
            )));
        }
        params.validate()?;

        let id = params
            .id
            .clone()
            .unwrap_or_else(|| format!("source-{}", uuid::Uuid::new_v4()));
        let interval = params.interval.unwrap_or_else(|| self.default_poll_interval());
        let shutdown_timeout = params
            .shutdown_timeout
            .unwrap_or_else(|| self.config.shutdown_timeout());
        let supervisor = match params.failure_policy {
            Some(policy) => self.supervisor.with_policy(policy),
            None => self.supervisor.clone(),
        };

        let mut entities = self.entities.write().await;
        // Loops aborted by `stop()` never got to remove themselves
        entities.retain(|_, handle| !handle.is_stopped());
        if entities.contains_key(&id) {
            return Err(PipesError::already_exists(id));
        }

        info!(
            "Runtime '{}' materializing source as poll loop '{}' (interval: {:?})",
            self.config.id, id, interval
        );
        supervisor.report(
            &id,
            ComponentStatus::Starting,
            Some("Materializing source".to_string()),
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let state_tx = Arc::new(watch::channel(PollLoopState::Created).0);
        let metrics = Arc::new(PollLoopMetrics::default());

        let poll_loop = PollLoop {
            id: id.clone(),
            source,
            interval,
            downstream,
            max_consecutive_empty_polls: params.max_consecutive_empty_polls,
            supervisor: supervisor.clone(),
            state_tx: state_tx.clone(),
            metrics: metrics.clone(),
        };

        let span = tracing::info_span!(
            "poll_loop",
            runtime_id = %self.config.id,
            component_id = %id,
            component_type = "source"
        );
        let registry = Arc::downgrade(&self.entities);
        let entity_id = id.clone();
        let loop_state = state_tx.clone();
        let task = tokio::spawn(
            async move {
                poll_loop.run(shutdown_rx).await;
                deregister(&registry, &entity_id, &loop_state).await;
            }
            .instrument(span),
        );

        let materialized = Materialized::new(
            id.clone(),
            interval,
            shutdown_timeout,
            state_tx,
            shutdown_tx,
            metrics,
            task,
            supervisor,
        );
        entities.insert(id, materialized.clone());

        Ok(materialized)
    }

    /// Look up a live poll loop.
    pub async fn get_entity(&self, id: &str) -> Result<Materialized> {
        self.entities
            .read()
            .await
            .get(id)
            .filter(|handle| !handle.is_stopped())
            .cloned()
            .ok_or_else(|| PipesError::entity_not_found(id))
    }

    pub async fn entity_state(&self, id: &str) -> Result<PollLoopState> {
        Ok(self.get_entity(id).await?.state())
    }

    /// Ids and states of all live poll loops, sorted by id.
    pub async fn list_entities(&self) -> Vec<(String, PollLoopState)> {
        let mut entities: Vec<_> = self
            .entities
            .read()
            .await
            .iter()
            .filter(|(_, handle)| !handle.is_stopped())
            .map(|(id, handle)| (id.clone(), handle.state()))
            .collect();
        entities.sort_by(|a, b| a.0.cmp(&b.0));
        entities
    }

    /// Stop a poll loop and remove it from the registry.
    pub async fn stop_entity(&self, id: &str) -> Result<()> {
        let handle = self
            .entities
            .write()
            .await
            .remove(id)
            .ok_or_else(|| PipesError::entity_not_found(id))?;
        handle.stop().await;
        Ok(())
    }

    /// Stop every poll loop and refuse further materializations.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        let handles: Vec<Materialized> = self
            .entities
            .write()
            .await
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        info!(
            "Shutting down runtime '{}' ({} poll loops)",
            self.config.id,
            handles.len()
        );
        for handle in handles {
            handle.stop().await;
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

/// Remove the registry entry of a finished loop, unless the id has already
/// been taken over by a newer loop.
async fn deregister(
    registry: &Weak<RwLock<HashMap<String, Materialized>>>,
    id: &str,
    state_tx: &Arc<watch::Sender<PollLoopState>>,
) {
    let Some(registry) = registry.upgrade() else {
        return;
    };
    let mut entities = registry.write().await;
    if entities
        .get(id)
        .is_some_and(|handle| handle.is_driven_by(state_tx))
    {
        entities.remove(id);
        debug!("Poll loop '{id}' removed from registry");
    }
}
