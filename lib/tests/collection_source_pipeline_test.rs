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

//! # Source to Downstream Integration Test
//!
//! Validates that records flow from a materialized source through the poll
//! loop into a downstream receiver, using only the public API.
//!
//! ## Test Flow
//! 1. Build a `PipelineRuntime` from a YAML configuration
//! 2. Materialize a `CollectionSource` and a user-defined paging source
//! 3. Collect records from the downstream receivers
//! 4. Validate order, single emission and clean shutdown

use anyhow::Result;
use async_trait::async_trait;
use drasi_pipes::{
    Batch, CollectionSource, ComponentStatus, Downstream, FailurePolicy, Materialized,
    PipelineRuntime, PipesConfig, PollLoopParams, PollLoopState, Record, Source,
};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout, Duration};

const CONFIG_YAML: &str = r#"
id: integration-runtime
default_poll_interval_ms: 10
dispatch_buffer_capacity: 64
dispatch_mode: channel
shutdown_timeout_ms: 1000
failure_policy: resume
"#;

/// Emits a fixed-size page of an upstream sequence per poll until it runs dry.
struct PagingSource {
    upstream: Mutex<std::vec::IntoIter<u64>>,
    page_size: usize,
}

impl PagingSource {
    fn new(upstream: Vec<u64>, page_size: usize) -> Self {
        Self {
            upstream: Mutex::new(upstream.into_iter()),
            page_size,
        }
    }
}

#[async_trait]
impl Source<u64> for PagingSource {
    async fn poll(&self) -> Result<Batch<u64>> {
        let mut upstream = self.upstream.lock().await;
        Ok(upstream.by_ref().take(self.page_size).map(Record::of).collect())
    }

    async fn materialize(
        self: Arc<Self>,
        runtime: &PipelineRuntime,
        downstream: Downstream<u64>,
    ) -> drasi_pipes::Result<Materialized> {
        let params = PollLoopParams::new()
            .with_id("paging-source")
            .with_max_consecutive_empty_polls(3);
        runtime
            .materialize_with::<u64>(self, params, downstream)
            .await
    }
}

#[tokio::test]
async fn test_config_loads_from_yaml() -> Result<()> {
    let config = PipesConfig::from_yaml_str(CONFIG_YAML)?;

    assert_eq!(config.id, "integration-runtime");
    assert_eq!(config.default_poll_interval(), Duration::from_millis(10));
    assert_eq!(config.failure_policy, FailurePolicy::Resume);
    Ok(())
}

#[tokio::test]
async fn test_collection_source_to_downstream() -> Result<()> {
    // ============================================================================
    // SETUP PHASE: Runtime, downstream and receiver
    // ============================================================================

    let (event_tx, mut event_rx) = mpsc::channel(100);
    let runtime = PipelineRuntime::new(PipesConfig::from_yaml_str(CONFIG_YAML)?, event_tx)?;

    let downstream = runtime.create_downstream::<String>();
    let mut receiver = downstream.create_receiver().await?;

    let source = Arc::new(CollectionSource::from_iterable(
        ["alpha", "beta", "gamma"].into_iter().map(String::from),
    ));
    let handle = source.clone().materialize(&runtime, downstream).await?;

    // ============================================================================
    // COLLECTION PHASE
    // ============================================================================

    let mut received = Vec::new();
    for _ in 0..3 {
        let record = timeout(Duration::from_secs(5), receiver.recv()).await??;
        received.push(record.value().clone());
    }
    assert_eq!(received, vec!["alpha", "beta", "gamma"]);
    assert!(source.is_consumed());

    // No further records arrive even after many more ticks
    let extra = timeout(Duration::from_millis(100), receiver.recv()).await;
    assert!(extra.is_err(), "collection emitted more than one batch");

    // ============================================================================
    // SHUTDOWN PHASE
    // ============================================================================

    let ids: Vec<String> = runtime
        .list_entities()
        .await
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec![handle.id().to_string()]);
    runtime.shutdown().await;
    assert_eq!(handle.state(), PollLoopState::Stopped);

    let mut statuses = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        assert_eq!(event.component_id, handle.id());
        statuses.push(event.status);
    }
    assert_eq!(statuses.first(), Some(&ComponentStatus::Starting));
    assert_eq!(statuses.last(), Some(&ComponentStatus::Stopped));

    Ok(())
}

#[tokio::test]
async fn test_user_defined_source_runs_until_exhausted() -> Result<()> {
    let runtime = PipelineRuntime::standalone(PipesConfig::from_yaml_str(CONFIG_YAML)?)?;
    let downstream = runtime.create_downstream::<u64>();
    let mut receiver = downstream.create_receiver().await?;

    let source = Arc::new(PagingSource::new((1..=10).collect(), 4));
    let handle = runtime.materialize(source, downstream).await?;
    assert_eq!(handle.id(), "paging-source");

    let mut received = Vec::new();
    while let Ok(record) = timeout(Duration::from_secs(5), receiver.recv()).await? {
        received.push(*record.value());
    }
    assert_eq!(received, (1..=10).collect::<Vec<u64>>());

    assert!(handle.wait_for_stop(Duration::from_secs(5)).await);
    let stats = handle.stats();
    assert_eq!(stats.batches_forwarded, 3);
    assert_eq!(stats.records_forwarded, 10);
    assert_eq!(stats.empty_polls, 3);

    runtime.shutdown().await;
    Ok(())
}
