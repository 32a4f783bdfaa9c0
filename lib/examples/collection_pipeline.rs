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

//! Example demonstrating a collection source feeding a downstream consumer
//!
//! This example shows how to:
//! - Build a `PipelineRuntime` from a YAML configuration
//! - Materialize a `CollectionSource` as a poll loop
//! - Consume forwarded records and supervision events
//! - Stop the loop and shut the runtime down
//!
//! Run with `RUST_LOG=debug` to see every poll.

use drasi_pipes::{CollectionSource, PipelineRuntime, PipesConfig, Source};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    drasi_pipes::init_logging();

    println!("=== Collection Pipeline Example ===\n");

    let config_yaml = r#"
id: collection-example
default_poll_interval_ms: 50
dispatch_mode: channel
"#;

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel(100);
    let runtime = PipelineRuntime::new(PipesConfig::from_yaml_str(config_yaml)?, event_tx)?;

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!(
                "[event] {} -> {:?} {}",
                event.component_id,
                event.status,
                event.message.unwrap_or_default()
            );
        }
    });

    let downstream = runtime.create_downstream::<String>();
    let mut receiver = downstream.create_receiver().await?;

    let source = Arc::new(CollectionSource::from_iterable(
        ["order-1", "order-2", "order-3"].into_iter().map(String::from),
    ));
    let handle = source.materialize(&runtime, downstream).await?;
    println!("Materialized poll loop '{}'\n", handle.id());

    for _ in 0..3 {
        let record = receiver.recv().await?;
        println!("received: {}", record.value());
    }

    // The collection is drained; later polls come back empty
    tokio::time::sleep(Duration::from_millis(200)).await;
    println!("\nstats: {:?}", handle.stats());

    runtime.shutdown().await;
    println!("state after shutdown: {}", handle.state());

    Ok(())
}
