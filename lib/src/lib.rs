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

//! Pull-based sources for Drasi pipelines.
//!
//! A [`Source`] produces batches of [`Record`]s when polled. Materializing a
//! source binds it to a [`PipelineRuntime`], which spawns a poll loop that
//! calls `poll()` on a fixed interval and forwards every record downstream.
//!
//! ```no_run
//! use drasi_pipes::{CollectionSource, PipelineRuntime, PipesConfig, Source};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = PipelineRuntime::standalone(PipesConfig::default())?;
//! let downstream = runtime.create_downstream::<&'static str>();
//! let mut receiver = downstream.create_receiver().await?;
//!
//! let source = Arc::new(CollectionSource::from_array(["a", "b", "c"]));
//! let handle = source.materialize(&runtime, downstream).await?;
//!
//! // The loop keeps polling the drained collection until it is stopped
//! for _ in 0..3 {
//!     let record = receiver.recv().await?;
//!     println!("{}", record.value());
//! }
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Core Public Modules
// ============================================================================

/// Delivery dispatchers and supervision events
pub mod channels;

/// Runtime configuration
pub mod config;

/// Error types for drasi-pipes
pub mod error;

/// Logging helpers
pub mod managers;

/// The record envelope
pub mod record;

/// Materialization registry and supervision
pub mod runtime;

/// The source trait, built-in sources and the poll loop
pub mod sources;

// ============================================================================
// Clean Public API
// ============================================================================

pub use error::{PipesError, Result};

pub use record::{Batch, Record};

pub use sources::{CollectionSource, Materialized, PollLoopParams, PollLoopStats, Source};

pub use runtime::{PipelineRuntime, SupervisionDirective, Supervisor};

pub use config::{FailurePolicy, PipesConfig, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_INTERVAL_MS};

pub use channels::{
    ComponentEvent, ComponentEventReceiver, ComponentEventSender, ComponentStatus, DispatchMode,
    Downstream, PollLoopState, RecordDispatcher, RecordReceiver,
};

pub use managers::{init_logging, try_init_logging, try_init_logging_with_level};
