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

//! Source trait module
//!
//! A source is a passive, pull-based producer of records. It does nothing on
//! its own: something has to call [`Source::poll`] to obtain the next batch.
//! [`Source::materialize`] hands the source to a
//! [`PipelineRuntime`](crate::runtime::PipelineRuntime), which spawns a poll
//! loop that calls `poll()` on a fixed interval and forwards every record to a
//! downstream dispatcher.
//!
//! # Implementing a source
//!
//! ```ignore
//! use drasi_pipes::{Batch, Downstream, Materialized, PipelineRuntime, Record, Source};
//!
//! pub struct TickSource {
//!     next: AtomicU64,
//! }
//!
//! #[async_trait]
//! impl Source<u64> for TickSource {
//!     async fn poll(&self) -> anyhow::Result<Batch<u64>> {
//!         Ok(vec![Record::of(self.next.fetch_add(1, Ordering::SeqCst))])
//!     }
//!
//!     async fn materialize(
//!         self: Arc<Self>,
//!         runtime: &PipelineRuntime,
//!         downstream: Downstream<u64>,
//!     ) -> drasi_pipes::Result<Materialized> {
//!         runtime.spawn_poll_loop(self, runtime.default_poll_interval(), downstream).await
//!     }
//! }
//! ```

use async_trait::async_trait;
use std::sync::Arc;

use crate::channels::Downstream;
use crate::error::Result;
use crate::record::Batch;
use crate::runtime::PipelineRuntime;
use crate::sources::Materialized;

/// Trait defining the interface for all source implementations.
///
/// # Poll contract
///
/// `poll()` resolves exactly once, either to a batch (ordered, possibly empty)
/// or to an error. An empty batch means "no data this round": finite sources
/// return it once exhausted, unbounded sources return it when nothing is ready.
/// Callers must not read it as "done forever".
///
/// A poll loop never has more than one `poll()` in flight for the source it
/// owns. Sources that may also be polled directly from several tasks must make
/// their own state transitions atomic.
///
/// A source must not emit the same logical element twice unless it is
/// explicitly designed to be repeatable.
#[async_trait]
pub trait Source<T>: Send + Sync
where
    T: Send + Sync + 'static,
{
    /// Produce the next batch of records.
    async fn poll(&self) -> anyhow::Result<Batch<T>>;

    /// Bind this source to `runtime`, spawning a poll loop that forwards every
    /// polled record to `downstream`.
    ///
    /// Materialize an instance at most once. A second call creates a second,
    /// independent loop competing to drain the same source; this is not
    /// detected.
    async fn materialize(
        self: Arc<Self>,
        runtime: &PipelineRuntime,
        downstream: Downstream<T>,
    ) -> Result<Materialized>;
}
