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

use async_trait::async_trait;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::channels::Downstream;
use crate::error::{PipesError, Result};
use crate::record::{Batch, Record};
use crate::runtime::PipelineRuntime;
use crate::sources::{Materialized, Source};

/// Finite, single-shot source over a fixed in-memory sequence.
///
/// The first `poll()` returns every element, in construction order, as one
/// batch. Every later `poll()` returns an empty batch. An empty collection
/// still counts its first poll as the productive one.
///
/// The elements are never mutated after construction. The consumed flag is
/// flipped with an atomic swap, so the full batch is produced exactly once
/// even if `poll()` is called from several tasks at the same time.
///
/// # Example
///
/// ```ignore
/// let source = CollectionSource::from_array([1, 2, 3]);
/// assert_eq!(source.poll().await?.len(), 3);
/// assert!(source.poll().await?.is_empty());
/// ```
#[derive(Debug)]
pub struct CollectionSource<T> {
    elements: Arc<[T]>,
    consumed: AtomicBool,
}

impl<T> CollectionSource<T> {
    pub fn new(elements: Vec<T>) -> Self {
        Self {
            elements: Arc::from(elements),
            consumed: AtomicBool::new(false),
        }
    }

    pub fn from_array<const N: usize>(elements: [T; N]) -> Self {
        Self::new(Vec::from(elements))
    }

    /// Collect `elements` eagerly. Iteration order becomes emission order.
    ///
    /// The iterator must terminate.
    pub fn from_iterable<I>(elements: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::new(elements.into_iter().collect())
    }

    /// Collect a fallible sequence, failing fast on the first error.
    pub fn try_from_iterable<I, E>(elements: I) -> Result<Self>
    where
        I: IntoIterator<Item = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let elements = elements
            .into_iter()
            .enumerate()
            .map(|(index, element)| {
                element.map_err(|e| {
                    PipesError::construction(format!("element {index} could not be read: {e}"))
                })
            })
            .collect::<Result<Vec<T>>>()?;
        Ok(Self::new(elements))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Whether the productive first poll has already happened.
    pub fn is_consumed(&self) -> bool {
        self.consumed.load(Ordering::Acquire)
    }
}

impl<T> FromIterator<T> for CollectionSource<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_iterable(iter)
    }
}

#[async_trait]
impl<T> Source<T> for CollectionSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn poll(&self) -> anyhow::Result<Batch<T>> {
        if self.consumed.swap(true, Ordering::AcqRel) {
            return Ok(Vec::new());
        }

        debug!("Collection source emitting {} elements", self.elements.len());
        Ok(self.elements.iter().cloned().map(Record::of).collect())
    }

    async fn materialize(
        self: Arc<Self>,
        runtime: &PipelineRuntime,
        downstream: Downstream<T>,
    ) -> Result<Materialized> {
        let interval = runtime.default_poll_interval();
        runtime
            .spawn_poll_loop::<T>(self, interval, downstream)
            .await
    }
}
