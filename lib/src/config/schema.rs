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
use std::time::Duration;

use crate::channels::DispatchMode;
use crate::error::{PipesError, Result};

/// Poll interval used when a source is materialized without an explicit one.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// [`DEFAULT_POLL_INTERVAL_MS`] as a `Duration`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(DEFAULT_POLL_INTERVAL_MS);

/// Default buffer capacity of dispatchers built by the runtime.
pub const DEFAULT_DISPATCH_BUFFER_CAPACITY: usize = 1000;

/// How long `stop()` waits for a poll loop to finish before aborting it.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5000;

fn default_runtime_id() -> String {
    "drasi-pipes".to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_dispatch_buffer_capacity() -> usize {
    DEFAULT_DISPATCH_BUFFER_CAPACITY
}

fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`. Sub-millisecond
/// durations become 0 and are then rejected by validation.
fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// What the supervisor does with a poll loop after a failed `poll()`.
///
/// The failure itself is always reported; the policy only decides what
/// happens to the loop afterwards. Sources never retry on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep the loop scheduled; the next tick polls again
    #[default]
    Resume,
    /// Stop the loop
    Stop,
}

/// Configuration for a [`PipelineRuntime`](crate::runtime::PipelineRuntime).
///
/// # Example
///
/// ```yaml
/// id: orders-pipeline
/// default_poll_interval_ms: 250
/// dispatch_mode: broadcast
/// failure_policy: stop
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipesConfig {
    /// Runtime identifier, used in logs
    #[serde(default = "default_runtime_id")]
    pub id: String,

    /// Poll interval for sources materialized without an explicit interval
    #[serde(default = "default_poll_interval_ms")]
    pub default_poll_interval_ms: u64,

    /// Buffer capacity of dispatchers created by the runtime
    #[serde(default = "default_dispatch_buffer_capacity")]
    pub dispatch_buffer_capacity: usize,

    /// Mode of dispatchers created by the runtime
    #[serde(default)]
    pub dispatch_mode: DispatchMode,

    /// Grace period for a stopping poll loop before it is aborted
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Default failure policy for poll loops
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for PipesConfig {
    fn default() -> Self {
        Self {
            id: default_runtime_id(),
            default_poll_interval_ms: default_poll_interval_ms(),
            dispatch_buffer_capacity: default_dispatch_buffer_capacity(),
            dispatch_mode: DispatchMode::default(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl PipesConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_default_poll_interval(mut self, interval: Duration) -> Self {
        self.default_poll_interval_ms = saturating_millis(interval);
        self
    }

    pub fn with_dispatch_mode(mut self, mode: DispatchMode) -> Self {
        self.dispatch_mode = mode;
        self
    }

    pub fn with_dispatch_buffer_capacity(mut self, capacity: usize) -> Self {
        self.dispatch_buffer_capacity = capacity;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = saturating_millis(timeout);
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: PipesConfig = serde_yaml::from_str(yaml)
            .map_err(|e| PipesError::invalid_config(format!("YAML parsing error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PipesConfig = serde_json::from_str(json)
            .map_err(|e| PipesError::invalid_config(format!("JSON parsing error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_poll_interval(&self) -> Duration {
        Duration::from_millis(self.default_poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validate the configuration and return an error if invalid.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The id is empty
    /// - The default poll interval is 0 (would poll in a tight loop)
    /// - The shutdown timeout is 0
    /// - The dispatch buffer capacity is 0
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(PipesError::invalid_config("id cannot be empty"));
        }

        if self.default_poll_interval_ms == 0 {
            return Err(PipesError::invalid_config(
                "default_poll_interval_ms cannot be 0. \
                 Please specify a positive interval in milliseconds (minimum 1)",
            ));
        }

        if self.shutdown_timeout_ms == 0 {
            return Err(PipesError::invalid_config(
                "shutdown_timeout_ms cannot be 0. \
                 Please specify a positive timeout in milliseconds (minimum 1)",
            ));
        }

        if self.dispatch_buffer_capacity == 0 {
            return Err(PipesError::invalid_config(
                "dispatch_buffer_capacity cannot be 0",
            ));
        }

        Ok(())
    }
}
