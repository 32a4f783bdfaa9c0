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

use log::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub fn log_component_start(component: &str, id: &str) {
    info!("Starting {component} component: {id}");
}

pub fn log_component_stop(component: &str, id: &str) {
    info!("Stopping {component} component: {id}");
}

pub fn log_component_error(component: &str, id: &str, error: &str) {
    error!("Error in {component} component {id}: {error}");
}

pub fn log_component_warning(component: &str, id: &str, warning: &str) {
    warn!("Warning in {component} component {id}: {warning}");
}

/// Install a global `tracing` subscriber filtered by `RUST_LOG` (default `info`).
///
/// `log` records emitted by this crate are bridged into the subscriber.
/// Returns an error if a global subscriber or logger is already installed.
pub fn try_init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).try_init()
}

/// Like [`try_init_logging`], with an explicit filter directive such as
/// `"debug"` or `"drasi_pipes=trace"`. `RUST_LOG` is ignored.
pub fn try_init_logging_with_level(
    directive: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .try_init()
}

/// Install the default subscriber, ignoring "already initialized" errors.
pub fn init_logging() {
    let _ = try_init_logging();
}
