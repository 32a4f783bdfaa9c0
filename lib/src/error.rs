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

//! Error types for drasi-pipes operations.
//!
//! Public API returns `crate::error::Result<T>` with structured `PipesError`
//! variants. Source implementations use `anyhow::Result<T>` internally; those
//! errors surface here either as `PollFailed` (reported by a poll loop) or
//! through the transparent `Internal` variant.
//!
//! # Example
//!
//! ```ignore
//! use drasi_pipes::error::{PipesError, Result};
//!
//! async fn example(runtime: &PipelineRuntime) -> Result<()> {
//!     match runtime.entity_state("orders").await {
//!         Err(PipesError::EntityNotFound { entity_id }) => {
//!             println!("no poll loop named '{}'", entity_id);
//!         }
//!         Err(e) => return Err(e),
//!         Ok(state) => println!("state: {state:?}"),
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Main error type for drasi-pipes operations.
#[derive(Error, Debug)]
pub enum PipesError {
    /// A source could not be built from its backing sequence.
    #[error("Failed to construct source: {message}")]
    Construction {
        /// Description of the construction failure
        message: String,
    },

    /// A `poll()` call resolved to an error instead of a batch.
    #[error("Poll failed for source '{source_id}': {reason}")]
    PollFailed {
        /// The poll loop entity that observed the failure
        source_id: String,
        /// The underlying failure
        reason: String,
    },

    /// The downstream consumer rejected a forwarded record.
    #[error("Failed to dispatch record from source '{source_id}': {reason}")]
    DispatchFailed {
        /// The poll loop entity that was forwarding
        source_id: String,
        /// The underlying failure
        reason: String,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the configuration error
        message: String,
    },

    /// Operation is not valid in the current state.
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Description of the state error
        message: String,
    },

    /// No entity is registered under the given id.
    #[error("Poll loop '{entity_id}' not found")]
    EntityNotFound {
        /// The id that was looked up
        entity_id: String,
    },

    /// An entity is already registered under the given id.
    #[error("Poll loop '{entity_id}' already exists")]
    AlreadyExists {
        /// The id that is already taken
        entity_id: String,
    },

    /// Internal error - wraps underlying errors while preserving the error chain.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PipesError {
    /// Create a construction error.
    pub fn construction(message: impl Into<String>) -> Self {
        PipesError::Construction {
            message: message.into(),
        }
    }

    /// Create a poll failure error.
    ///
    /// # Example
    /// ```ignore
    /// PipesError::poll_failed("orders", "connection reset")
    /// ```
    pub fn poll_failed(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        PipesError::PollFailed {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a dispatch failure error.
    pub fn dispatch_failed(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        PipesError::DispatchFailed {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error.
    ///
    /// # Example
    /// ```ignore
    /// PipesError::invalid_config("interval_ms cannot be 0")
    /// ```
    pub fn invalid_config(message: impl Into<String>) -> Self {
        PipesError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        PipesError::InvalidState {
            message: message.into(),
        }
    }

    /// Create an entity not found error.
    pub fn entity_not_found(entity_id: impl Into<String>) -> Self {
        PipesError::EntityNotFound {
            entity_id: entity_id.into(),
        }
    }

    /// Create an already exists error.
    pub fn already_exists(entity_id: impl Into<String>) -> Self {
        PipesError::AlreadyExists {
            entity_id: entity_id.into(),
        }
    }
}

/// Result type for drasi-pipes operations.
pub type Result<T> = std::result::Result<T, PipesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_display() {
        let err = PipesError::construction("iterator yielded an error");
        assert_eq!(
            err.to_string(),
            "Failed to construct source: iterator yielded an error"
        );
    }

    #[test]
    fn test_poll_failed_display() {
        let err = PipesError::poll_failed("orders", "connection reset");
        assert_eq!(
            err.to_string(),
            "Poll failed for source 'orders': connection reset"
        );
    }

    #[test]
    fn test_dispatch_failed_display() {
        let err = PipesError::dispatch_failed("orders", "Channel closed");
        assert_eq!(
            err.to_string(),
            "Failed to dispatch record from source 'orders': Channel closed"
        );
    }

    #[test]
    fn test_registry_errors_display() {
        assert_eq!(
            PipesError::entity_not_found("missing").to_string(),
            "Poll loop 'missing' not found"
        );
        assert_eq!(
            PipesError::already_exists("orders").to_string(),
            "Poll loop 'orders' already exists"
        );
    }

    #[test]
    fn test_invalid_config_display() {
        let err = PipesError::invalid_config("interval_ms cannot be 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: interval_ms cannot be 0"
        );
    }

    #[test]
    fn test_internal_error_from_anyhow() {
        let anyhow_err = anyhow::anyhow!("Something went wrong");
        let err: PipesError = anyhow_err.into();
        assert!(matches!(err, PipesError::Internal(_)));
        assert!(err.to_string().contains("Something went wrong"));
    }

    #[test]
    fn test_error_pattern_matching() {
        let err = PipesError::poll_failed("orders", "timeout");

        match err {
            PipesError::PollFailed { source_id, reason } => {
                assert_eq!(source_id, "orders");
                assert_eq!(reason, "timeout");
            }
            _ => panic!("Expected PollFailed variant"),
        }
    }
}
