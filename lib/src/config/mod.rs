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

//! Runtime configuration.
//!
//! `PipesConfig` configures a [`PipelineRuntime`](crate::runtime::PipelineRuntime):
//! the default poll interval handed to sources that are materialized without an
//! explicit interval, the dispatcher settings, shutdown timeout and failure
//! policy. It can be built in code or loaded from YAML/JSON.

pub mod schema;


pub use schema::*;
