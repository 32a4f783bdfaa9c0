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

//! Delivery and supervision channels.
//!
//! - [`dispatcher`]: how a poll loop hands records to its downstream consumer
//! - [`events`]: lifecycle states and the supervision events a poll loop emits

pub mod dispatcher;
pub mod events;

pub use dispatcher::*;
pub use events::*;
