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

/// Immutable envelope carrying one payload value through a pipeline.
///
/// A `Record` has no identity beyond its payload: two records are equal when
/// their values are equal. It serializes as the bare payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record<T> {
    value: T,
}

impl<T> Record<T> {
    /// Wrap `value` in a record. No validation or transformation is applied.
    pub fn of(value: T) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T> From<T> for Record<T> {
    fn from(value: T) -> Self {
        Record::of(value)
    }
}

/// Ordered, possibly empty sequence of records returned by one `poll()` call.
pub type Batch<T> = Vec<Record<T>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_of_wraps_value() {
        let record = Record::of(42);
        assert_eq!(*record.value(), 42);
        assert_eq!(record.into_value(), 42);
    }

    #[test]
    fn test_record_equality_is_by_value() {
        assert_eq!(Record::of("a".to_string()), Record::from("a".to_string()));
        assert_ne!(Record::of(1), Record::of(2));
    }

    #[test]
    fn test_record_serializes_as_payload() {
        let record = Record::of(serde_json::json!({"id": 7}));
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":7}"#);

        let back: Record<u32> = serde_json::from_str("5").unwrap();
        assert_eq!(back, Record::of(5));
    }
}
