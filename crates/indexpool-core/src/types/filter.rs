//! Metadata filters applied on top of `{category, status = available}`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;

/// Metadata key for the delivery date filter (`YYYY-MM-DD`).
pub const DELIVERY_DATE_KEY: &str = "deliveryDate";
/// Metadata key for the day-of-week filter (e.g. `monday`).
pub const DAY_OF_WEEK_KEY: &str = "dayOfWeek";

/// Exact-match conjunction over item metadata.
///
/// Every entry must match the item's metadata value exactly for the item
/// to be a candidate. An empty filter set matches every item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllocationFilters {
    predicates: BTreeMap<String, String>,
}

impl AllocationFilters {
    /// An empty filter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `metadata.deliveryDate == date`.
    pub fn delivery_date(self, date: impl Into<String>) -> Self {
        self.with(DELIVERY_DATE_KEY, date)
    }

    /// Require `metadata.dayOfWeek == day`.
    pub fn day_of_week(self, day: impl Into<String>) -> Self {
        self.with(DAY_OF_WEEK_KEY, day)
    }

    /// Require `metadata[key] == value`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.predicates.insert(key.into(), value.into());
        self
    }

    /// Whether no predicates are set.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Iterate predicates in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.predicates
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether the given metadata satisfies every predicate. Only string
    /// values can match, as with JSONB containment of a string.
    pub fn matches(&self, metadata: &Map<String, Value>) -> bool {
        self.predicates.iter().all(|(key, expected)| {
            metadata.get(key).and_then(Value::as_str) == Some(expected.as_str())
        })
    }

    /// Reject blank keys or values.
    pub fn validate(&self) -> Result<(), AppError> {
        for (key, value) in &self.predicates {
            if key.trim().is_empty() {
                return Err(AppError::invalid_argument("Filter key must not be empty"));
            }
            if value.trim().is_empty() {
                return Err(AppError::invalid_argument(format!(
                    "Filter value for '{key}' must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// Render the predicates as a JSON object, suitable for JSONB
    /// containment (`metadata @> $1`).
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.predicates
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}
