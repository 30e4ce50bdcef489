//! Pool item entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;

use indexpool_core::types::{ItemId, OwnerId};

use super::status::ItemStatus;

/// Open key/value metadata attached to an item (e.g. `deliveryDate`,
/// `dayOfWeek`). Stored as a JSONB object whose values may be any JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemMetadata(pub Map<String, Value>);

impl ItemMetadata {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string value.
    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_value(key, Value::String(value.into()))
    }

    /// Add an arbitrary JSON value.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Look up a string value. Non-string values yield `None`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Look up a raw JSON value.
    pub fn get_value(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl FromIterator<(String, String)> for ItemMetadata {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
        )
    }
}

/// A uniquely indexed resource record in the pool.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Item {
    /// Unique item identifier.
    pub id: ItemId,
    /// Category the item belongs to.
    pub category: String,
    /// Selection priority, unique within the category and immutable.
    #[sqlx(rename = "item_index")]
    pub index: i64,
    /// Current allocation status.
    pub status: ItemStatus,
    /// Owner the item is allocated to, if any.
    pub owner_id: Option<OwnerId>,
    /// When the item was allocated.
    pub allocated_at: Option<DateTime<Utc>>,
    /// Free-form metadata.
    #[sqlx(json)]
    pub metadata: ItemMetadata,
    /// When the item was seeded.
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Check if this item can currently be claimed.
    pub fn is_available(&self) -> bool {
        self.status.is_available()
    }

    /// Check if this item is allocated to the given owner.
    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        self.status == ItemStatus::Allocated && self.owner_id.as_ref() == Some(owner)
    }
}

/// Data required to seed a new item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    /// Category of the new item.
    pub category: String,
    /// Index of the new item.
    pub index: i64,
    /// Metadata of the new item.
    #[serde(default)]
    pub metadata: ItemMetadata,
}

impl NewItem {
    /// Create a seed record without metadata.
    pub fn new(category: impl Into<String>, index: i64) -> Self {
        Self {
            category: category.into(),
            index,
            metadata: ItemMetadata::default(),
        }
    }

    /// Attach metadata to the seed record.
    pub fn with_metadata(mut self, metadata: ItemMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}
