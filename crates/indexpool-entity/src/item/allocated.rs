//! Normalized allocation result entry.

use serde::{Deserialize, Serialize};

use indexpool_core::types::ItemId;

use super::model::{Item, ItemMetadata};

/// One successfully claimed item, as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocatedItem {
    /// Identifier of the claimed item.
    pub item_id: ItemId,
    /// Index of the claimed item.
    pub index: i64,
    /// Metadata of the claimed item.
    pub metadata: ItemMetadata,
}

impl From<Item> for AllocatedItem {
    fn from(item: Item) -> Self {
        Self {
            item_id: item.id,
            index: item.index,
            metadata: item.metadata,
        }
    }
}

impl From<&Item> for AllocatedItem {
    fn from(item: &Item) -> Self {
        Self {
            item_id: item.id,
            index: item.index,
            metadata: item.metadata.clone(),
        }
    }
}
