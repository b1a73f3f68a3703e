//! Item and store entry types.

use crate::Timestamp;
use serde::{Deserialize, Serialize};

/// The user-visible unit of data.
///
/// Items are immutable once created: a write replaces the whole item
/// rather than editing it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Item identifier.
    pub id: String,
    /// Item value.
    pub value: String,
}

impl Item {
    /// Creates a new item.
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }
}

/// An item paired with the logical time of its most recent write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEntry {
    /// The item.
    pub item: Item,
    /// Time of the most recent write to this item.
    pub last_modified: Timestamp,
}

impl StoreEntry {
    /// Creates a new entry.
    pub fn new(item: Item, last_modified: Timestamp) -> Self {
        Self {
            item,
            last_modified,
        }
    }

    /// Returns the item id.
    pub fn id(&self) -> &str {
        &self.item.id
    }

    /// Returns the item value.
    pub fn value(&self) -> &str {
        &self.item.value
    }
}
