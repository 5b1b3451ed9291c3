//! # Collection Module
//!
//! The item record shared by the catalog and the owned collection, and the
//! [`CollectionStore`] that owns the user's acquired items.
//!
//! - [`Item`] - catalog/collection record in the catalog's camelCase JSON shape
//! - [`ItemId`] - `head + tail` composite, the only field unique across the catalog
//! - [`CollectionStore`] - durable, insertion-ordered, duplicate-free list of owned items
//! - [`transfer`] - JSON import/export of the owned list

pub mod store;
pub mod transfer;

pub use store::CollectionStore;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dedup key for catalog and collection records: the concatenation of the
/// opaque `head` and `tail` fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(head: &str, tail: &str) -> Self {
        let mut id = String::with_capacity(head.len() + tail.len());
        id.push_str(head);
        id.push_str(tail);
        ItemId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId(s)
    }
}

/// Per-region release dates. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseDates {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub au: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub na: Option<String>,
}

/// A catalog or collection record.
///
/// `unlocked_at` is absent on pure catalog records and stamped exactly once
/// when the item enters the collection. `kind` is the catalog's `type` tag and
/// is stripped before an item is stored as owned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub head: String,
    pub tail: String,
    pub name: String,
    #[serde(rename = "gameSeries", default)]
    pub series: String,
    #[serde(rename = "image", default)]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amiibo_series: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    #[serde(rename = "release", default, skip_serializing_if = "Option::is_none")]
    pub release_dates: Option<ReleaseDates>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
}

impl Item {
    /// Minimal record, mostly useful for harnesses and tests.
    pub fn new(head: &str, tail: &str, name: &str, series: &str) -> Self {
        Self {
            head: head.to_string(),
            tail: tail.to_string(),
            name: name.to_string(),
            series: series.to_string(),
            image_url: String::new(),
            amiibo_series: None,
            character: None,
            release_dates: None,
            kind: None,
            unlocked_at: None,
            is_favorite: false,
        }
    }

    pub fn id(&self) -> ItemId {
        ItemId::new(&self.head, &self.tail)
    }

    /// Turn a catalog record into an owned one: stamp the unlock date and
    /// drop catalog-only fields.
    pub fn into_owned(mut self, unlocked_at: String) -> Self {
        self.unlocked_at = Some(unlocked_at);
        self.kind = None;
        self.is_favorite = false;
        self
    }
}
