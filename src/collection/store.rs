use super::transfer;
use super::{Item, ItemId};
use crate::errors::{FinderError, Result};
use crate::storage::{read_json, KeyValueStore, KEY_COLLECTION};
use log::{debug, info, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Authoritative, durable list of owned items.
///
/// Insertion order is significant (it defines newest/oldest) and ids are
/// unique. Every mutation writes the whole serialized list back to the
/// key-value store before the in-memory list changes, so a failed write leaves
/// the store exactly as it was.
pub struct CollectionStore {
    store: Arc<dyn KeyValueStore>,
    items: Vec<Item>,
}

impl CollectionStore {
    /// Load the persisted collection. Absent or malformed data yields an
    /// empty collection.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let items: Vec<Item> = read_json(store.as_ref(), KEY_COLLECTION).unwrap_or_default();
        // Older blobs may predate id dedup; keep the first occurrence
        let mut seen = HashSet::with_capacity(items.len());
        let before = items.len();
        let items: Vec<Item> = items.into_iter().filter(|i| seen.insert(i.id())).collect();
        if items.len() != before {
            warn!(
                "collection: dropped {} duplicate record(s) while loading",
                before - items.len()
            );
        }
        debug!("collection: loaded {} item(s)", items.len());
        Self { store, items }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|i| &i.id() == id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    /// Set of owned ids for O(1) membership tests during acquisition.
    pub fn owned_ids(&self) -> HashSet<ItemId> {
        self.items.iter().map(Item::id).collect()
    }

    /// Append `item` and persist. A duplicate id is a silent no-op.
    pub fn add(&mut self, item: Item) -> Result<&[Item]> {
        self.try_add(item)?;
        Ok(&self.items)
    }

    /// Like [`add`](Self::add), but reports whether the item was inserted.
    /// `Ok(false)` means the id was already owned and nothing was written.
    pub fn try_add(&mut self, item: Item) -> Result<bool> {
        let id = item.id();
        if self.contains(&id) {
            warn!("collection: ignoring duplicate add of {}", id);
            return Ok(false);
        }
        let mut next = self.items.clone();
        next.push(item);
        self.commit(next)?;
        info!("collection: added {} ({} owned)", id, self.items.len());
        Ok(true)
    }

    /// Flip the favorite flag on `id`. Returns the new value, or `None` when
    /// the id is not owned (nothing is written in that case).
    pub fn toggle_favorite(&mut self, id: &ItemId) -> Result<Option<bool>> {
        let Some(pos) = self.items.iter().position(|i| &i.id() == id) else {
            debug!("collection: toggle_favorite on unknown id {}", id);
            return Ok(None);
        };
        let mut next = self.items.clone();
        next[pos].is_favorite = !next[pos].is_favorite;
        let now_favorite = next[pos].is_favorite;
        self.commit(next)?;
        Ok(Some(now_favorite))
    }

    /// Wholesale overwrite. Rejects lists that repeat an id, leaving the
    /// current collection untouched.
    pub fn replace_all(&mut self, items: Vec<Item>) -> Result<()> {
        let mut seen = HashSet::with_capacity(items.len());
        if let Some(dup) = items.iter().find(|i| !seen.insert(i.id())) {
            return Err(FinderError::ImportFormat(format!(
                "duplicate id {} in replacement",
                dup.id()
            )));
        }
        self.commit(items)?;
        info!("collection: replaced with {} item(s)", self.items.len());
        Ok(())
    }

    /// Validate and apply an import payload. Returns the number of items now
    /// owned.
    pub fn import_json(&mut self, raw: &str) -> Result<usize> {
        let items = transfer::parse_import(raw)?;
        self.replace_all(items)?;
        Ok(self.items.len())
    }

    /// Serialized collection for export; fails when empty.
    pub fn export_json(&self) -> Result<String> {
        transfer::export_items(&self.items)
    }

    /// Empty the collection and remove the persisted key.
    pub fn clear(&mut self) -> Result<()> {
        self.store.remove(KEY_COLLECTION)?;
        let dropped = self.items.len();
        self.items.clear();
        info!("collection: cleared {} item(s)", dropped);
        Ok(())
    }

    fn commit(&mut self, next: Vec<Item>) -> Result<()> {
        let blob = serde_json::to_string(&next)?;
        self.store.set(KEY_COLLECTION, &blob)?;
        self.items = next;
        Ok(())
    }
}
