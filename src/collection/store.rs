use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    error::{CollectionError, Result},
    media::{ItemId, MediaFile, MediaItem},
    thumbnail::ThumbnailDeriver,
};

/// A mutation that was applied to the collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionChange {
    Appended(ItemId),
    Reordered { id: ItemId, from: usize, to: usize },
    Removed(ItemId),
    Cleared,
}

/// Immutable view of the collection at one point in time
#[derive(Debug, Clone, Default)]
pub struct CollectionSnapshot {
    items: Arc<Vec<MediaItem>>,
}

impl CollectionSnapshot {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[MediaItem] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaItem> {
        self.items.iter()
    }

    pub fn ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(|item| item.name()).collect()
    }

    pub fn get(&self, id: ItemId) -> Option<&MediaItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }
}

type ChangeObserver = Box<dyn Fn(&CollectionChange, &CollectionSnapshot) + Send + Sync>;

/// The ordered media collection
///
/// Every mutation replaces the current snapshot, so a snapshot handed out
/// earlier never changes underneath its holder. Observers are only notified
/// for mutations that actually changed the order or contents.
pub struct MediaCollection {
    deriver: Arc<dyn ThumbnailDeriver>,
    snapshot: CollectionSnapshot,
    next_id: u64,
    observers: Vec<ChangeObserver>,
}

impl MediaCollection {
    pub fn new(deriver: Arc<dyn ThumbnailDeriver>) -> Self {
        Self {
            deriver,
            snapshot: CollectionSnapshot::default(),
            next_id: 1,
            observers: Vec::new(),
        }
    }

    /// Register an observer that receives each change and the resulting snapshot
    pub fn on_change<F>(&mut self, observer: F)
    where
        F: Fn(&CollectionChange, &CollectionSnapshot) + Send + Sync + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Current order of the collection
    pub fn snapshot(&self) -> CollectionSnapshot {
        self.snapshot.clone()
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&MediaItem> {
        self.snapshot.get(id)
    }

    pub fn position(&self, id: ItemId) -> Option<usize> {
        self.snapshot.position(id)
    }

    fn items_mut(&mut self) -> &mut Vec<MediaItem> {
        Arc::make_mut(&mut self.snapshot.items)
    }

    fn notify(&self, change: CollectionChange) {
        debug!("Collection changed: {:?} ({} items)", change, self.snapshot.len());
        for observer in &self.observers {
            observer(&change, &self.snapshot);
        }
    }

    /// Derive a thumbnail for `file` and append it to the end
    ///
    /// Nothing is appended when derivation fails; the error is returned.
    pub async fn append(&mut self, file: MediaFile) -> Result<ItemId> {
        let thumbnail = self.deriver.derive(&file).await.map_err(|e| {
            warn!("Not adding {}: {}", file.name(), e);
            e
        })?;

        let id = ItemId::new(self.next_id);
        self.next_id += 1;

        self.items_mut().push(MediaItem {
            id,
            source: file,
            thumbnail,
        });
        self.notify(CollectionChange::Appended(id));
        Ok(id)
    }

    /// Move the item with `id` to `target`, shifting the items in between
    ///
    /// Returns `Ok(false)` without notifying when the item is already there.
    pub fn reorder(&mut self, id: ItemId, target: usize) -> Result<bool> {
        let from = self
            .position(id)
            .ok_or_else(|| CollectionError::NotFound { id: id.to_string() })?;
        self.move_item(from, target)
    }

    /// Apply a drag gesture given as before/after positions
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<bool> {
        let len = self.len();
        for position in [from, to] {
            if position >= len {
                return Err(CollectionError::PositionOutOfRange { position, len }.into());
            }
        }

        if from == to {
            return Ok(false);
        }

        let items = self.items_mut();
        let item = items.remove(from);
        let id = item.id;
        items.insert(to, item);

        self.notify(CollectionChange::Reordered { id, from, to });
        Ok(true)
    }

    /// Remove the item with `id`, if present
    pub fn remove(&mut self, id: ItemId) -> Option<MediaItem> {
        let position = self.position(id)?;
        let removed = self.items_mut().remove(position);
        self.notify(CollectionChange::Removed(id));
        Some(removed)
    }

    /// Remove everything
    pub fn clear(&mut self) {
        if self.is_empty() {
            return;
        }
        self.items_mut().clear();
        self.notify(CollectionChange::Cleared);
    }
}

impl fmt::Debug for MediaCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaCollection")
            .field("items", &self.snapshot.names())
            .field("next_id", &self.next_id)
            .finish()
    }
}
