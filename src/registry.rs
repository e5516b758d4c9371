//! Item registry: the ordered, in-memory collection of batch items.
//!
//! The registry is the only mutable shared state of the engine. Every change
//! goes through [`ItemRegistry::update`], [`ItemRegistry::bulk_update`] or
//! [`ItemRegistry::try_update`], each of which holds the write lock for the
//! whole change, so readers never observe a half-applied patch. Every applied
//! change is published as [`Event::ItemUpdated`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, broadcast};

use crate::error::Result;
use crate::types::{BatchItem, BatchStats, Event, ImageSource, ItemId, ItemPatch};

/// Shared handle to the batch items (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ItemRegistry {
    /// Items in insertion order
    items: Arc<RwLock<Vec<BatchItem>>>,
    /// Next identifier; never reset, so ids of discarded batches stay dead
    next_id: Arc<AtomicU64>,
    event_tx: broadcast::Sender<Event>,
}

impl ItemRegistry {
    /// Create an empty registry publishing to `event_tx`
    pub fn new(event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            items: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            event_tx,
        }
    }

    /// Build fresh pending items in input order, replacing any prior batch
    ///
    /// The previous items (and their image payloads) are dropped here.
    pub async fn create_batch(&self, images: Vec<ImageSource>) -> Vec<BatchItem> {
        let created: Vec<BatchItem> = images
            .into_iter()
            .map(|image| {
                let id = ItemId(self.next_id.fetch_add(1, Ordering::Relaxed));
                BatchItem::new(id, image)
            })
            .collect();

        let discarded = {
            let mut items = self.items.write().await;
            std::mem::replace(&mut *items, created.clone())
        };

        tracing::info!(
            total = created.len(),
            discarded = discarded.len(),
            "Created new batch"
        );
        self.event_tx
            .send(Event::BatchLoaded {
                total: created.len(),
            })
            .ok();
        created
    }

    /// Apply `patch` to the item with `id`
    ///
    /// Returns the updated item, or `None` when the id is not (or no longer)
    /// part of the batch. A missing id is not an error: a run draining a batch
    /// that has since been reset must not resurrect its items.
    pub async fn update(&self, id: ItemId, patch: ItemPatch) -> Option<BatchItem> {
        let updated = {
            let mut items = self.items.write().await;
            let item = items.iter_mut().find(|item| item.id == id)?;
            item.apply(&patch);
            item.clone()
        };

        self.publish(&updated);
        Some(updated)
    }

    /// Apply a patch computed from the item's current state, atomically
    ///
    /// `decide` sees the item under the write lock and either returns the patch
    /// to apply or rejects the change. Fails with [`Error::NotFound`](crate::Error::NotFound)
    /// when the id is absent.
    pub async fn try_update<F>(&self, id: ItemId, decide: F) -> Result<BatchItem>
    where
        F: FnOnce(&BatchItem) -> Result<ItemPatch>,
    {
        let updated = {
            let mut items = self.items.write().await;
            let item = items
                .iter_mut()
                .find(|item| item.id == id)
                .ok_or(crate::Error::NotFound(id))?;
            let patch = decide(item)?;
            item.apply(&patch);
            item.clone()
        };

        self.publish(&updated);
        Ok(updated)
    }

    /// Apply the same patch to every item matching `predicate`
    ///
    /// Returns the updated items in registry order.
    pub async fn bulk_update<P>(&self, predicate: P, patch: ItemPatch) -> Vec<BatchItem>
    where
        P: Fn(&BatchItem) -> bool,
    {
        let updated: Vec<BatchItem> = {
            let mut items = self.items.write().await;
            items
                .iter_mut()
                .filter(|item| predicate(item))
                .map(|item| {
                    item.apply(&patch);
                    item.clone()
                })
                .collect()
        };

        for item in &updated {
            self.publish(item);
        }
        updated
    }

    /// Consistent copy of every item, in insertion order
    pub async fn snapshot(&self) -> Vec<BatchItem> {
        self.items.read().await.clone()
    }

    /// Copy of one item
    pub async fn get(&self, id: ItemId) -> Option<BatchItem> {
        self.items
            .read()
            .await
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// Whether `id` belongs to the current batch
    pub async fn contains(&self, id: ItemId) -> bool {
        self.items.read().await.iter().any(|item| item.id == id)
    }

    /// Number of items in the batch
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    /// Whether the batch is empty
    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Aggregate statistics over the current items
    pub async fn stats(&self) -> BatchStats {
        BatchStats::from_items(&self.items.read().await)
    }

    /// Discard every item, releasing the image payloads
    ///
    /// Returns how many items were discarded.
    pub async fn reset(&self) -> usize {
        let discarded = std::mem::take(&mut *self.items.write().await);
        let count = discarded.len();
        drop(discarded);

        tracing::info!(discarded = count, "Batch reset");
        self.event_tx.send(Event::BatchReset).ok();
        count
    }

    fn publish(&self, item: &BatchItem) {
        self.event_tx
            .send(Event::ItemUpdated { item: item.clone() })
            .ok();
    }
}
