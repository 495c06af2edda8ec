//! In-process caches shadowing store rows.
//!
//! Only the registry writes here, and only after the matching store write has
//! committed. Locks are never held across a store call.
//!
//! Read-through fills race with deletes: a reader may fetch a row just before
//! it is deleted and try to cache it just after. Every eviction bumps a
//! generation under the write locks, and a fill only lands if the generation
//! it observed before reading the store is still current.

use hoard_store::AssetMetadata;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Snapshot of the memory caches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total bytes held in the blob cache.
    pub size: u64,
    /// Ids with a cached blob, sorted.
    pub keys: Vec<String>,
    pub metadata_entries: usize,
}

#[derive(Debug, Default)]
pub(crate) struct MemoryCache {
    blobs: RwLock<HashMap<String, Arc<[u8]>>>,
    metadata: RwLock<HashMap<String, AssetMetadata>>,
    generation: AtomicU64,
}
impl MemoryCache {
    /// Observe before reading the store; hand back to the `fill_*` call.
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) async fn blob(&self, id: &str) -> Option<Arc<[u8]>> {
        self.blobs.read().await.get(id).cloned()
    }

    /// Cache a blob read from the store. Returns `false` if something was
    /// evicted since `generation` was observed.
    pub(crate) async fn fill_blob(&self, id: &str, data: Arc<[u8]>, generation: u64) -> bool {
        let mut blobs = self.blobs.write().await;
        if self.generation() != generation {
            return false;
        }
        blobs.insert(id.to_string(), data);
        true
    }

    pub(crate) async fn metadata(&self, id: &str) -> Option<AssetMetadata> {
        self.metadata.read().await.get(id).cloned()
    }

    pub(crate) async fn insert_metadata(&self, metadata: AssetMetadata) {
        self.metadata.write().await.insert(metadata.id.clone(), metadata);
    }

    /// Cache a metadata row read from the store, unless stale.
    pub(crate) async fn fill_metadata(&self, metadata: AssetMetadata, generation: u64) -> bool {
        let mut cached = self.metadata.write().await;
        if self.generation() != generation {
            return false;
        }
        cached.insert(metadata.id.clone(), metadata);
        true
    }

    /// Swap the whole metadata cache for a fresh snapshot of the store.
    pub(crate) async fn replace_metadata(&self, all: impl IntoIterator<Item = AssetMetadata>) {
        let fresh: HashMap<_, _> = all.into_iter().map(|m| (m.id.clone(), m)).collect();
        *self.metadata.write().await = fresh;
    }

    /// [`replace_metadata`](Self::replace_metadata) with a snapshot taken at
    /// `generation`; a stale snapshot is dropped.
    pub(crate) async fn refresh_metadata(&self, all: impl IntoIterator<Item = AssetMetadata>, generation: u64) -> bool {
        let mut cached = self.metadata.write().await;
        if self.generation() != generation {
            return false;
        }
        *cached = all.into_iter().map(|m| (m.id.clone(), m)).collect();
        true
    }

    pub(crate) async fn evict(&self, id: &str) {
        let mut blobs = self.blobs.write().await;
        let mut metadata = self.metadata.write().await;
        blobs.remove(id);
        metadata.remove(id);
        self.bump();
    }

    pub(crate) async fn clear(&self) {
        let mut blobs = self.blobs.write().await;
        let mut metadata = self.metadata.write().await;
        blobs.clear();
        metadata.clear();
        self.bump();
    }

    pub(crate) async fn stats(&self) -> CacheStats {
        let (size, mut keys) = {
            let blobs = self.blobs.read().await;
            let size = blobs.values().map(|blob| blob.len() as u64).sum();
            (size, blobs.keys().cloned().collect::<Vec<_>>())
        };
        keys.sort();
        CacheStats { size, keys, metadata_entries: self.metadata.read().await.len() }
    }
}
