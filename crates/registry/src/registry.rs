use hoard_import::Importers;
use hoard_store::{AssetMetadata, ContentFingerprint, Insertion, Store, StoreCounts, truncate_to_millis};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use time::UtcDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::cache::{CacheStats, MemoryCache};
use crate::error::{ErrorKind, Propagate, Result};
use crate::inflight::InFlight;
use crate::models::{ImportDefaults, NewAsset, QueryFilter, Registration};

/// BLAKE3 of the blob, lowercase hex.
pub fn fingerprint(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// The single source of truth for asset identity.
///
/// Owns the durable [`Store`], a blob cache and a metadata cache in front of
/// it, and the importers. Construct one per process and share it by
/// reference; every method takes `&self`.
#[derive(Debug)]
pub struct Registry {
    pub(crate) store: Store,
    pub(crate) importers: Importers,
    pub(crate) defaults: ImportDefaults,
    cache: MemoryCache,
    in_flight: InFlight,
    initialized: AtomicBool,
    // Serializes initialize/close against each other.
    lifecycle: Mutex<()>,
}

impl Registry {
    pub fn new(store: Store, importers: Importers, defaults: ImportDefaults) -> Self {
        Self {
            store,
            importers,
            defaults,
            cache: MemoryCache::default(),
            in_flight: InFlight::default(),
            initialized: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
        }
    }

    /// An in-memory registry with default settings.
    pub fn in_memory() -> Self {
        Self::new(Store::in_memory(), Importers::default(), ImportDefaults::default())
    }

    pub fn defaults(&self) -> &ImportDefaults {
        &self.defaults
    }

    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        if !self.initialized.load(Ordering::Acquire) {
            exn::bail!(ErrorKind::NotInitialized);
        }
        Ok(())
    }

    /// Open the store and load every metadata row into memory. Idempotent.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        self.store.initialize().await.propagate()?;
        let all = self.store.get_all_metadata().await.propagate()?;
        // Startup cost grows with the catalogue; this wants paging once
        // catalogues reach the thousands.
        info!(assets = all.len(), "metadata cache loaded eagerly");
        self.cache.replace_metadata(all).await;
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Close the store and drop both caches. The registry can be initialized
    /// again afterwards.
    #[instrument(skip(self))]
    pub async fn close(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        self.initialized.store(false, Ordering::Release);
        self.cache.clear().await;
        self.store.close().await;
    }

    /// Register `data` unless identical bytes are already registered, in which
    /// case the existing id is returned and nothing is written.
    pub async fn register_asset(&self, asset: NewAsset, data: &[u8]) -> Result<String> {
        Ok(self.register(asset, data).await?.id)
    }

    /// [`register_asset`](Self::register_asset), also reporting whether the
    /// registration was deduplicated.
    #[instrument(skip_all, fields(name = %asset.name, asset_type = %asset.asset_type, size = data.len()))]
    pub async fn register(&self, asset: NewAsset, data: &[u8]) -> Result<Registration> {
        self.ensure_initialized()?;
        let hash = fingerprint(data);
        let _in_flight = self.in_flight.acquire(&hash).await;

        if let Some(existing) = self.store.get_fingerprint_by_hash(&hash).await.propagate()? {
            debug!(
                id = %existing.asset_id,
                discarded_category = %asset.category,
                discarded_tags = ?asset.tags,
                "content already registered; keeping the first registration"
            );
            return Ok(Registration { id: existing.asset_id, deduplicated: true });
        }

        let id = Uuid::new_v4().to_string();
        let created_at = truncate_to_millis(UtcDateTime::now());
        let size = data.len() as u64;
        let metadata = AssetMetadata {
            id: id.clone(),
            name: asset.name,
            asset_type: asset.asset_type,
            category: asset.category,
            tags: asset.tags,
            size,
            created_at,
            thumbnail: asset.thumbnail,
            content_hash: hash.clone(),
            details: asset.details,
        };
        let fingerprint = ContentFingerprint { hash, asset_id: id.clone(), size, created_at };
        match self.store.insert_asset(&metadata, data, &fingerprint).await.propagate()? {
            Insertion::Inserted => {
                self.cache.insert_metadata(metadata).await;
                info!(%id, "asset registered");
                Ok(Registration { id, deduplicated: false })
            },
            // Another process got there between our lookup and our insert.
            Insertion::Existing(existing) => Ok(Registration { id: existing.asset_id, deduplicated: true }),
        }
    }

    /// The blob for `id`, or `None` if no such asset exists.
    #[instrument(skip(self))]
    pub async fn get_asset(&self, id: &str) -> Result<Option<Arc<[u8]>>> {
        self.ensure_initialized()?;
        if let Some(blob) = self.cache.blob(id).await {
            debug!("blob cache hit");
            return Ok(Some(blob));
        }
        let generation = self.cache.generation();
        let Some(data) = self.store.get_file(id).await.propagate()? else {
            return Ok(None);
        };
        let blob: Arc<[u8]> = Arc::from(data);
        if !self.cache.fill_blob(id, Arc::clone(&blob), generation).await {
            debug!("cache changed during read; blob not cached");
        }
        Ok(Some(blob))
    }

    #[instrument(skip(self))]
    pub async fn get_metadata(&self, id: &str) -> Result<Option<AssetMetadata>> {
        self.ensure_initialized()?;
        if let Some(metadata) = self.cache.metadata(id).await {
            debug!("metadata cache hit");
            return Ok(Some(metadata));
        }
        let generation = self.cache.generation();
        let metadata = self.store.get_metadata(id).await.propagate()?;
        if let Some(metadata) = &metadata {
            self.cache.fill_metadata(metadata.clone(), generation).await;
        }
        Ok(metadata)
    }

    /// Every asset, sorted by `(created_at, id)`. Refreshes the metadata cache.
    pub async fn get_all_metadata(&self) -> Result<Vec<AssetMetadata>> {
        self.ensure_initialized()?;
        let generation = self.cache.generation();
        let all = self.store.get_all_metadata().await.propagate()?;
        self.cache.refresh_metadata(all.iter().cloned(), generation).await;
        Ok(all)
    }

    /// Assets matching every field of `filter`, sorted by `(created_at, id)`.
    ///
    /// Type or category narrows the candidates through a store index; tags and
    /// then the name pattern are applied in memory.
    #[instrument(skip(self))]
    pub async fn query_assets(&self, filter: &QueryFilter) -> Result<Vec<AssetMetadata>> {
        self.ensure_initialized()?;
        let candidates = match (filter.asset_type, filter.category.as_deref()) {
            (Some(asset_type), _) => self.store.get_metadata_by_type(asset_type).await.propagate()?,
            (None, Some(category)) => self.store.get_metadata_by_category(category).await.propagate()?,
            (None, None) => self.store.get_all_metadata().await.propagate()?,
        };
        Ok(filter.refine(candidates))
    }

    /// Remove an asset's metadata, blob and fingerprint, and evict it from
    /// both caches. Fails with [`ErrorKind::NotFound`] if there is no such
    /// asset.
    #[instrument(skip(self))]
    pub async fn delete_asset(&self, id: &str) -> Result<()> {
        self.ensure_initialized()?;
        if !self.store.delete_asset(id).await.propagate()? {
            exn::bail!(ErrorKind::NotFound(id.to_string()));
        }
        self.cache.evict(id).await;
        info!("asset deleted");
        Ok(())
    }

    /// Drop both memory caches. Durable state is untouched.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Row counts from the store.
    pub async fn counts(&self) -> Result<StoreCounts> {
        self.ensure_initialized()?;
        self.store.counts().await.propagate()
    }

    /// Wipe the store and both caches.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<()> {
        self.ensure_initialized()?;
        self.store.clear().await.propagate()?;
        self.cache.clear().await;
        Ok(())
    }
}
