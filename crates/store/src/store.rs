//! The durable store: metadata, blobs and fingerprints.

use exn::{OptionExt, ResultExt};
use hoard_import::AssetType;
use sqlx::{SqliteConnection, SqlitePool};
use std::path::PathBuf;
use time::UtcDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::db::{Database, Location};
use crate::error::{ErrorKind, Result};
use crate::models::{AssetMetadata, ContentFingerprint, FingerprintRow, Insertion, MetadataRow, to_millis};

/// Row counts, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub metadata: u64,
    pub files: u64,
    pub fingerprints: u64,
    /// Sum of blob sizes recorded in metadata.
    pub total_bytes: u64,
}

#[derive(sqlx::FromRow)]
struct CountsRow {
    metadata: i64,
    files: i64,
    fingerprints: i64,
    total_bytes: i64,
}

/// Crash-consistent persistence for the asset registry.
///
/// The store starts closed. [`initialize`](Self::initialize) opens (creating
/// on first run) and migrates the database; every other operation fails with
/// [`ErrorKind::Closed`] until it has completed. Lookups of missing ids return
/// `None` or an empty list and are never errors.
#[derive(Debug)]
pub struct Store {
    location: Location,
    // Async mutex: concurrent `initialize` calls queue behind the one that is
    // opening, so there is only ever one physical open.
    database: Mutex<Option<Database>>,
}

impl Store {
    /// A store backed by the SQLite file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(Location::File(path.into()))
    }

    /// A private in-memory store. Not gated behind `cfg(test)`: other crates
    /// use it in their tests.
    pub fn in_memory() -> Self {
        Self::new(Location::Memory)
    }

    pub fn new(location: Location) -> Self {
        Self { location, database: Mutex::new(None) }
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    /// Open and migrate the database. Idempotent.
    #[instrument(skip(self), fields(location = ?self.location))]
    pub async fn initialize(&self) -> Result<()> {
        let mut slot = self.database.lock().await;
        if slot.is_some() {
            return Ok(());
        }
        *slot = Some(Database::open(&self.location).await?);
        info!("asset database opened");
        Ok(())
    }

    pub async fn is_open(&self) -> bool {
        self.database.lock().await.is_some()
    }

    /// Release the pool. Later calls fail with [`ErrorKind::Closed`] until
    /// [`initialize`](Self::initialize) runs again.
    pub async fn close(&self) {
        let database = self.database.lock().await.take();
        if let Some(database) = database {
            database.close().await;
            info!("asset database closed");
        }
    }

    async fn pool(&self) -> Result<SqlitePool> {
        self.database.lock().await.as_ref().map(|db| db.pool().clone()).ok_or_raise(|| ErrorKind::Closed)
    }

    fn into_models(rows: Vec<MetadataRow>) -> Result<Vec<AssetMetadata>> {
        rows.into_iter().map(AssetMetadata::try_from).collect()
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    async fn write_metadata(conn: &mut SqliteConnection, metadata: &AssetMetadata) -> Result<()> {
        let row = MetadataRow::try_from(metadata)?;
        sqlx::query(include_str!("../queries/upsert_metadata.sql"))
            .bind(row.id)
            .bind(row.name)
            .bind(row.asset_type)
            .bind(row.category)
            .bind(row.size)
            .bind(row.created_at)
            .bind(row.thumbnail)
            .bind(row.content_hash)
            .bind(row.details)
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::io("metadata", "upsert"))?;
        sqlx::query("DELETE FROM metadata_tags WHERE asset_id = ?")
            .bind(metadata.id.as_str())
            .execute(&mut *conn)
            .await
            .or_raise(|| ErrorKind::io("metadata_tags", "delete"))?;
        for tag in &metadata.tags {
            sqlx::query("INSERT INTO metadata_tags (asset_id, tag) VALUES (?, ?)")
                .bind(metadata.id.as_str())
                .bind(tag.as_str())
                .execute(&mut *conn)
                .await
                .or_raise(|| ErrorKind::io("metadata_tags", "insert"))?;
        }
        Ok(())
    }

    /// Insert or replace a metadata record (and its tags).
    #[instrument(skip_all, fields(id = %metadata.id))]
    pub async fn save_metadata(&self, metadata: &AssetMetadata) -> Result<()> {
        let mut tx = self.pool().await?.begin().await.or_raise(|| ErrorKind::io("metadata", "begin"))?;
        Self::write_metadata(&mut tx, metadata).await?;
        tx.commit().await.or_raise(|| ErrorKind::io("metadata", "commit"))
    }

    pub async fn get_metadata(&self, id: &str) -> Result<Option<AssetMetadata>> {
        let row: Option<MetadataRow> = sqlx::query_as(include_str!("../queries/get_metadata.sql"))
            .bind(id)
            .fetch_optional(&self.pool().await?)
            .await
            .or_raise(|| ErrorKind::io("metadata", "select"))?;
        row.map(AssetMetadata::try_from).transpose()
    }

    /// Every record, ordered by `(created_at, id)`.
    pub async fn get_all_metadata(&self) -> Result<Vec<AssetMetadata>> {
        let rows: Vec<MetadataRow> = sqlx::query_as(include_str!("../queries/all_metadata.sql"))
            .fetch_all(&self.pool().await?)
            .await
            .or_raise(|| ErrorKind::io("metadata", "select"))?;
        Self::into_models(rows)
    }

    pub async fn get_metadata_by_type(&self, asset_type: AssetType) -> Result<Vec<AssetMetadata>> {
        let rows: Vec<MetadataRow> = sqlx::query_as(include_str!("../queries/metadata_by_type.sql"))
            .bind(asset_type.as_str())
            .fetch_all(&self.pool().await?)
            .await
            .or_raise(|| ErrorKind::io("metadata", "select"))?;
        Self::into_models(rows)
    }

    pub async fn get_metadata_by_category(&self, category: &str) -> Result<Vec<AssetMetadata>> {
        let rows: Vec<MetadataRow> = sqlx::query_as(include_str!("../queries/metadata_by_category.sql"))
            .bind(category)
            .fetch_all(&self.pool().await?)
            .await
            .or_raise(|| ErrorKind::io("metadata", "select"))?;
        Self::into_models(rows)
    }

    pub async fn get_metadata_by_tag(&self, tag: &str) -> Result<Vec<AssetMetadata>> {
        let rows: Vec<MetadataRow> = sqlx::query_as(include_str!("../queries/metadata_by_tag.sql"))
            .bind(tag)
            .fetch_all(&self.pool().await?)
            .await
            .or_raise(|| ErrorKind::io("metadata_tags", "select"))?;
        Self::into_models(rows)
    }

    /// Records created at or after `since`.
    pub async fn get_metadata_created_since(&self, since: UtcDateTime) -> Result<Vec<AssetMetadata>> {
        let rows: Vec<MetadataRow> = sqlx::query_as(include_str!("../queries/metadata_created_since.sql"))
            .bind(to_millis(since)?)
            .fetch_all(&self.pool().await?)
            .await
            .or_raise(|| ErrorKind::io("metadata", "select"))?;
        Self::into_models(rows)
    }

    // =========================================================================
    // Blobs
    // =========================================================================

    pub async fn save_file(&self, id: &str, data: &[u8]) -> Result<()> {
        sqlx::query(include_str!("../queries/upsert_file.sql"))
            .bind(id)
            .bind(data)
            .execute(&self.pool().await?)
            .await
            .or_raise(|| ErrorKind::io("files", "upsert"))?;
        Ok(())
    }

    pub async fn get_file(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT data FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool().await?)
            .await
            .or_raise(|| ErrorKind::io("files", "select"))?;
        Ok(row.map(|(data,)| data))
    }

    // =========================================================================
    // Fingerprints
    // =========================================================================

    pub async fn save_fingerprint(&self, fingerprint: &ContentFingerprint) -> Result<()> {
        let row = FingerprintRow::try_from(fingerprint)?;
        sqlx::query(include_str!("../queries/upsert_fingerprint.sql"))
            .bind(row.hash)
            .bind(row.asset_id)
            .bind(row.size)
            .bind(row.created_at)
            .execute(&self.pool().await?)
            .await
            .or_raise(|| ErrorKind::io("fingerprints", "upsert"))?;
        Ok(())
    }

    pub async fn get_fingerprint_by_hash(&self, hash: &str) -> Result<Option<ContentFingerprint>> {
        let row: Option<FingerprintRow> =
            sqlx::query_as("SELECT hash, asset_id, size, created_at FROM fingerprints WHERE hash = ?")
                .bind(hash)
                .fetch_optional(&self.pool().await?)
                .await
                .or_raise(|| ErrorKind::io("fingerprints", "select"))?;
        row.map(ContentFingerprint::try_from).transpose()
    }

    pub async fn get_fingerprint_by_asset(&self, asset_id: &str) -> Result<Option<ContentFingerprint>> {
        let row: Option<FingerprintRow> = sqlx::query_as(
            "SELECT hash, asset_id, size, created_at FROM fingerprints WHERE asset_id = ? ORDER BY created_at LIMIT 1",
        )
        .bind(asset_id)
        .fetch_optional(&self.pool().await?)
        .await
        .or_raise(|| ErrorKind::io("fingerprints", "select"))?;
        row.map(ContentFingerprint::try_from).transpose()
    }

    /// Returns whether a fingerprint was removed.
    pub async fn delete_fingerprint(&self, hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM fingerprints WHERE hash = ?")
            .bind(hash)
            .execute(&self.pool().await?)
            .await
            .or_raise(|| ErrorKind::io("fingerprints", "delete"))?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Whole assets
    // =========================================================================

    /// Write metadata, blob and fingerprint in one transaction, unless the
    /// fingerprint's hash is already registered, in which case nothing is
    /// written and the existing fingerprint is returned.
    #[instrument(skip_all, fields(id = %metadata.id, hash = %fingerprint.hash))]
    pub async fn insert_asset(
        &self,
        metadata: &AssetMetadata,
        data: &[u8],
        fingerprint: &ContentFingerprint,
    ) -> Result<Insertion> {
        let row = FingerprintRow::try_from(fingerprint)?;
        let mut tx = self.pool().await?.begin().await.or_raise(|| ErrorKind::io("fingerprints", "begin"))?;
        let claimed = sqlx::query(include_str!("../queries/insert_fingerprint.sql"))
            .bind(row.hash)
            .bind(row.asset_id)
            .bind(row.size)
            .bind(row.created_at)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::io("fingerprints", "insert"))?
            .rows_affected()
            == 1;
        if !claimed {
            let existing: Option<FingerprintRow> =
                sqlx::query_as("SELECT hash, asset_id, size, created_at FROM fingerprints WHERE hash = ?")
                    .bind(fingerprint.hash.as_str())
                    .fetch_optional(&mut *tx)
                    .await
                    .or_raise(|| ErrorKind::io("fingerprints", "select"))?;
            tx.rollback().await.or_raise(|| ErrorKind::io("fingerprints", "rollback"))?;
            let existing = existing.ok_or_raise(|| ErrorKind::InvalidData("fingerprint"))?;
            debug!(existing = %existing.asset_id, "content already registered");
            return Ok(Insertion::Existing(ContentFingerprint::try_from(existing)?));
        }
        Self::write_metadata(&mut tx, metadata).await?;
        sqlx::query(include_str!("../queries/upsert_file.sql"))
            .bind(metadata.id.as_str())
            .bind(data)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::io("files", "insert"))?;
        tx.commit().await.or_raise(|| ErrorKind::io("metadata", "commit"))?;
        Ok(Insertion::Inserted)
    }

    /// Remove the metadata row, its tags, its blob and any fingerprint
    /// pointing at it, in one transaction. Returns whether a metadata or blob
    /// row existed.
    #[instrument(skip(self))]
    pub async fn delete_asset(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool().await?.begin().await.or_raise(|| ErrorKind::io("metadata", "begin"))?;
        sqlx::query("DELETE FROM metadata_tags WHERE asset_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::io("metadata_tags", "delete"))?;
        let metadata = sqlx::query("DELETE FROM metadata WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::io("metadata", "delete"))?
            .rows_affected();
        let files = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::io("files", "delete"))?
            .rows_affected();
        sqlx::query("DELETE FROM fingerprints WHERE asset_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::io("fingerprints", "delete"))?;
        tx.commit().await.or_raise(|| ErrorKind::io("metadata", "commit"))?;
        Ok(metadata + files > 0)
    }

    pub async fn counts(&self) -> Result<StoreCounts> {
        let row: CountsRow = sqlx::query_as(include_str!("../queries/counts.sql"))
            .fetch_one(&self.pool().await?)
            .await
            .or_raise(|| ErrorKind::io("metadata", "count"))?;
        let count = |n: i64| u64::try_from(n).or_raise(|| ErrorKind::InvalidData("count"));
        Ok(StoreCounts {
            metadata: count(row.metadata)?,
            files: count(row.files)?,
            fingerprints: count(row.fingerprints)?,
            total_bytes: count(row.total_bytes)?,
        })
    }

    /// Wipe every table.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        let mut tx = self.pool().await?.begin().await.or_raise(|| ErrorKind::io("metadata", "begin"))?;
        for (table, statement) in [
            ("metadata_tags", "DELETE FROM metadata_tags"),
            ("metadata", "DELETE FROM metadata"),
            ("files", "DELETE FROM files"),
            ("fingerprints", "DELETE FROM fingerprints"),
        ] {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::io(table, "delete"))?;
        }
        tx.commit().await.or_raise(|| ErrorKind::io("metadata", "commit"))?;
        info!("asset database cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::truncate_to_millis;
    use std::sync::Arc;

    fn metadata(id: &str, asset_type: AssetType, category: &str, tags: &[&str], millis: i64) -> AssetMetadata {
        AssetMetadata {
            id: id.to_string(),
            name: format!("asset {id}"),
            asset_type,
            category: category.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            size: 3,
            created_at: UtcDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).unwrap(),
            thumbnail: None,
            content_hash: format!("hash-{id}"),
            details: None,
        }
    }

    fn fingerprint(hash: &str, asset_id: &str) -> ContentFingerprint {
        ContentFingerprint {
            hash: hash.to_string(),
            asset_id: asset_id.to_string(),
            size: 3,
            created_at: truncate_to_millis(UtcDateTime::now()),
        }
    }

    async fn store() -> Store {
        let store = Store::in_memory();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_closed_until_initialized() {
        let store = Store::in_memory();
        let err = store.get_metadata("x").await.unwrap_err();
        assert_eq!(*err, ErrorKind::Closed);
        store.initialize().await.unwrap();
        assert!(store.get_metadata("x").await.unwrap().is_none());
        store.close().await;
        assert!(!store.is_open().await);
        let err = store.counts().await.unwrap_err();
        assert_eq!(*err, ErrorKind::Closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_initialize() {
        let store = Arc::new(Store::in_memory());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.initialize().await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        // One physical open: a second in-memory database would not see this row.
        store.save_file("a", b"abc").await.unwrap();
        store.initialize().await.unwrap();
        assert_eq!(store.get_file("a").await.unwrap().unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_metadata_round_trip_and_indexes() {
        let store = store().await;
        let a = metadata("a", AssetType::Model, "characters", &["hero", "rigged"], 1_000);
        let b = metadata("b", AssetType::Texture, "characters", &["hero"], 2_000);
        let c = metadata("c", AssetType::Texture, "environment", &[], 3_000);
        for m in [&c, &a, &b] {
            store.save_metadata(m).await.unwrap();
        }
        assert_eq!(store.get_metadata("a").await.unwrap().unwrap(), a);
        assert_eq!(store.get_all_metadata().await.unwrap(), vec![a.clone(), b.clone(), c.clone()]);
        assert_eq!(store.get_metadata_by_type(AssetType::Texture).await.unwrap(), vec![b.clone(), c.clone()]);
        assert_eq!(store.get_metadata_by_category("characters").await.unwrap(), vec![a.clone(), b.clone()]);
        assert_eq!(store.get_metadata_by_tag("hero").await.unwrap(), vec![a.clone(), b.clone()]);
        assert!(store.get_metadata_by_tag("villain").await.unwrap().is_empty());
        let since = UtcDateTime::from_unix_timestamp_nanos(2_000_000_000).unwrap();
        assert_eq!(store.get_metadata_created_since(since).await.unwrap(), vec![b.clone(), c.clone()]);
    }

    #[tokio::test]
    async fn test_save_metadata_replaces_tags() {
        let store = store().await;
        let mut a = metadata("a", AssetType::Audio, "sfx", &["loud"], 1_000);
        store.save_metadata(&a).await.unwrap();
        a.tags = ["quiet".to_string()].into();
        store.save_metadata(&a).await.unwrap();
        assert!(store.get_metadata_by_tag("loud").await.unwrap().is_empty());
        assert_eq!(store.get_metadata("a").await.unwrap().unwrap().tags, a.tags);
    }

    #[tokio::test]
    async fn test_fingerprints() {
        let store = store().await;
        let fp = fingerprint("h1", "a");
        store.save_fingerprint(&fp).await.unwrap();
        assert_eq!(store.get_fingerprint_by_hash("h1").await.unwrap().unwrap(), fp);
        assert_eq!(store.get_fingerprint_by_asset("a").await.unwrap().unwrap(), fp);
        assert!(store.get_fingerprint_by_hash("h2").await.unwrap().is_none());
        assert!(store.delete_fingerprint("h1").await.unwrap());
        assert!(!store.delete_fingerprint("h1").await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_asset_is_insert_if_absent() {
        let store = store().await;
        let first = metadata("first", AssetType::Texture, "ui", &["icon"], 1_000);
        let second = metadata("second", AssetType::Texture, "ui", &["icon"], 2_000);
        let outcome = store.insert_asset(&first, b"png", &fingerprint("same", "first")).await.unwrap();
        assert_eq!(outcome, Insertion::Inserted);
        let outcome = store.insert_asset(&second, b"png", &fingerprint("same", "second")).await.unwrap();
        let Insertion::Existing(existing) = outcome else { panic!("expected existing fingerprint") };
        assert_eq!(existing.asset_id, "first");
        // The rolled back transaction left nothing behind.
        assert!(store.get_metadata("second").await.unwrap().is_none());
        assert!(store.get_file("second").await.unwrap().is_none());
        let counts = store.counts().await.unwrap();
        assert_eq!(counts, StoreCounts { metadata: 1, files: 1, fingerprints: 1, total_bytes: 3 });
    }

    #[tokio::test]
    async fn test_delete_asset_removes_everything() {
        let store = store().await;
        let a = metadata("a", AssetType::Model, "props", &["crate"], 1_000);
        store.insert_asset(&a, b"glb", &fingerprint("ha", "a")).await.unwrap();
        assert!(store.delete_asset("a").await.unwrap());
        assert!(store.get_metadata("a").await.unwrap().is_none());
        assert!(store.get_file("a").await.unwrap().is_none());
        assert!(store.get_fingerprint_by_hash("ha").await.unwrap().is_none());
        assert!(store.get_metadata_by_tag("crate").await.unwrap().is_empty());
        assert!(!store.delete_asset("a").await.unwrap());
        assert_eq!(store.counts().await.unwrap(), StoreCounts::default());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = store().await;
        for id in ["a", "b"] {
            let m = metadata(id, AssetType::Hdr, "sky", &["outdoor"], 1_000);
            store.insert_asset(&m, id.as_bytes(), &fingerprint(id, id)).await.unwrap();
        }
        store.clear().await.unwrap();
        assert_eq!(store.counts().await.unwrap(), StoreCounts::default());
    }

    #[tokio::test]
    async fn test_survives_restart() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("assets.db");
        let a = metadata("a", AssetType::Audio, "music", &["theme"], 5_000);
        {
            let store = Store::open(&path);
            store.initialize().await.unwrap();
            store.insert_asset(&a, b"ogg", &fingerprint("hash-a", "a")).await.unwrap();
            store.close().await;
        }
        let store = Store::open(&path);
        store.initialize().await.unwrap();
        assert_eq!(store.get_metadata("a").await.unwrap().unwrap(), a);
        assert_eq!(store.get_file("a").await.unwrap().unwrap(), b"ogg");
        assert_eq!(store.get_fingerprint_by_asset("a").await.unwrap().unwrap().hash, "hash-a");
    }
}
