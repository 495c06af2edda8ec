//! Connection pool setup: options, per-connection PRAGMAs and migrations.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::pool::PoolConnectionMetadata;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{ErrorKind, Result};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// Readers run alongside the single WAL writer.
const MAX_CONNECTIONS: u32 = 4;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    File(PathBuf),
    /// Private to the process and gone once the store is closed.
    Memory,
}

/// An open, migrated connection pool.
#[derive(Debug, Clone)]
pub(crate) struct Database {
    pool: SqlitePool,
}
impl Database {
    #[instrument(level = "debug", name = "opening asset database")]
    pub(crate) async fn open(location: &Location) -> Result<Self> {
        let (options, max_connections) = match location {
            Location::File(path) => (Self::options().filename(path).create_if_missing(true), MAX_CONNECTIONS),
            // Each connection to `:memory:` is its own database, so the pool
            // must never grow past one.
            Location::Memory => (Self::options().filename(":memory:"), 1),
        };
        if let Location::File(path) = location {
            Self::ensure_parent(path)?;
        }
        let pool = SqlitePoolOptions::new()
            // Runs for every pooled connection, not just the first.
            .after_connect(|conn, meta| Box::pin(async move { Self::apply_pragmas(conn, meta).await }))
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Init)?;
        MIGRATOR.run(&pool).await.or_raise(|| ErrorKind::Init)?;
        debug!("migrations applied");
        Ok(Self { pool })
    }

    fn ensure_parent(path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Init)
            },
            _ => Ok(()),
        }
    }

    fn options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            // Batch imports write one asset at a time, but a CLI listing may
            // hold a read transaction meanwhile.
            .busy_timeout(Duration::from_secs(5))
    }

    async fn apply_pragmas(conn: &mut SqliteConnection, _meta: PoolConnectionMetadata) -> sqlx::Result<()> {
        // Blobs are large; keep them out of the page cache where possible.
        sqlx::query(
            r#"
                PRAGMA cache_size = -16384;
                PRAGMA temp_store = MEMORY;
                PRAGMA wal_autocheckpoint = 1000;
                PRAGMA analysis_limit = 400;
            "#,
        )
        .execute(conn)
        .await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Refresh planner statistics, then wait for every connection to be
    /// returned and close them.
    pub(crate) async fn close(self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::open(&Location::Memory).await.unwrap();
        let row: (i64,) = sqlx::query_as("PRAGMA foreign_keys").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 1);
        let row: (i64,) = sqlx::query_as("PRAGMA wal_autocheckpoint").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 1000);
        db.close().await;
    }

    #[tokio::test]
    async fn test_open_file_creates_parents() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/dir/assets.db");
        let db = Database::open(&Location::File(path.clone())).await.unwrap();
        // Migrations are idempotent.
        MIGRATOR.run(db.pool()).await.unwrap();
        db.close().await;
        assert!(path.exists());
    }
}
