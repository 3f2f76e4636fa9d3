//! Snapshot cache repository implementation

use std::sync::Arc;

use crate::error::Result;
use crate::util::unix_timestamp_millis_now;
use libsql::Connection;
use tokio::sync::Mutex;

use super::connection::Database;

/// Fixed cache key under which the message snapshot is stored
pub const MESSAGES_CACHE_KEY: &str = "messages";

/// Trait for scoped key-value snapshot storage (async)
#[allow(async_fn_in_trait)]
pub trait SnapshotRepository {
    /// Load the cached entry for `key`, if one exists
    async fn load(&self, key: &str) -> Result<Option<String>>;

    /// Save `value` under `key`, overwriting any prior entry
    async fn save(&self, key: &str, value: &str) -> Result<()>;

    /// Remove the entry for `key` (absent entries are not an error)
    async fn clear(&self, key: &str) -> Result<()>;
}

/// libSQL implementation of `SnapshotRepository`
pub struct LibSqlSnapshotRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSnapshotRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SnapshotRepository for LibSqlSnapshotRepository<'_> {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM cache WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let updated_at = unix_timestamp_millis_now().to_string();
        self.conn
            .execute(
                "INSERT OR REPLACE INTO cache (key, value, updated_at) VALUES (?, ?, ?)",
                [key, value, updated_at.as_str()],
            )
            .await?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM cache WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}

/// Owned `SnapshotRepository` over a shared database handle.
///
/// The database is opened once and shared; each operation borrows a
/// connection-scoped repository.
#[derive(Clone)]
pub struct SharedSnapshotRepository {
    db: Arc<Mutex<Database>>,
}

impl SharedSnapshotRepository {
    /// Wrap an already-opened database
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    /// Open an in-memory cache (useful for tests)
    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }
}

impl SnapshotRepository for SharedSnapshotRepository {
    async fn load(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock().await;
        LibSqlSnapshotRepository::new(db.connection()).load(key).await
    }

    async fn save(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSnapshotRepository::new(db.connection())
            .save(key, value)
            .await
    }

    async fn clear(&self, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSnapshotRepository::new(db.connection()).clear(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_absent_entry() {
        let db = setup().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());

        let loaded = repo.load(MESSAGES_CACHE_KEY).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_and_load_roundtrip() {
        let db = setup().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());

        repo.save(MESSAGES_CACHE_KEY, "[]").await.unwrap();
        let loaded = repo.load(MESSAGES_CACHE_KEY).await.unwrap();
        assert_eq!(loaded.as_deref(), Some("[]"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_overwrites_prior_entry() {
        let db = setup().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());

        repo.save(MESSAGES_CACHE_KEY, "first").await.unwrap();
        repo.save(MESSAGES_CACHE_KEY, "second").await.unwrap();

        let loaded = repo.load(MESSAGES_CACHE_KEY).await.unwrap();
        assert_eq!(loaded.as_deref(), Some("second"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_removes_entry() {
        let db = setup().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());

        repo.save(MESSAGES_CACHE_KEY, "payload").await.unwrap();
        repo.clear(MESSAGES_CACHE_KEY).await.unwrap();

        let loaded = repo.load(MESSAGES_CACHE_KEY).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_clear_absent_entry_is_ok() {
        let db = setup().await;
        let repo = LibSqlSnapshotRepository::new(db.connection());

        repo.clear(MESSAGES_CACHE_KEY).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_shared_repository_roundtrip() {
        let repo = SharedSnapshotRepository::open_in_memory().await.unwrap();

        repo.save(MESSAGES_CACHE_KEY, "[1,2,3]").await.unwrap();
        let loaded = repo.load(MESSAGES_CACHE_KEY).await.unwrap();
        assert_eq!(loaded.as_deref(), Some("[1,2,3]"));

        repo.clear(MESSAGES_CACHE_KEY).await.unwrap();
        assert!(repo.load(MESSAGES_CACHE_KEY).await.unwrap().is_none());
    }
}
