//! Database connection management

use crate::error::Result;
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;

use super::migrations;

/// Database wrapper for the on-device libSQL cache
pub struct Database {
    // Kept alive for the lifetime of the connection
    _db: LibSqlDatabase,
    conn: Connection,
}

impl Database {
    /// Open a local database at the given path, creating it if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path_str).build().await?;
        let conn = db.connect()?;

        let database = Self { _db: db, conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        let conn = db.connect()?;

        let database = Self { _db: db, conn };
        database.configure().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Configure `SQLite` for a small single-writer cache
    async fn configure(&self) -> Result<()> {
        self.conn
            .execute("PRAGMA journal_mode = WAL;", ())
            .await
            .ok(); // In-memory databases may reject WAL
        self.conn
            .execute("PRAGMA synchronous = NORMAL;", ())
            .await
            .ok();
        self.conn.execute("PRAGMA foreign_keys = ON;", ()).await?;
        Ok(())
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_in_memory() {
        let db = Database::open_in_memory().await.unwrap();
        let mut rows = db.connection().query("SELECT 1", ()).await.unwrap();
        let row = rows.next().await.unwrap().unwrap();
        let value: i32 = row.get(0).unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_open_creates_file() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("cache.db");

        let _db = Database::open(&db_path).await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reopen_is_idempotent() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("cache.db");

        drop(Database::open(&db_path).await.unwrap());
        let _db = Database::open(&db_path).await.unwrap();
    }
}
