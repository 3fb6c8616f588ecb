use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use tokio::sync::{Mutex, MutexGuard};

const MEMORY_URL: &str = "sqlite::memory:";

const SEQUENCES: &str = "CREATE TABLE IF NOT EXISTS ink_sequences (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
)";

/// `memory://` and SQLite's own in-memory URLs.
pub fn is_memory_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("memory://") || url.starts_with(MEMORY_URL) || url.contains("mode=memory")
}

/// Whether the store can open `url`.
pub fn is_supported_url(url: &str) -> bool {
    is_memory_url(url) || url.trim().starts_with("sqlite:")
}

/// The SQLite pool behind every table.
///
/// Writes go through [`Db::write`], which serialises them so a
/// read-check-write sequence runs against a stable partition.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
}

/// An open write transaction. Dropping it without [`WriteTx::commit`]
/// rolls back.
pub struct WriteTx<'a> {
    tx: Transaction<'static, Sqlite>,
    _guard: MutexGuard<'a, ()>,
}

impl WriteTx<'_> {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

impl Db {
    /// Open the database at `url`, creating the file when missing.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = if is_memory_url(url) {
            // Each connection to :memory: is its own database, so the pool
            // keeps exactly one alive.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(SqliteConnectOptions::from_str(MEMORY_URL)?)
                .await?
        } else {
            let options = SqliteConnectOptions::from_str(url.trim())
                .with_context(|| format!("invalid DATABASE_URL '{url}'"))?
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal);
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options)
                .await
                .with_context(|| format!("cannot open database '{url}'"))?
        };

        sqlx::query(SEQUENCES).execute(&pool).await?;
        tracing::debug!(memory = is_memory_url(url), "database ready");
        Ok(Self {
            pool,
            writer: Arc::new(Mutex::new(())),
        })
    }

    pub async fn in_memory() -> Result<Self> {
        Self::connect(MEMORY_URL).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run a schema statement.
    pub async fn execute(&self, sql: &str) -> Result<()> {
        sqlx::query(sql).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn write(&self) -> Result<WriteTx<'_>> {
        let guard = self.writer.lock().await;
        let tx = self.pool.begin().await?;
        Ok(WriteTx { tx, _guard: guard })
    }
}

/// Next value of the named sequence. Sequences are shared by all tenants.
pub async fn next_id(conn: &mut SqliteConnection, name: &str) -> Result<u64> {
    let value: i64 = sqlx::query_scalar(
        "INSERT INTO ink_sequences (name, value) VALUES (?, 1)
         ON CONFLICT(name) DO UPDATE SET value = value + 1
         RETURNING value",
    )
    .bind(name)
    .fetch_one(conn)
    .await?;
    Ok(u64::try_from(value)?)
}

/// Ids are stored as SQLite integers; one that doesn't fit names no row.
pub fn sql_id(id: u64) -> i64 {
    i64::try_from(id).unwrap_or(-1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_memory_and_sqlite_urls() {
        assert!(is_memory_url("memory://"));
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite:file:x?mode=memory&cache=shared"));
        assert!(!is_memory_url("sqlite://inkwell.db"));
        assert!(is_supported_url("sqlite://inkwell.db"));
        assert!(!is_supported_url("postgres://localhost/ink"));
    }

    #[tokio::test]
    async fn sequences_count_up_per_name() {
        let db = Db::in_memory().await.unwrap();
        let mut tx = db.write().await.unwrap();
        assert_eq!(next_id(tx.conn(), "posts").await.unwrap(), 1);
        assert_eq!(next_id(tx.conn(), "posts").await.unwrap(), 2);
        assert_eq!(next_id(tx.conn(), "tags").await.unwrap(), 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn file_databases_keep_rows_across_pools() {
        let path = std::env::temp_dir().join(format!("inkwell-{}.db", std::process::id()));
        let url = format!("sqlite://{}", path.display());

        let db = Db::connect(&url).await.unwrap();
        let mut tx = db.write().await.unwrap();
        next_id(tx.conn(), "posts").await.unwrap();
        tx.commit().await.unwrap();
        db.pool().close().await;

        let again = Db::connect(&url).await.unwrap();
        let mut tx = again.write().await.unwrap();
        assert_eq!(next_id(tx.conn(), "posts").await.unwrap(), 2);
        drop(tx);
        again.pool().close().await;
        let _ = std::fs::remove_file(&path);
    }
}
