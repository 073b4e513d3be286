//! Shared connection to the index database
//!
//! A single connection behind a mutex. SQLite allows one writer at a
//! time anyway, and an indexing pass runs in one long transaction.

use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info};

use crate::config::SqliteConfig;
use crate::error::{SqliteError, SqliteResult};
use crate::{functions, schema};

/// Cloneable handle to the index database.
///
/// Opening it registers the custom SQL functions and migrates the schema.
/// Closures given to the `with_*` methods hold the lock and must not call
/// back into the pool.
#[derive(Clone)]
pub struct SqlitePool {
    conn: Arc<Mutex<Connection>>,
    config: SqliteConfig,
}

impl SqlitePool {
    /// Open (or create) the database described by `config`
    pub fn new(config: SqliteConfig) -> SqliteResult<Self> {
        let conn = open(&config)?;

        conn.execute_batch(&pragmas(&config)).map_err(|e| {
            SqliteError::Connection(format!("failed to configure the database: {}", e))
        })?;
        functions::register(&conn)?;
        schema::apply_migrations(&conn)?;

        info!(path = %config.path.display(), "opened note index");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            config,
        })
    }

    /// Private in-memory database
    pub fn memory() -> SqliteResult<Self> {
        Self::new(SqliteConfig::memory())
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Run `f` on the connection without opening a transaction
    pub fn with_connection<F, T>(&self, f: F) -> SqliteResult<T>
    where
        F: FnOnce(&Connection) -> SqliteResult<T>,
    {
        f(&self.conn.lock())
    }

    /// Run `f` in a write transaction, committed when it returns `Ok`.
    ///
    /// The write lock is taken upfront so that concurrent writers wait on
    /// `busy_timeout` instead of failing midway.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<SqliteError>,
    {
        self.transaction(TransactionBehavior::Immediate, f)
    }

    /// Run `f` in a read transaction, on a consistent snapshot
    pub fn with_read_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<SqliteError>,
    {
        self.transaction(TransactionBehavior::Deferred, f)
    }

    fn transaction<F, T, E>(&self, behavior: TransactionBehavior, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<SqliteError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(behavior)
            .map_err(SqliteError::from)?;

        // Dropped without commit on error, which rolls back
        let value = f(&tx)?;
        tx.commit().map_err(SqliteError::from)?;
        Ok(value)
    }
}

fn open(config: &SqliteConfig) -> SqliteResult<Connection> {
    if config.is_memory() {
        return Ok(Connection::open_in_memory()?);
    }

    if let Some(dir) = config.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| {
            SqliteError::Connection(format!("{}: cannot create directory: {}", dir.display(), e))
        })?;
    }
    Ok(Connection::open(&config.path)?)
}

/// Connection settings as a single batch
fn pragmas(config: &SqliteConfig) -> String {
    // Cascades on note removal need foreign keys
    let mut batch = vec![
        "PRAGMA foreign_keys = ON;".to_string(),
        format!("PRAGMA busy_timeout = {};", config.busy_timeout_ms),
        format!("PRAGMA cache_size = {};", config.cache_size),
        "PRAGMA temp_store = MEMORY;".to_string(),
    ];
    if config.wal_mode && !config.is_memory() {
        batch.push("PRAGMA journal_mode = WAL;".to_string());
        batch.push("PRAGMA synchronous = NORMAL;".to_string());
    }
    if config.mmap_size > 0 {
        batch.push(format!("PRAGMA mmap_size = {};", config.mmap_size));
    }

    debug!(wal = config.wal_mode, "configuring connection");
    batch.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(pool: &SqlitePool, sql: &str) -> i64 {
        pool.with_connection(|conn| Ok(conn.query_row(sql, [], |row| row.get(0))?))
            .unwrap()
    }

    #[test]
    fn test_on_disk_database_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let pool = SqlitePool::new(SqliteConfig::new(dir.path().join("nested/index.db"))).unwrap();

        let mode: String = pool
            .with_connection(|conn| Ok(conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        assert!(dir.path().join("nested/index.db").exists());
    }

    #[test]
    fn test_foreign_keys_are_enabled() {
        let pool = SqlitePool::memory().unwrap();
        assert_eq!(count(&pool, "PRAGMA foreign_keys"), 1);
    }

    #[test]
    fn test_transactions_commit_or_roll_back() {
        let pool = SqlitePool::memory().unwrap();
        let insert = |key: &'static str, fail: bool| {
            pool.with_transaction(|conn| -> SqliteResult<()> {
                conn.execute("INSERT INTO metadata (key, value) VALUES (?1, 'x')", [key])?;
                if fail {
                    return Err(SqliteError::InvalidOperation("abort".into()));
                }
                Ok(())
            })
        };

        insert("kept", false).unwrap();
        assert!(insert("dropped", true).is_err());

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM metadata WHERE key = 'kept'"), 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM metadata WHERE key = 'dropped'"), 0);
    }

    #[test]
    fn test_opening_creates_the_schema() {
        let pool = SqlitePool::memory().unwrap();
        for name in [
            "notes",
            "links",
            "notes_fts",
            "collections",
            "notes_collections",
            "notes_with_metadata",
            "metadata",
            "resolved_links",
        ] {
            let sql = format!("SELECT COUNT(*) FROM sqlite_master WHERE name = '{}'", name);
            assert_eq!(count(&pool, &sql), 1, "missing {}", name);
        }
    }
}
