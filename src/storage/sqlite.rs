//! SQLite storage, the durable backend on native targets

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use macro_rules_attribute::apply;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::storage::{AtomicStorage, IAtomicStorage, IStorageProvider};
use crate::{async_trait_maybe_send, Key, KeyRef, Value};

const CREATE_KV_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key BLOB PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
) WITHOUT ROWID
"#;

/// One SQLite database holding a single `kv` table. BLOB keys compare with `memcmp`, so SQLite
/// orders them the same way the in-memory storage does.
///
/// Every call runs on tokio's blocking pool, so it must be awaited inside a tokio runtime.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("opening SQLite database {}", path.display()))?;
        Self::initialize(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> anyhow::Result<Self> {
        conn.execute(CREATE_KV_TABLE, [])
            .context("creating kv table")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> anyhow::Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> anyhow::Result<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().expect("poisoned");
            f(&mut conn)
        })
        .await
        .context("SQLite task failed")?
    }
}

#[apply(async_trait_maybe_send)]
impl IAtomicStorage for SqliteStorage {
    async fn get(&self, key: KeyRef<'_>) -> anyhow::Result<Option<Value>> {
        let key = key.to_vec();
        self.with_conn(move |conn| {
            let value = conn
                .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
                .optional()?;
            Ok(value)
        })
        .await
    }

    async fn find_by_prefix(&self, prefix: &[u8]) -> anyhow::Result<Vec<(Key, Value)>> {
        let prefix = prefix.to_vec();
        self.with_conn(move |conn| {
            let mut stmt =
                conn.prepare_cached("SELECT key, value FROM kv WHERE key >= ?1 ORDER BY key")?;
            let mut rows = stmt.query([&prefix])?;

            let mut result = Vec::new();
            while let Some(row) = rows.next()? {
                let key: Key = row.get(0)?;
                if !key.starts_with(&prefix) {
                    break;
                }
                result.push((key, row.get(1)?));
            }
            Ok(result)
        })
        .await
    }

    async fn write_atomically(&self, changes: Vec<(Key, Option<Value>)>) -> anyhow::Result<()> {
        self.with_conn(move |conn| {
            let dbtx = conn.transaction()?;
            for (key, maybe_value) in changes {
                match maybe_value {
                    Some(value) => {
                        dbtx.execute(
                            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                            params![key, value],
                        )?;
                    }
                    None => {
                        dbtx.execute("DELETE FROM kv WHERE key = ?1", [key])?;
                    }
                }
            }
            dbtx.commit().context("committing SQLite transaction")?;
            Ok(())
        })
        .await
    }
}

/// Stores each named database as `<directory>/<name>.sqlite3`.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    directory: PathBuf,
}

impl SqliteProvider {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn database_path(&self, name: &str) -> anyhow::Result<PathBuf> {
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            anyhow::bail!("database name {name:?} can't be used as a file name");
        }
        Ok(self.directory.join(format!("{name}.sqlite3")))
    }
}

#[apply(async_trait_maybe_send)]
impl IStorageProvider for SqliteProvider {
    async fn open_storage(&self, name: &str) -> anyhow::Result<AtomicStorage> {
        let path = self.database_path(name)?;
        if !self.directory.exists() {
            std::fs::create_dir_all(&self.directory).with_context(|| {
                format!("creating database directory {}", self.directory.display())
            })?;
        }
        debug!("Opening SQLite storage {}", path.display());
        let storage: AtomicStorage = Arc::new(SqliteStorage::open(&path)?);
        Ok(storage)
    }

    async fn delete_storage(&self, name: &str) -> anyhow::Result<()> {
        let path = self.database_path(name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("deleting {}", path.display())),
        }
    }
}
