use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use futures_locks::RwLock;
use tracing::{debug, info};

use crate::codec;
use crate::schema::Schema;
use crate::storage::{AtomicStorage, StorageProvider};
use crate::transaction::{Transaction, TransactionMode, WorkGuard};
use crate::upgrade::VersionChange;
use crate::OpenError;

/// Opens named databases from a [`StorageProvider`].
///
/// All connections to the same name that were opened through one factory share a scheduler: any
/// number of read-only transactions may run together, a read-write transaction or a schema
/// upgrade runs alone.
#[derive(Clone)]
pub struct Factory {
    provider: StorageProvider,
    registry: Arc<Mutex<HashMap<String, RegistryEntry>>>,
}

struct RegistryEntry {
    lock: RwLock<()>,
    /// Connections that finished opening and are not closed yet
    connections: usize,
}

/// One open connection, released by [`ConnectionGuard::drop`]
struct ConnectionGuard {
    registry: Arc<Mutex<HashMap<String, RegistryEntry>>>,
    name: String,
}

/// Connection to a named database. Clones share the connection, it is closed when the last clone
/// is dropped or [`Database::close`] is called on it.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    name: String,
    version: u32,
    schema: Arc<Schema>,
    storage: AtomicStorage,
    lock: RwLock<()>,
    _connection: ConnectionGuard,
}

impl Factory {
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            registry: Default::default(),
        }
    }

    /// Opens `name` at `version`, creating it if needed.
    ///
    /// `upgrade` runs only if the stored version is older than `version` (a missing database has
    /// version 0), and then exactly once. Its schema edits are stored together with the new
    /// version; if it fails nothing is stored.
    pub async fn open<F>(&self, name: &str, version: u32, upgrade: F) -> Result<Database, OpenError>
    where
        F: FnOnce(&mut VersionChange) -> anyhow::Result<()>,
    {
        if version == 0 {
            return Err(OpenError::InvalidVersion);
        }

        let lock = self.scheduler(name);

        let storage = self
            .provider
            .open_storage(name)
            .await
            .map_err(|cause| OpenError::Unavailable {
                name: name.to_owned(),
                cause,
            })?;

        // Waits for transactions of other connections to finish
        let exclusive = lock.write().await;

        let stored_version = read_version(&storage)
            .await
            .map_err(|cause| storage_error(name, cause))?;
        let stored_schema = read_schema(&storage)
            .await
            .map_err(|cause| storage_error(name, cause))?;

        if stored_version > version {
            return Err(OpenError::VersionTooLow {
                name: name.to_owned(),
                requested: version,
                stored: stored_version,
            });
        }

        let (connection, schema) = if stored_version < version {
            let connections = self.connections(name);
            if connections != 0 {
                return Err(OpenError::Blocked {
                    name: name.to_owned(),
                    connections,
                });
            }
            // Counted before the lock is released, so a later upgrade sees this connection
            let connection = self.connect(name);
            info!(
                "Upgrading database {} from version {} to {}",
                name, stored_version, version
            );
            let schema = run_upgrade(
                storage.clone(),
                stored_version,
                version,
                stored_schema,
                upgrade,
                WorkGuard::Exclusive { _guard: exclusive },
            )
            .await
            .map_err(|cause| OpenError::UpgradeAborted {
                name: name.to_owned(),
                cause,
            })?;
            (connection, schema)
        } else {
            let connection = self.connect(name);
            drop(exclusive);
            (connection, stored_schema)
        };

        debug!("Opened database {} at version {}", name, version);
        Ok(Database {
            inner: Arc::new(DatabaseInner {
                name: name.to_owned(),
                version,
                schema: Arc::new(schema),
                storage,
                lock,
                _connection: connection,
            }),
        })
    }

    /// Deletes `name` and all its data. Fails with [`OpenError::Blocked`] while connections to it
    /// are open.
    pub async fn delete_database(&self, name: &str) -> Result<(), OpenError> {
        let lock = self.scheduler(name);
        let _exclusive = lock.write().await;

        let connections = self.connections(name);
        if connections != 0 {
            return Err(OpenError::Blocked {
                name: name.to_owned(),
                connections,
            });
        }

        self.provider
            .delete_storage(name)
            .await
            .map_err(|cause| storage_error(name, cause))?;

        info!("Deleted database {}", name);
        Ok(())
    }

    /// Number of connections to `name` that got past the version check and are not closed yet
    pub fn connections(&self, name: &str) -> usize {
        self.registry
            .lock()
            .expect("poisoned")
            .get(name)
            .map_or(0, |entry| entry.connections)
    }

    fn scheduler(&self, name: &str) -> RwLock<()> {
        self.registry
            .lock()
            .expect("poisoned")
            .entry(name.to_owned())
            .or_insert_with(|| RegistryEntry {
                lock: RwLock::new(()),
                connections: 0,
            })
            .lock
            .clone()
    }

    /// Counts an opened connection to `name`, which must hold the exclusive lock of `name`
    fn connect(&self, name: &str) -> ConnectionGuard {
        let mut registry = self.registry.lock().expect("poisoned");
        if let Some(entry) = registry.get_mut(name) {
            entry.connections += 1;
        }
        ConnectionGuard {
            registry: self.registry.clone(),
            name: name.to_owned(),
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let mut registry = self.registry.lock().expect("poisoned");
        if let Some(entry) = registry.get_mut(&self.name) {
            entry.connections = entry.connections.saturating_sub(1);
        }
    }
}

async fn run_upgrade<F>(
    storage: AtomicStorage,
    old_version: u32,
    new_version: u32,
    old_schema: Schema,
    upgrade: F,
    guard: WorkGuard,
) -> anyhow::Result<Schema>
where
    F: FnOnce(&mut VersionChange) -> anyhow::Result<()>,
{
    let mut change = VersionChange::new(old_version, new_version, old_schema.clone());
    upgrade(&mut change).context("upgrade callback failed")?;
    let (new_schema, changes) = change.into_schema();

    let new_schema = Arc::new(new_schema);
    let tx = Transaction::new(storage, new_schema.clone(), TransactionMode::ReadWrite, guard);
    changes.apply(&tx, &old_schema, &new_schema).await?;
    tx.set(
        codec::schema_key(),
        serde_json::to_vec(new_schema.as_ref()).context("serializing schema")?,
    );
    tx.set(codec::version_key(), new_version.to_be_bytes().to_vec());
    tx.commit().await?;

    Ok(Arc::unwrap_or_clone(new_schema))
}

async fn read_version(storage: &AtomicStorage) -> anyhow::Result<u32> {
    let Some(raw) = storage.get(&codec::version_key()).await? else {
        return Ok(0);
    };
    let bytes = <[u8; 4]>::try_from(raw.as_slice())
        .map_err(|_| anyhow::anyhow!("stored version has {} bytes", raw.len()))?;
    Ok(u32::from_be_bytes(bytes))
}

async fn read_schema(storage: &AtomicStorage) -> anyhow::Result<Schema> {
    match storage.get(&codec::schema_key()).await? {
        Some(raw) => serde_json::from_slice(&raw).context("decoding stored schema"),
        None => Ok(Schema::default()),
    }
}

fn storage_error(name: &str, cause: anyhow::Error) -> OpenError {
    OpenError::Storage {
        name: name.to_owned(),
        cause,
    }
}

impl Database {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn version(&self) -> u32 {
        self.inner.version
    }

    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// Starts a unit of work, waiting until the scheduler admits it
    pub async fn transaction(&self, mode: TransactionMode) -> Transaction {
        let guard = match mode {
            TransactionMode::ReadOnly => WorkGuard::Shared {
                _guard: self.inner.lock.read().await,
            },
            TransactionMode::ReadWrite => WorkGuard::Exclusive {
                _guard: self.inner.lock.write().await,
            },
        };
        Transaction::new(
            self.inner.storage.clone(),
            self.inner.schema.clone(),
            mode,
            guard,
        )
    }

    /// Releases this handle. Running transactions keep the storage until they finish.
    pub fn close(self) {
        debug!("Closing connection to {}", self.inner.name);
    }
}
