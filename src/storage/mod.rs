#[cfg(target_family = "wasm")]
pub mod idb;
pub mod memory;
#[cfg(not(target_family = "wasm"))]
pub mod sqlite;

use crate::{async_trait_maybe_send, maybe_add_send_sync, Key, KeyRef, Value};
use macro_rules_attribute::apply;
use std::sync::Arc;

pub type AtomicStorage = Arc<maybe_add_send_sync!(dyn IAtomicStorage)>;

pub type StorageProvider = Arc<maybe_add_send_sync!(dyn IStorageProvider)>;

/// Key-value storage that allows atomic writes
///
/// The interface is designed with IndexedDB in mind, but kept somewhat generic so the object
/// store can run on other engines. Durability is whatever the engine provides.
#[apply(async_trait_maybe_send)]
pub trait IAtomicStorage {
    async fn get(&self, key: KeyRef<'_>) -> anyhow::Result<Option<Value>>;

    /// Returns all entries starting with `prefix`, ordered by key
    async fn find_by_prefix(&self, prefix: &[u8]) -> anyhow::Result<Vec<(Key, Value)>>;

    /// Either all or none of `changes` are applied. `None` deletes the key.
    async fn write_atomically(&self, changes: Vec<(Key, Option<Value>)>) -> anyhow::Result<()>;
}

/// Hands out the storage behind a named database.
///
/// Passed explicitly into [`crate::Factory`], which decides what to do when a storage can't be
/// opened.
#[apply(async_trait_maybe_send)]
pub trait IStorageProvider {
    /// Opens the storage for `name`, creating it empty if it doesn't exist yet
    async fn open_storage(&self, name: &str) -> anyhow::Result<AtomicStorage>;

    /// Deletes the storage for `name`. Deleting a missing storage is not an error.
    async fn delete_storage(&self, name: &str) -> anyhow::Result<()>;
}
