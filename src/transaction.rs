use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use futures_locks::{RwLockReadGuard, RwLockWriteGuard};
use itertools::{merge_join_by, EitherOrBoth};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::codec;
use crate::schema::{CollectionSchema, IndexSchema, Schema};
use crate::storage::AtomicStorage;
use crate::{Error, Key, KeyPath, KeyRef, KeyValue, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

/// Keeps other units of work out while a transaction is alive
pub(crate) enum WorkGuard {
    Shared { _guard: RwLockReadGuard<()> },
    Exclusive { _guard: RwLockWriteGuard<()> },
}

/// A unit of work over one database.
///
/// Writes are buffered and only reach the storage, in one atomic batch, on [`Transaction::commit`].
/// Reads see the buffered writes. Dropping the transaction without committing discards them.
pub struct Transaction {
    storage: AtomicStorage,
    schema: Arc<Schema>,
    mode: TransactionMode,
    changes: Mutex<BTreeMap<Key, Option<Value>>>,
    guard: WorkGuard,
}

impl Transaction {
    pub(crate) fn new(
        storage: AtomicStorage,
        schema: Arc<Schema>,
        mode: TransactionMode,
        guard: WorkGuard,
    ) -> Self {
        Self {
            storage,
            schema,
            mode,
            changes: Default::default(),
            guard,
        }
    }

    pub fn mode(&self) -> TransactionMode {
        self.mode
    }

    pub fn collection(&self, name: &str) -> anyhow::Result<Collection<'_>> {
        let (name, schema) = self
            .schema
            .collections
            .get_key_value(name)
            .ok_or_else(|| Error::UnknownCollection(name.to_owned()))?;
        Ok(Collection {
            tx: self,
            name,
            schema,
        })
    }

    pub async fn commit(self) -> anyhow::Result<()> {
        let Transaction {
            storage,
            changes,
            guard,
            ..
        } = self;
        let changes = changes.into_inner().expect("poisoned");

        if changes.is_empty() {
            // Nothing was written, so there is nothing to make durable
            return Ok(());
        }

        debug!("Committing {} changes", changes.len());
        let result = storage.write_atomically(changes.into_iter().collect()).await;
        drop(guard);
        result
    }

    /// Discards all buffered writes. Same as dropping the transaction.
    pub fn abort(self) {
        debug!(
            "Aborting transaction with {} changes",
            self.changes.lock().expect("poisoned").len()
        );
    }

    fn ensure_writable(&self) -> Result<(), Error> {
        match self.mode {
            TransactionMode::ReadOnly => Err(Error::ReadOnly),
            TransactionMode::ReadWrite => Ok(()),
        }
    }

    pub(crate) async fn get_raw(&self, key: KeyRef<'_>) -> anyhow::Result<Option<Value>> {
        let buffered = self.changes.lock().expect("poisoned").get(key).cloned();
        match buffered {
            Some(value) => Ok(value),
            None => self.storage.get(key).await,
        }
    }

    pub(crate) async fn find_by_prefix(&self, prefix: &[u8]) -> anyhow::Result<Vec<(Key, Value)>> {
        let buffered = self
            .changes
            .lock()
            .expect("poisoned")
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, maybe_value)| (key.clone(), maybe_value.clone()))
            .collect::<Vec<_>>();

        let stored = self.storage.find_by_prefix(prefix).await?;

        let result = merge_join_by(buffered, stored, |(key1, _), (key2, _)| key1.cmp(key2))
            .filter_map(|either| match either {
                // Buffered writes shadow the storage, a buffered `None` is a pending delete
                EitherOrBoth::Left((key, maybe_value)) => maybe_value.map(|value| (key, value)),
                EitherOrBoth::Right(entry) => Some(entry),
                EitherOrBoth::Both((key, maybe_value), _stored) => {
                    maybe_value.map(|value| (key, value))
                }
            })
            .collect::<Vec<_>>();

        Ok(result)
    }

    pub(crate) fn set(&self, key: Key, value: Value) {
        self.changes.lock().expect("poisoned").insert(key, Some(value));
    }

    pub(crate) fn delete(&self, key: Key) {
        self.changes.lock().expect("poisoned").insert(key, None);
    }

    pub(crate) async fn delete_by_prefix(&self, prefix: &[u8]) -> anyhow::Result<usize> {
        let entries = self.find_by_prefix(prefix).await?;
        let deleted = entries.len();
        for (key, _) in entries {
            self.delete(key);
        }
        Ok(deleted)
    }
}

/// A collection of records, as seen from inside one [`Transaction`]
#[derive(Clone, Copy)]
pub struct Collection<'a> {
    tx: &'a Transaction,
    name: &'a str,
    schema: &'a CollectionSchema,
}

impl<'a> Collection<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn key_path(&self) -> &'a KeyPath {
        &self.schema.key_path
    }

    pub fn index(&self, name: &str) -> anyhow::Result<Index<'a>> {
        let (name, schema) = self.schema.indexes.get_key_value(name).ok_or_else(|| {
            Error::UnknownIndex {
                collection: self.name.to_owned(),
                index: name.to_owned(),
            }
        })?;
        Ok(Index {
            collection: *self,
            name,
            schema,
        })
    }

    /// Inserts `record` or overwrites the record with the same primary key. Returns the key.
    pub async fn put<T: Serialize>(&self, record: &T) -> anyhow::Result<KeyValue> {
        self.write(record, false).await
    }

    /// Like [`Collection::put`], but fails with [`Error::KeyExists`] instead of overwriting
    pub async fn add<T: Serialize>(&self, record: &T) -> anyhow::Result<KeyValue> {
        self.write(record, true).await
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        key: impl Into<KeyValue>,
    ) -> anyhow::Result<Option<T>> {
        let data_key = codec::data_key(self.name, &codec::encode_key(&key.into()));
        self.tx
            .get_raw(&data_key)
            .await?
            .map(|raw| decode_record(&raw))
            .transpose()
    }

    /// All records, ordered by primary key
    pub async fn get_all<T: DeserializeOwned>(&self) -> anyhow::Result<Vec<T>> {
        self.tx
            .find_by_prefix(&codec::data_prefix(self.name))
            .await?
            .iter()
            .map(|(_key, raw)| decode_record(raw))
            .collect()
    }

    pub async fn count(&self) -> anyhow::Result<usize> {
        Ok(self
            .tx
            .find_by_prefix(&codec::data_prefix(self.name))
            .await?
            .len())
    }

    /// Removes the record with `key` and its index entries. Returns whether a record existed.
    pub async fn delete(&self, key: impl Into<KeyValue>) -> anyhow::Result<bool> {
        self.tx.ensure_writable()?;
        let encoded_primary_key = codec::encode_key(&key.into());
        let data_key = codec::data_key(self.name, &encoded_primary_key);

        let Some(raw) = self.tx.get_raw(&data_key).await? else {
            return Ok(false);
        };
        let previous = decode_record::<serde_json::Value>(&raw)?;
        for (index_name, _index, index_key) in self.index_keys(&previous) {
            self.tx.delete(codec::index_entry_key(
                self.name,
                index_name,
                &index_key,
                &encoded_primary_key,
            ));
        }
        self.tx.delete(data_key);
        Ok(true)
    }

    /// Removes all records and index entries
    pub async fn clear(&self) -> anyhow::Result<()> {
        self.tx.ensure_writable()?;
        self.tx
            .delete_by_prefix(&codec::data_prefix(self.name))
            .await?;
        self.tx
            .delete_by_prefix(&codec::collection_index_prefix(self.name))
            .await?;
        Ok(())
    }

    async fn write<T: Serialize>(&self, record: &T, insert_only: bool) -> anyhow::Result<KeyValue> {
        self.tx.ensure_writable()?;

        let record = serde_json::to_value(record).context("serializing record")?;
        let primary_key = self
            .schema
            .key_path
            .extract(&record)
            .ok_or_else(|| Error::MissingKey(self.schema.key_path.to_string()))?;
        let encoded_primary_key = codec::encode_key(&primary_key);
        let data_key = codec::data_key(self.name, &encoded_primary_key);

        let previous = self
            .tx
            .get_raw(&data_key)
            .await?
            .map(|raw| decode_record::<serde_json::Value>(&raw))
            .transpose()?;
        if insert_only && previous.is_some() {
            return Err(Error::KeyExists {
                collection: self.name.to_owned(),
                key: primary_key.to_string(),
            }
            .into());
        }

        // All checks happen before the first buffered write, so a failed write changes nothing
        let index_keys = self.index_keys(&record);
        for (index_name, index, index_key) in &index_keys {
            if index.unique {
                self.check_unique(index_name, index_key, &encoded_primary_key)
                    .await?;
            }
        }
        let encoded_record = serde_json::to_vec(&record).context("serializing record")?;

        if let Some(previous) = previous {
            for (index_name, _index, index_key) in self.index_keys(&previous) {
                self.tx.delete(codec::index_entry_key(
                    self.name,
                    index_name,
                    &index_key,
                    &encoded_primary_key,
                ));
            }
        }
        for (index_name, _index, index_key) in index_keys {
            self.tx.set(
                codec::index_entry_key(self.name, index_name, &index_key, &encoded_primary_key),
                encoded_primary_key.clone(),
            );
        }
        self.tx.set(data_key, encoded_record);

        Ok(primary_key)
    }

    /// Entries `record` has in each index. Records without a valid key at an index's key path are
    /// not part of that index.
    fn index_keys(&self, record: &serde_json::Value) -> Vec<(&'a str, &'a IndexSchema, KeyValue)> {
        self.schema
            .indexes
            .iter()
            .filter_map(|(name, index)| {
                index
                    .key_path
                    .extract(record)
                    .map(|index_key| (name.as_str(), index, index_key))
            })
            .collect()
    }

    async fn check_unique(
        &self,
        index_name: &str,
        index_key: &KeyValue,
        encoded_primary_key: &[u8],
    ) -> anyhow::Result<()> {
        let prefix = codec::index_key_prefix(self.name, index_name, index_key);
        let entries = self.tx.find_by_prefix(&prefix).await?;
        if entries
            .iter()
            .any(|(_key, primary_key)| primary_key.as_slice() != encoded_primary_key)
        {
            return Err(Error::ConstraintViolation {
                index: index_name.to_owned(),
                key: index_key.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Rebuilds the entries of `index_name` from the stored records.
    pub(crate) async fn backfill_index(&self, index_name: &str) -> anyhow::Result<usize> {
        let index = self.index(index_name)?;
        let records = self
            .tx
            .find_by_prefix(&codec::data_prefix(self.name))
            .await?;
        let data_prefix_len = codec::data_prefix(self.name).len();

        let mut seen = HashSet::new();
        let mut indexed = 0;
        for (data_key, raw) in records {
            let record = decode_record::<serde_json::Value>(&raw)?;
            let Some(index_key) = index.schema.key_path.extract(&record) else {
                continue;
            };
            if index.schema.unique && !seen.insert(codec::encode_key(&index_key)) {
                return Err(Error::ConstraintViolation {
                    index: index_name.to_owned(),
                    key: index_key.to_string(),
                }
                .into());
            }
            let encoded_primary_key = data_key[data_prefix_len..].to_vec();
            self.tx.set(
                codec::index_entry_key(self.name, index_name, &index_key, &encoded_primary_key),
                encoded_primary_key,
            );
            indexed += 1;
        }
        Ok(indexed)
    }
}

/// A secondary index of a [`Collection`]
#[derive(Clone, Copy)]
pub struct Index<'a> {
    collection: Collection<'a>,
    name: &'a str,
    schema: &'a IndexSchema,
}

impl<'a> Index<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn key_path(&self) -> &'a KeyPath {
        &self.schema.key_path
    }

    pub fn is_unique(&self) -> bool {
        self.schema.unique
    }

    /// The first record whose index key equals `key`, in primary key order
    pub async fn get<T: DeserializeOwned>(
        &self,
        key: impl Into<KeyValue>,
    ) -> anyhow::Result<Option<T>> {
        let mut records = self.records(&key.into(), Some(1)).await?;
        Ok(records.pop())
    }

    /// All records whose index key equals `key`, in primary key order
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        key: impl Into<KeyValue>,
    ) -> anyhow::Result<Vec<T>> {
        self.records(&key.into(), None).await
    }

    pub async fn count(&self, key: impl Into<KeyValue>) -> anyhow::Result<usize> {
        Ok(self.entries(&key.into()).await?.len())
    }

    async fn entries(&self, key: &KeyValue) -> anyhow::Result<Vec<(Key, Value)>> {
        let prefix = codec::index_key_prefix(self.collection.name, self.name, key);
        self.collection.tx.find_by_prefix(&prefix).await
    }

    async fn records<T: DeserializeOwned>(
        &self,
        key: &KeyValue,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<T>> {
        let entries = self.entries(key).await?;
        let mut records = Vec::new();
        for (_entry_key, encoded_primary_key) in entries.into_iter().take(limit.unwrap_or(usize::MAX))
        {
            let data_key = codec::data_key(self.collection.name, &encoded_primary_key);
            let raw = self
                .collection
                .tx
                .get_raw(&data_key)
                .await?
                .with_context(|| {
                    format!(
                        "index {:?} points at a missing record, storage corrupted",
                        self.name
                    )
                })?;
            records.push(decode_record(&raw)?);
        }
        Ok(records)
    }
}

fn decode_record<T: DeserializeOwned>(raw: &[u8]) -> anyhow::Result<T> {
    serde_json::from_slice(raw).context("decoding stored record")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::future::join_all;
    use serde::{Deserialize, Serialize};

    use crate::{Error, Factory, IndexOptions, KeyPath, MemProvider, TransactionMode};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Car {
        id: u32,
        colour: String,
        make: String,
    }

    fn car(id: u32, colour: &str, make: &str) -> Car {
        Car {
            id,
            colour: colour.to_owned(),
            make: make.to_owned(),
        }
    }

    async fn open_garage(factory: &Factory) -> crate::Database {
        factory
            .open("garage", 1, |change| {
                change
                    .create_collection("cars", "id")?
                    .create_index("by_colour", "colour", IndexOptions::default())?
                    .create_index("by_make", "make", IndexOptions::unique())?;
                Ok(())
            })
            .await
            .unwrap()
    }

    fn downcast(err: &anyhow::Error) -> &Error {
        err.downcast_ref::<Error>().expect("data-level error")
    }

    #[tokio::test]
    async fn test_reads_see_own_writes_and_commit_publishes_them() {
        let factory = Factory::new(Arc::new(MemProvider::default()));
        let db = open_garage(&factory).await;

        let tx = db.transaction(TransactionMode::ReadWrite).await;
        let cars = tx.collection("cars").unwrap();
        cars.put(&car(1, "Red", "Toyota")).await.unwrap();
        cars.put(&car(2, "Red", "Kia")).await.unwrap();

        assert_eq!(
            cars.get::<Car>(1).await.unwrap(),
            Some(car(1, "Red", "Toyota"))
        );
        assert_eq!(cars.count().await.unwrap(), 2);
        assert_eq!(
            cars.index("by_colour")
                .unwrap()
                .get_all::<Car>("Red")
                .await
                .unwrap()
                .len(),
            2
        );
        tx.commit().await.unwrap();

        let tx = db.transaction(TransactionMode::ReadOnly).await;
        let cars = tx.collection("cars").unwrap();
        assert_eq!(
            cars.get_all::<Car>().await.unwrap(),
            vec![car(1, "Red", "Toyota"), car(2, "Red", "Kia")]
        );
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let factory = Factory::new(Arc::new(MemProvider::default()));
        let db = open_garage(&factory).await;

        let tx = db.transaction(TransactionMode::ReadWrite).await;
        tx.collection("cars")
            .unwrap()
            .put(&car(1, "Red", "Toyota"))
            .await
            .unwrap();
        tx.abort();

        let tx = db.transaction(TransactionMode::ReadWrite).await;
        tx.collection("cars")
            .unwrap()
            .put(&car(2, "Red", "Kia"))
            .await
            .unwrap();
        drop(tx);

        let tx = db.transaction(TransactionMode::ReadOnly).await;
        let cars = tx.collection("cars").unwrap();
        assert_eq!(cars.count().await.unwrap(), 0);
        assert_eq!(
            cars.index("by_colour")
                .unwrap()
                .count("Red")
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_read_only_rejects_writes() {
        let factory = Factory::new(Arc::new(MemProvider::default()));
        let db = open_garage(&factory).await;

        let tx = db.transaction(TransactionMode::ReadOnly).await;
        assert_eq!(tx.mode(), TransactionMode::ReadOnly);
        let cars = tx.collection("cars").unwrap();
        let err = cars.put(&car(1, "Red", "Toyota")).await.unwrap_err();
        assert_eq!(downcast(&err), &Error::ReadOnly);
        let err = cars.delete(1).await.unwrap_err();
        assert_eq!(downcast(&err), &Error::ReadOnly);
    }

    #[tokio::test]
    async fn test_unknown_names() {
        let factory = Factory::new(Arc::new(MemProvider::default()));
        let db = open_garage(&factory).await;
        let tx = db.transaction(TransactionMode::ReadOnly).await;

        let err = tx.collection("bikes").err().unwrap();
        assert_eq!(downcast(&err), &Error::UnknownCollection("bikes".into()));

        let cars = tx.collection("cars").unwrap();
        assert_eq!(cars.name(), "cars");
        assert_eq!(cars.key_path(), &KeyPath::from("id"));
        let by_make = cars.index("by_make").unwrap();
        assert_eq!(by_make.name(), "by_make");
        assert_eq!(by_make.key_path(), &KeyPath::from("make"));
        assert!(by_make.is_unique());
        assert!(!cars.index("by_colour").unwrap().is_unique());

        let err = tx.collection("cars").unwrap().index("by_year").err().unwrap();
        assert_eq!(
            downcast(&err),
            &Error::UnknownIndex {
                collection: "cars".into(),
                index: "by_year".into()
            }
        );
    }

    #[tokio::test]
    async fn test_put_overwrites_and_moves_index_entries() {
        let factory = Factory::new(Arc::new(MemProvider::default()));
        let db = open_garage(&factory).await;

        let tx = db.transaction(TransactionMode::ReadWrite).await;
        let cars = tx.collection("cars").unwrap();
        cars.put(&car(1, "Red", "Toyota")).await.unwrap();
        tx.commit().await.unwrap();

        let tx = db.transaction(TransactionMode::ReadWrite).await;
        let cars = tx.collection("cars").unwrap();
        cars.put(&car(1, "Green", "Toyota")).await.unwrap();
        tx.commit().await.unwrap();

        let tx = db.transaction(TransactionMode::ReadOnly).await;
        let cars = tx.collection("cars").unwrap();
        let by_colour = cars.index("by_colour").unwrap();
        assert_eq!(cars.count().await.unwrap(), 1);
        assert_eq!(
            cars.get::<Car>(1).await.unwrap(),
            Some(car(1, "Green", "Toyota"))
        );
        assert!(by_colour.get_all::<Car>("Red").await.unwrap().is_empty());
        assert_eq!(
            by_colour.get::<Car>("Green").await.unwrap(),
            Some(car(1, "Green", "Toyota"))
        );
    }

    #[tokio::test]
    async fn test_delete_removes_index_entries() {
        let factory = Factory::new(Arc::new(MemProvider::default()));
        let db = open_garage(&factory).await;

        let tx = db.transaction(TransactionMode::ReadWrite).await;
        let cars = tx.collection("cars").unwrap();
        cars.put(&car(1, "Red", "Toyota")).await.unwrap();
        cars.put(&car(2, "Red", "Kia")).await.unwrap();
        tx.commit().await.unwrap();

        let tx = db.transaction(TransactionMode::ReadWrite).await;
        let cars = tx.collection("cars").unwrap();
        assert!(cars.delete(1).await.unwrap());
        assert!(!cars.delete(1).await.unwrap());
        let by_colour = cars.index("by_colour").unwrap();
        assert_eq!(
            by_colour.get_all::<Car>("Red").await.unwrap(),
            vec![car(2, "Red", "Kia")]
        );

        cars.clear().await.unwrap();
        assert_eq!(cars.count().await.unwrap(), 0);
        assert_eq!(by_colour.count("Red").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_and_unique_constraints() {
        let factory = Factory::new(Arc::new(MemProvider::default()));
        let db = open_garage(&factory).await;

        let tx = db.transaction(TransactionMode::ReadWrite).await;
        let cars = tx.collection("cars").unwrap();
        cars.add(&car(1, "Red", "Toyota")).await.unwrap();

        let err = cars.add(&car(1, "Blue", "Honda")).await.unwrap_err();
        assert!(matches!(downcast(&err), Error::KeyExists { .. }));

        // "by_make" is unique
        let err = cars.put(&car(2, "Blue", "Toyota")).await.unwrap_err();
        assert_eq!(
            downcast(&err),
            &Error::ConstraintViolation {
                index: "by_make".into(),
                key: "\"Toyota\"".into()
            }
        );
        // The failed write left nothing behind
        assert_eq!(cars.get::<Car>(2).await.unwrap(), None);
        assert_eq!(
            cars.index("by_colour")
                .unwrap()
                .count("Blue")
                .await
                .unwrap(),
            0
        );

        // Overwriting the owner of the unique key is fine
        cars.put(&car(1, "Blue", "Toyota")).await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_primary_key() {
        let factory = Factory::new(Arc::new(MemProvider::default()));
        let db = open_garage(&factory).await;

        let tx = db.transaction(TransactionMode::ReadWrite).await;
        let err = tx
            .collection("cars")
            .unwrap()
            .put(&serde_json::json!({"colour": "Red"}))
            .await
            .unwrap_err();
        assert_eq!(downcast(&err), &Error::MissingKey("\"id\"".into()));
    }

    #[tokio::test]
    async fn test_records_without_index_key_are_skipped() {
        let factory = Factory::new(Arc::new(MemProvider::default()));
        let db = open_garage(&factory).await;

        let tx = db.transaction(TransactionMode::ReadWrite).await;
        let cars = tx.collection("cars").unwrap();
        cars.put(&serde_json::json!({"id": 7, "make": "Lada"}))
            .await
            .unwrap();
        assert_eq!(cars.count().await.unwrap(), 1);
        assert_eq!(
            cars.index("by_make").unwrap().count("Lada").await.unwrap(),
            1
        );
    }

    async fn increment_counter(db: &crate::Database) -> anyhow::Result<()> {
        let tx = db.transaction(TransactionMode::ReadWrite).await;
        let counters = tx.collection("counters")?;
        let value = counters
            .get::<serde_json::Value>("counter")
            .await?
            .and_then(|counter| counter["value"].as_u64())
            .unwrap_or_default();
        counters
            .put(&serde_json::json!({"name": "counter", "value": value + 1}))
            .await?;
        tx.commit().await
    }

    async fn parallel_transactions() {
        const PARALLEL_TRANSACTIONS: u64 = 100;
        let factory = Factory::new(Arc::new(MemProvider::default()));
        let db = factory
            .open("counters", 1, |change| {
                change.create_collection("counters", "name")?;
                Ok(())
            })
            .await
            .unwrap();

        let tasks = (0..PARALLEL_TRANSACTIONS).map(|_| {
            let db = db.clone();
            async move { increment_counter(&db).await.unwrap() }
        });
        join_all(tasks).await;

        let tx = db.transaction(TransactionMode::ReadOnly).await;
        let counter = tx
            .collection("counters")
            .unwrap()
            .get::<serde_json::Value>("counter")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter["value"].as_u64(), Some(PARALLEL_TRANSACTIONS));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_parallel_transactions_mt1() {
        parallel_transactions().await
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_parallel_transactions_st() {
        parallel_transactions().await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_parallel_transactions_mt4() {
        parallel_transactions().await
    }
}
