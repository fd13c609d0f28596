use crate::storage::{AtomicStorage, IAtomicStorage, IStorageProvider};
use crate::{async_trait_maybe_send, Key, KeyRef, Value};
use anyhow::Context;
use idb::{KeyRange, ObjectStore, ObjectStoreParams, Query, TransactionMode};
use macro_rules_attribute::apply;
use std::sync::Arc;
use tracing::debug;
use wasm_bindgen::JsValue;

/// Every named database gets one IndexedDB database with a single object store of hex strings.
/// Lower-case hex keeps the byte order of the raw keys.
const STORE_NAME: &str = "kv";
const IDB_VERSION: u32 = 1;

pub struct IdbStorage {
    db: idb::Database,
}

impl IdbStorage {
    pub async fn open(db_name: &str) -> anyhow::Result<Self> {
        let idb_factory = idb::Factory::new().map_err(idb_error_to_anyhow)?;

        let mut db_req = idb_factory
            .open(db_name, Some(IDB_VERSION))
            .map_err(idb_error_to_anyhow)?;

        db_req.on_upgrade_needed(move |vc_event| {
            let Ok(db) = vc_event.database() else {
                tracing::error!("IndexedDB upgrade event without database");
                return;
            };
            let mut object_store_params = ObjectStoreParams::new();
            object_store_params.auto_increment(false);
            if let Err(err) = db.create_object_store(STORE_NAME, object_store_params) {
                tracing::error!("Failed to create object store: {:?}", err);
            }
        });

        let db = db_req.await.map_err(idb_error_to_anyhow)?;

        Ok(Self { db })
    }

    fn store(&self, mode: TransactionMode) -> anyhow::Result<(idb::Transaction, ObjectStore)> {
        let dbtx = self
            .db
            .transaction(&[STORE_NAME], mode)
            .map_err(idb_error_to_anyhow)?;
        let store = dbtx.object_store(STORE_NAME).map_err(idb_error_to_anyhow)?;
        Ok((dbtx, store))
    }
}

#[apply(async_trait_maybe_send)]
impl IAtomicStorage for IdbStorage {
    async fn get(&self, key: KeyRef<'_>) -> anyhow::Result<Option<Value>> {
        let (_dbtx, store) = self.store(TransactionMode::ReadOnly)?;
        let result = store
            .get(Query::Key(JsValue::from(hex::encode(key))))
            .map_err(idb_error_to_anyhow)?
            .await
            .map_err(idb_error_to_anyhow)?;

        result.map(|raw_value| decode_hex(&raw_value, "value")).transpose()
    }

    async fn find_by_prefix(&self, prefix: &[u8]) -> anyhow::Result<Vec<(Key, Value)>> {
        let hex_prefix = hex::encode(prefix);
        let (_dbtx, store) = self.store(TransactionMode::ReadOnly)?;
        let raw_keys = store
            .get_all_keys(Some(Query::KeyRange(prefix_range(&hex_prefix)?)), None)
            .map_err(idb_error_to_anyhow)?
            .await
            .map_err(idb_error_to_anyhow)?;
        let raw_values = store
            .get_all(Some(Query::KeyRange(prefix_range(&hex_prefix)?)), None)
            .map_err(idb_error_to_anyhow)?
            .await
            .map_err(idb_error_to_anyhow)?;

        if raw_keys.len() != raw_values.len() {
            anyhow::bail!("IndexedDB returned mismatching key and value counts");
        }

        raw_keys
            .iter()
            .zip(raw_values.iter())
            .map(|(raw_key, raw_value)| {
                Ok((decode_hex(raw_key, "key")?, decode_hex(raw_value, "value")?))
            })
            .collect()
    }

    async fn write_atomically(&self, changes: Vec<(Key, Option<Value>)>) -> anyhow::Result<()> {
        let (dbtx, store) = self.store(TransactionMode::ReadWrite)?;

        for (key, value) in changes {
            let hex_key = JsValue::from(hex::encode(&key));
            match value {
                Some(value) => {
                    store
                        .put(&JsValue::from(hex::encode(&value)), Some(&hex_key))
                        .map_err(idb_error_to_anyhow)?
                        .await
                        .map_err(idb_error_to_anyhow)?;
                }
                None => {
                    store
                        .delete(Query::Key(hex_key))
                        .map_err(idb_error_to_anyhow)?
                        .await
                        .map_err(idb_error_to_anyhow)?;
                }
            }
        }

        dbtx.commit()
            .map_err(idb_error_to_anyhow)?
            .await
            .map_err(idb_error_to_anyhow)?;

        Ok(())
    }
}

/// Browser-local storage through IndexedDB
#[derive(Debug, Default)]
pub struct IdbProvider;

#[apply(async_trait_maybe_send)]
impl IStorageProvider for IdbProvider {
    async fn open_storage(&self, name: &str) -> anyhow::Result<AtomicStorage> {
        debug!("Opening IndexedDB storage {}", name);
        let storage: AtomicStorage = Arc::new(IdbStorage::open(name).await?);
        Ok(storage)
    }

    async fn delete_storage(&self, name: &str) -> anyhow::Result<()> {
        let idb_factory = idb::Factory::new().map_err(idb_error_to_anyhow)?;
        idb_factory
            .delete(name)
            .map_err(idb_error_to_anyhow)?
            .await
            .map_err(idb_error_to_anyhow)?;
        Ok(())
    }
}

fn prefix_range(hex_prefix: &str) -> anyhow::Result<KeyRange> {
    // 'g' sorts after every hex digit
    KeyRange::bound(
        &JsValue::from(hex_prefix),
        &JsValue::from(format!("{hex_prefix}g")),
        Some(false),
        Some(true),
    )
    .map_err(idb_error_to_anyhow)
}

fn decode_hex(raw: &JsValue, what: &str) -> anyhow::Result<Vec<u8>> {
    let hex_string = raw
        .as_string()
        .with_context(|| format!("IndexedDB returned non-string {what}, storage corrupted"))?;
    Ok(hex::decode(hex_string)?)
}

fn idb_error_to_anyhow(err: idb::Error) -> anyhow::Error {
    anyhow::anyhow!("IndexedDB error: {:?}", err)
}
