use crate::storage::{AtomicStorage, IAtomicStorage, IStorageProvider};
use crate::{async_trait_maybe_send, Key, KeyRef, Value};
use macro_rules_attribute::apply;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Default, Debug)]
pub struct MemStorage {
    data: Mutex<BTreeMap<Key, Value>>,
    operations: AtomicUsize,
}

impl MemStorage {
    /// Number of reads and writes served so far
    pub fn operations(&self) -> usize {
        self.operations.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.data.lock().expect("poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn count_operation(&self) {
        self.operations.fetch_add(1, Ordering::Relaxed);
    }
}

#[apply(async_trait_maybe_send)]
impl IAtomicStorage for MemStorage {
    async fn get(&self, key: KeyRef<'_>) -> anyhow::Result<Option<Value>> {
        self.count_operation();
        Ok(self.data.lock().expect("poisoned").get(key).cloned())
    }

    async fn find_by_prefix(&self, prefix: &[u8]) -> anyhow::Result<Vec<(Key, Value)>> {
        self.count_operation();
        let result = self
            .data
            .lock()
            .expect("poisoned")
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(result)
    }

    async fn write_atomically(&self, changes: Vec<(Key, Option<Value>)>) -> anyhow::Result<()> {
        self.count_operation();
        let mut db = self.data.lock().expect("poisoned");
        for (key, maybe_value) in changes {
            match maybe_value {
                Some(value) => {
                    db.insert(key, value);
                }
                None => {
                    db.remove(&key);
                }
            }
        }
        Ok(())
    }
}

/// Keeps one [`MemStorage`] per name for as long as the provider lives.
#[derive(Default, Debug)]
pub struct MemProvider {
    storages: Mutex<HashMap<String, Arc<MemStorage>>>,
    unavailable: bool,
}

impl MemProvider {
    /// A provider whose storages can never be opened, like a browser with storage disabled
    pub fn unavailable() -> Self {
        Self {
            storages: Default::default(),
            unavailable: true,
        }
    }

    /// The storage behind `name`, if it was opened before
    pub fn storage(&self, name: &str) -> Option<Arc<MemStorage>> {
        self.storages.lock().expect("poisoned").get(name).cloned()
    }
}

#[apply(async_trait_maybe_send)]
impl IStorageProvider for MemProvider {
    async fn open_storage(&self, name: &str) -> anyhow::Result<AtomicStorage> {
        if self.unavailable {
            anyhow::bail!("in-memory storage is disabled");
        }
        let storage: AtomicStorage = self
            .storages
            .lock()
            .expect("poisoned")
            .entry(name.to_owned())
            .or_insert_with(|| {
                debug!("Creating in-memory storage {}", name);
                Arc::new(MemStorage::default())
            })
            .clone();
        Ok(storage)
    }

    async fn delete_storage(&self, name: &str) -> anyhow::Result<()> {
        self.storages.lock().expect("poisoned").remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemProvider;
    use crate::storage::IStorageProvider;

    #[tokio::test]
    async fn test_provider_hands_out_one_storage_per_name() {
        let provider = MemProvider::default();
        assert!(provider.storage("a").is_none());

        let storage = provider.open_storage("a").await.unwrap();
        assert!(provider.storage("a").unwrap().is_empty());
        storage
            .write_atomically(vec![(b"k".to_vec(), Some(b"v".to_vec()))])
            .await
            .unwrap();

        let again = provider.open_storage("a").await.unwrap();
        assert_eq!(again.get(b"k").await.unwrap(), Some(b"v".to_vec()));
        let opened = provider.storage("a").unwrap();
        assert!(!opened.is_empty());
        assert_eq!(opened.len(), 1);
        assert_eq!(opened.operations(), 2);

        provider.delete_storage("a").await.unwrap();
        assert!(provider.storage("a").is_none());
        assert!(provider.open_storage("b").await.is_ok());
        assert!(MemProvider::unavailable().open_storage("a").await.is_err());
    }
}
