use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::KeyPath;

/// Collections and indexes of a database, persisted next to the data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub(crate) collections: BTreeMap<String, CollectionSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub(crate) key_path: KeyPath,
    pub(crate) indexes: BTreeMap<String, IndexSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub(crate) key_path: KeyPath,
    pub(crate) unique: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexOptions {
    pub unique: bool,
}

impl IndexOptions {
    pub fn unique() -> Self {
        Self { unique: true }
    }
}

impl Schema {
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    pub fn collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }
}

impl CollectionSchema {
    pub(crate) fn new(key_path: KeyPath) -> Self {
        Self {
            key_path,
            indexes: BTreeMap::new(),
        }
    }

    pub fn key_path(&self) -> &KeyPath {
        &self.key_path
    }

    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }

    pub fn index(&self, name: &str) -> Option<&IndexSchema> {
        self.indexes.get(name)
    }
}

impl IndexSchema {
    pub fn key_path(&self) -> &KeyPath {
        &self.key_path
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }
}
