use std::collections::BTreeSet;

use tracing::debug;

use crate::codec;
use crate::schema::{CollectionSchema, IndexOptions, IndexSchema, Schema};
use crate::transaction::Transaction;
use crate::{Error, KeyPath};

/// Handed to the upgrade callback of [`crate::Factory::open`] when the requested version is
/// newer than the stored one.
///
/// The callback only edits the schema. Dropping and backfilling the affected records happens
/// afterwards, in the same atomic write that stores the new version.
pub struct VersionChange {
    old_version: u32,
    new_version: u32,
    schema: Schema,
    dropped_collections: BTreeSet<String>,
    dropped_indexes: BTreeSet<(String, String)>,
}

impl VersionChange {
    pub(crate) fn new(old_version: u32, new_version: u32, schema: Schema) -> Self {
        Self {
            old_version,
            new_version,
            schema,
            dropped_collections: Default::default(),
            dropped_indexes: Default::default(),
        }
    }

    /// `0` if the database didn't exist before
    pub fn old_version(&self) -> u32 {
        self.old_version
    }

    pub fn new_version(&self) -> u32 {
        self.new_version
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.schema.collections.contains_key(name)
    }

    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.schema.collection_names()
    }

    pub fn create_collection(
        &mut self,
        name: &str,
        key_path: impl Into<KeyPath>,
    ) -> anyhow::Result<CollectionUpgrade<'_>> {
        if self.has_collection(name) {
            return Err(Error::CollectionExists(name.to_owned()).into());
        }
        self.schema
            .collections
            .insert(name.to_owned(), CollectionSchema::new(key_path.into()));
        self.collection(name)
    }

    pub fn collection(&mut self, name: &str) -> anyhow::Result<CollectionUpgrade<'_>> {
        let (name, schema) = self
            .schema
            .collections
            .get_mut(name)
            .map(|schema| (name.to_owned(), schema))
            .ok_or_else(|| Error::UnknownCollection(name.to_owned()))?;
        Ok(CollectionUpgrade {
            name,
            schema,
            dropped_indexes: &mut self.dropped_indexes,
        })
    }

    /// Removes the collection together with all its records and indexes
    pub fn delete_collection(&mut self, name: &str) -> anyhow::Result<()> {
        if self.schema.collections.remove(name).is_none() {
            return Err(Error::UnknownCollection(name.to_owned()).into());
        }
        self.dropped_collections.insert(name.to_owned());
        Ok(())
    }

    pub(crate) fn into_schema(self) -> (Schema, SchemaChanges) {
        (
            self.schema,
            SchemaChanges {
                dropped_collections: self.dropped_collections,
                dropped_indexes: self.dropped_indexes,
            },
        )
    }
}

pub struct CollectionUpgrade<'a> {
    name: String,
    schema: &'a mut CollectionSchema,
    dropped_indexes: &'a mut BTreeSet<(String, String)>,
}

impl CollectionUpgrade<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.schema.indexes.contains_key(name)
    }

    /// Existing records are indexed when the upgrade is applied. For a unique index, duplicate
    /// keys among them abort the upgrade.
    pub fn create_index(
        &mut self,
        name: &str,
        key_path: impl Into<KeyPath>,
        options: IndexOptions,
    ) -> anyhow::Result<&mut Self> {
        if self.has_index(name) {
            return Err(Error::IndexExists {
                collection: self.name.clone(),
                index: name.to_owned(),
            }
            .into());
        }
        self.schema.indexes.insert(
            name.to_owned(),
            IndexSchema {
                key_path: key_path.into(),
                unique: options.unique,
            },
        );
        Ok(self)
    }

    pub fn delete_index(&mut self, name: &str) -> anyhow::Result<&mut Self> {
        if self.schema.indexes.remove(name).is_none() {
            return Err(Error::UnknownIndex {
                collection: self.name.clone(),
                index: name.to_owned(),
            }
            .into());
        }
        self.dropped_indexes
            .insert((self.name.clone(), name.to_owned()));
        Ok(self)
    }
}

/// What the callback removed, which the final schema alone can't tell when a name was reused
pub(crate) struct SchemaChanges {
    dropped_collections: BTreeSet<String>,
    dropped_indexes: BTreeSet<(String, String)>,
}

impl SchemaChanges {
    /// Buffers the record and index changes that turn `old` into `new` into `tx`, which has to be
    /// opened with the `new` schema.
    pub(crate) async fn apply(
        &self,
        tx: &Transaction,
        old: &Schema,
        new: &Schema,
    ) -> anyhow::Result<()> {
        for collection in &self.dropped_collections {
            let records = tx.delete_by_prefix(&codec::data_prefix(collection)).await?;
            tx.delete_by_prefix(&codec::collection_index_prefix(collection))
                .await?;
            debug!("Dropped collection {} with {} records", collection, records);
        }

        for (collection, index) in &self.dropped_indexes {
            if self.dropped_collections.contains(collection) {
                continue;
            }
            tx.delete_by_prefix(&codec::index_prefix(collection, index))
                .await?;
            debug!("Dropped index {} of {}", index, collection);
        }

        for (collection_name, collection_schema) in &new.collections {
            // A fresh collection is empty, there is nothing to index yet
            let Some(old_collection) = old
                .collection(collection_name)
                .filter(|_| !self.dropped_collections.contains(collection_name))
            else {
                continue;
            };

            let collection = tx.collection(collection_name)?;
            for index_name in collection_schema.indexes.keys() {
                let dropped = self
                    .dropped_indexes
                    .contains(&(collection_name.clone(), index_name.clone()));
                if old_collection.index(index_name).is_some() && !dropped {
                    continue;
                }
                let indexed = collection.backfill_index(index_name).await?;
                debug!(
                    "Backfilled index {} of {} with {} records",
                    index_name, collection_name, indexed
                );
            }
        }

        Ok(())
    }
}
