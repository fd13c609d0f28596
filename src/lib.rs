pub(crate) mod codec;
pub mod config;
mod database;
mod error;
mod key;
mod schema;
pub mod session;
pub(crate) mod storage;
mod transaction;
mod upgrade;
pub(crate) mod util;

pub use database::{Database, Factory};
pub use error::{Error, OpenError};
pub use key::{KeyPath, KeyValue};
pub use schema::{CollectionSchema, IndexOptions, IndexSchema, Schema};
#[cfg(target_family = "wasm")]
pub use storage::idb::IdbProvider;
pub use storage::memory::{MemProvider, MemStorage};
#[cfg(not(target_family = "wasm"))]
pub use storage::sqlite::{SqliteProvider, SqliteStorage};
pub use storage::{AtomicStorage, IAtomicStorage, IStorageProvider, StorageProvider};
pub use transaction::{Collection, Index, Transaction, TransactionMode};
pub use upgrade::{CollectionUpgrade, VersionChange};

pub type Key = Vec<u8>;
pub type KeyRef<'a> = &'a [u8];

pub type Value = Vec<u8>;
pub type ValueRef<'a> = &'a [u8];
