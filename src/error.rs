/// Reasons `Factory::open` can fail. Every variant leaves the stored database as it was.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("database version must be at least 1")]
    InvalidVersion,

    #[error("storage for database {name:?} is unavailable: {cause:#}")]
    Unavailable { name: String, cause: anyhow::Error },

    #[error("requested version {requested} of {name:?} is lower than the stored version {stored}")]
    VersionTooLow {
        name: String,
        requested: u32,
        stored: u32,
    },

    #[error("upgrade of {name:?} is blocked by {connections} open connection(s)")]
    Blocked { name: String, connections: usize },

    #[error("schema upgrade of {name:?} aborted: {cause:#}")]
    UpgradeAborted { name: String, cause: anyhow::Error },

    #[error("storage error while opening {name:?}: {cause:#}")]
    Storage { name: String, cause: anyhow::Error },
}

/// Data-level errors, returned inside `anyhow::Error` so callers can `downcast_ref` them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("collection {0:?} does not exist")]
    UnknownCollection(String),

    #[error("index {index:?} does not exist on collection {collection:?}")]
    UnknownIndex { collection: String, index: String },

    #[error("collection {0:?} already exists")]
    CollectionExists(String),

    #[error("index {index:?} already exists on collection {collection:?}")]
    IndexExists { collection: String, index: String },

    #[error("record has no valid key at key path {0}")]
    MissingKey(String),

    #[error("a record with key {key} already exists in {collection:?}")]
    KeyExists { collection: String, key: String },

    #[error("unique index {index:?} already contains key {key}")]
    ConstraintViolation { index: String, key: String },

    #[error("transaction is read-only")]
    ReadOnly,
}
