use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::session::{DATABASE_NAME, SCHEMA_VERSION};
use crate::storage::StorageProvider;
use crate::MemProvider;

/// Where the session keeps its data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageBackend {
    /// Gone when the process exits
    Memory,
    /// One SQLite file per database inside `directory`
    #[cfg(not(target_family = "wasm"))]
    Sqlite { directory: PathBuf },
    /// The browser's IndexedDB
    #[cfg(target_family = "wasm")]
    IndexedDb,
}

impl Default for StorageBackend {
    #[cfg(not(target_family = "wasm"))]
    fn default() -> Self {
        StorageBackend::Sqlite {
            directory: default_data_dir(),
        }
    }

    #[cfg(target_family = "wasm")]
    fn default() -> Self {
        StorageBackend::IndexedDb
    }
}

impl StorageBackend {
    pub fn provider(&self) -> StorageProvider {
        match self {
            StorageBackend::Memory => Arc::new(MemProvider::default()),
            #[cfg(not(target_family = "wasm"))]
            StorageBackend::Sqlite { directory } => {
                Arc::new(crate::SqliteProvider::new(directory.clone()))
            }
            #[cfg(target_family = "wasm")]
            StorageBackend::IndexedDb => Arc::new(crate::IdbProvider),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub database_name: String,
    pub schema_version: u32,
    pub backend: StorageBackend,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            database_name: DATABASE_NAME.to_owned(),
            schema_version: SCHEMA_VERSION,
            backend: StorageBackend::default(),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("carkv.toml")
}

pub fn default_data_dir() -> PathBuf {
    PathBuf::from(".carkv")
}

/// Reads the config at `path` (or `carkv.toml`), falling back to the defaults if there is none
pub fn load_config(path: Option<&Path>) -> anyhow::Result<SessionConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(SessionConfig::default());
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: SessionConfig = toml::from_str(&contents)?;
    Ok(config)
}
