//! # CallAgent Store
//!
//! Persistence for the three CallAgent records: the report list, the settings
//! singleton, and the date of the last daily summary. The typed `CallStore`
//! sits on a `KvBackend`, so the storage mechanism can be swapped (JSON
//! files, SQLite, memory) without touching callers.

pub mod backend;
pub mod file;
pub mod sqlite;
pub mod store;

pub use backend::{KvBackend, MemoryBackend};
pub use file::JsonFileBackend;
pub use sqlite::SqliteBackend;
pub use store::CallStore;

use callagent_core::Result;
use callagent_core::config::{StorageBackend, StorageConfig};

/// Open the store described by `config`.
pub fn open(config: &StorageConfig) -> Result<CallStore> {
    let backend: Box<dyn KvBackend> = match config.backend {
        StorageBackend::Json => Box::new(JsonFileBackend::new(&config.data_path())?),
        StorageBackend::Sqlite => {
            let dir = config.data_path();
            std::fs::create_dir_all(&dir)?;
            Box::new(SqliteBackend::open(&dir.join("callagent.db"))?)
        }
        StorageBackend::Memory => Box::new(MemoryBackend::new()),
    };
    tracing::info!(
        "💾 Store opened: backend={} dir={}",
        backend.name(),
        config.data_path().display()
    );
    Ok(CallStore::new(backend))
}
