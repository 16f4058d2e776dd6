//! Backend trait: the raw key-value seam under `CallStore`.

use std::collections::HashMap;
use std::sync::Mutex;

use callagent_core::{CallAgentError, Result};

/// A key-value store of JSON blobs. Implementations serialize their own
/// access so a backend can be shared between the HTTP API and the scheduler.
pub trait KvBackend: Send + Sync {
    /// Short name for logs ("json", "sqlite", "memory").
    fn name(&self) -> &'static str;

    /// Raw JSON stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete `key`. Deleting a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process backend. Used by tests and `backend = "memory"`.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| CallAgentError::Storage("memory backend lock poisoned".into()))
    }
}

impl KvBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}
