//! File-based backend: one human-readable JSON file per key.
//! Only touches disk when a key is read or written.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use callagent_core::{CallAgentError, Result};

use crate::backend::KvBackend;

/// Stores each key as `<dir>/<key>.json`.
pub struct JsonFileBackend {
    dir: PathBuf,
    /// Serializes writers; readers go straight to disk.
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    /// Create a backend rooted at `dir`, creating it if needed.
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvBackend for JsonFileBackend {
    fn name(&self) -> &'static str {
        "json"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        let file = self.file(key);
        if !file.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&file)?))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| CallAgentError::Storage("file backend lock poisoned".into()))?;
        let file = self.file(key);
        // Write-then-rename so a crash never leaves a truncated file behind.
        let tmp = self.dir.join(format!("{key}.json.tmp"));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &file)?;
        tracing::debug!("💾 Saved {} ({} bytes)", file.display(), value.len());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| CallAgentError::Storage("file backend lock poisoned".into()))?;
        match std::fs::remove_file(self.file(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_backend_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = JsonFileBackend::new(dir.path()).unwrap();
            backend.set("call_agent_settings", r#"{"agent_name":"Noa"}"#).unwrap();
        }
        let backend = JsonFileBackend::new(dir.path()).unwrap();
        assert_eq!(
            backend.get("call_agent_settings").unwrap().as_deref(),
            Some(r#"{"agent_name":"Noa"}"#)
        );
        assert!(dir.path().join("call_agent_settings.json").exists());
    }

    #[test]
    fn test_file_backend_remove_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::new(dir.path()).unwrap();
        backend.remove("nothing").unwrap();
        backend.set("k", "1").unwrap();
        backend.remove("k").unwrap();
        assert!(backend.get("k").unwrap().is_none());
    }
}
