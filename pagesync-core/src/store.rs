use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::DocumentId;

/// Durable slot holding the id of the document the user had open last.
pub trait LastDocumentStore: Send + Sync {
    fn load(&self) -> Result<Option<DocumentId>>;
    fn save(&self, document: &str) -> Result<()>;
}

#[derive(Debug, Serialize, Deserialize)]
struct LastDocumentFile {
    #[serde(rename = "lastDocument")]
    last_document: DocumentId,
}

pub struct FileLastDocumentStore {
    path: PathBuf,
}

impl FileLastDocumentStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create state directory at {:?}", parent))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl LastDocumentStore for FileLastDocumentStore {
    fn load(&self) -> Result<Option<DocumentId>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let mut file = File::open(&self.path)
            .with_context(|| format!("failed to open state file {:?}", self.path))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        let stored: LastDocumentFile = serde_json::from_str(&buf)
            .with_context(|| format!("failed to decode state file {:?}", self.path))?;
        Ok(Some(stored.last_document))
    }

    fn save(&self, document: &str) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(&LastDocumentFile {
            last_document: document.to_owned(),
        })?;
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp state file {:?}", tmp))?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryLastDocumentStore {
    inner: Mutex<Option<DocumentId>>,
}

impl MemoryLastDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(document: impl Into<DocumentId>) -> Self {
        Self {
            inner: Mutex::new(Some(document.into())),
        }
    }
}

impl LastDocumentStore for MemoryLastDocumentStore {
    fn load(&self) -> Result<Option<DocumentId>> {
        Ok(self.inner.lock().clone())
    }

    fn save(&self, document: &str) -> Result<()> {
        *self.inner.lock() = Some(document.to_owned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn file_store_round_trips_last_document() {
        let dir = tempdir().unwrap();
        let store = FileLastDocumentStore::new(dir.path().join("state/last_document.json")).unwrap();

        assert_eq!(store.load().unwrap(), None);

        store.save("3f6c").unwrap();
        store.save("9a1e").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("9a1e"));

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"lastDocument\""));
    }

    #[test]
    fn file_store_reports_corrupt_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("last_document.json");
        fs::write(&path, "not json").unwrap();

        let store = FileLastDocumentStore::new(path).unwrap();
        assert!(store.load().is_err());
    }

    #[test]
    fn memory_store_starts_empty() {
        let store = MemoryLastDocumentStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save("abc").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("abc"));
    }
}
