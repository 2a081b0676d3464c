//! Repositories - Persistence abstraction for saved forms
//!
//! Saved forms live in a durable key-value store under one fixed collection
//! key. The store only deals in JSON text; [`StoreFormRepository`] owns the
//! (de)serialization of the collection.

use super::aggregates::FormDefinition;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key the saved form collection is stored under
pub const SAVED_FORMS_KEY: &str = "savedForms";

/// Repository result type
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("stored value under `{key}` is not valid: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid store key `{0}`")]
    InvalidKey(String),
}

/// Durable string key-value store
pub trait KeyValueStore {
    /// Read the raw value under `key`, `None` when never written
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replace the raw value under `key`
    fn set(&mut self, key: &str, value: &str) -> StoreResult<()>;

    /// Read and decode a JSON value
    fn load<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|source| StoreError::Corrupt {
                    key: key.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Encode and write a JSON value
    fn store<T: Serialize>(&mut self, key: &str, value: &T) -> StoreResult<()>
    where
        Self: Sized,
    {
        let raw = serde_json::to_string_pretty(value).map_err(|source| StoreError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        self.set(key, &raw)
    }
}

/// In-memory store (for testing and throwaway sessions)
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Directory-backed store: one `<key>.json` file per key
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.root).map_err(|source| StoreError::Io {
            path: self.root.clone(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), bytes = value.len(), "store entry written");
        Ok(())
    }
}

/// Saved form repository trait
pub trait FormRepository {
    /// All saved forms, oldest first
    fn load_all(&self) -> StoreResult<Vec<FormDefinition>>;

    /// Append one form to the collection and flush it to durable storage
    fn append_and_persist(&mut self, form: &FormDefinition) -> StoreResult<()>;
}

/// Form repository over any [`KeyValueStore`]
#[derive(Debug, Default, Clone)]
pub struct StoreFormRepository<S> {
    store: S,
}

impl<S: KeyValueStore> StoreFormRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}

impl<S: KeyValueStore> FormRepository for StoreFormRepository<S> {
    fn load_all(&self) -> StoreResult<Vec<FormDefinition>> {
        Ok(self
            .store
            .load::<Vec<FormDefinition>>(SAVED_FORMS_KEY)?
            .unwrap_or_default())
    }

    fn append_and_persist(&mut self, form: &FormDefinition) -> StoreResult<()> {
        let mut forms = self.load_all()?;
        forms.push(form.clone());
        self.store.store(SAVED_FORMS_KEY, &forms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{FieldInput, FormDraft};
    use crate::domain::value_objects::FieldType;

    fn saved_form(name: &str, aliases: &[&str]) -> FormDefinition {
        let mut draft = FormDraft::new();
        for alias in aliases {
            draft
                .add_or_update_field(FieldInput::new(FieldType::Text, *alias, *alias))
                .unwrap();
        }
        draft.set_name(name);
        draft.save().unwrap()
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("k").unwrap(), None);
        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_empty_repository() {
        let repo = StoreFormRepository::new(MemoryStore::new());
        assert!(repo.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_append_keeps_order() {
        let mut repo = StoreFormRepository::new(MemoryStore::new());
        let first = saved_form("First", &["a"]);
        let second = saved_form("Second", &["b", "c"]);
        repo.append_and_persist(&first).unwrap();
        repo.append_and_persist(&second).unwrap();

        let forms = repo.load_all().unwrap();
        assert_eq!(forms, vec![first, second]);
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let form = saved_form("Contact", &["name", "email"]);

        let mut repo = StoreFormRepository::new(FileStore::new(dir.path().join("store")));
        repo.append_and_persist(&form).unwrap();
        assert!(dir.path().join("store").join("savedForms.json").exists());

        let reopened = StoreFormRepository::new(FileStore::new(dir.path().join("store")));
        assert_eq!(reopened.load_all().unwrap(), vec![form]);
    }

    #[test]
    fn test_file_store_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert_eq!(store.get("nothing").unwrap(), None);
    }

    #[test]
    fn test_file_store_rejects_path_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path());
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(store.get(""), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn test_corrupt_collection_reported() {
        let mut store = MemoryStore::new();
        store.set(SAVED_FORMS_KEY, "{not json").unwrap();
        let repo = StoreFormRepository::new(store);
        assert!(matches!(
            repo.load_all(),
            Err(StoreError::Corrupt { ref key, .. }) if key == SAVED_FORMS_KEY
        ));
    }
}
