//! Document store backends.
//!
//! [`LogStore`] wraps the log-structured [`DocLog`](crate::kv_store::DocLog)
//! behind a mutex; [`SledStore`] maps each collection onto a sled tree.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, StoreError};
use crate::kv_store::DocLog;
use crate::store::{Document, DocumentStore};

/// A log-structured document store engine.
#[derive(Clone)]
pub struct LogStore {
    inner: Arc<Mutex<DocLog>>,
}

impl LogStore {
    /// Open the log store in the given directory, replaying existing logs.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let db = DocLog::open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(db)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, DocLog>> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl DocumentStore for LogStore {
    fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self.lock()?.has_collection(collection))
    }

    fn create_collection(&self, collection: &str) -> Result<()> {
        self.lock()?.create_collection(collection)
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        self.lock()?.get(collection, key)
    }

    fn upsert(&self, collection: &str, key: &str, doc: Document) -> Result<()> {
        self.lock()?.put(collection, key, doc)
    }

    fn insert(&self, collection: &str, doc: Document) -> Result<String> {
        self.lock()?.insert(collection, doc)
    }
}

/// A sled document store engine.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open the sled database in the given directory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let db = sled::open(path.into())?;
        Ok(Self { db })
    }

    fn tree(&self, collection: &str) -> Result<sled::Tree> {
        if !self.collection_exists(collection)? {
            return Err(StoreError::NoSuchCollection(collection.to_owned()));
        }
        Ok(self.db.open_tree(collection)?)
    }
}

impl DocumentStore for SledStore {
    fn collection_exists(&self, collection: &str) -> Result<bool> {
        Ok(self
            .db
            .tree_names()
            .iter()
            .any(|name| name.as_ref() == collection.as_bytes()))
    }

    fn create_collection(&self, collection: &str) -> Result<()> {
        self.db.open_tree(collection)?;
        self.db.flush()?;
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        match self.tree(collection)?.get(key.as_bytes())? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    fn upsert(&self, collection: &str, key: &str, doc: Document) -> Result<()> {
        let tree = self.tree(collection)?;
        tree.insert(key.as_bytes(), serde_json::to_vec(&doc)?)?;
        tree.flush()?;
        Ok(())
    }

    fn insert(&self, collection: &str, doc: Document) -> Result<String> {
        let tree = self.tree(collection)?;
        let value = serde_json::to_vec(&doc)?;
        // generated ids may collide with keys a client chose
        loop {
            let key = self.db.generate_id()?.to_string();
            let swapped =
                tree.compare_and_swap(key.as_bytes(), None as Option<&[u8]>, Some(value.clone()))?;
            if swapped.is_ok() {
                tree.flush()?;
                return Ok(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn exercise_contract<S: DocumentStore>(store: &S) {
        assert!(!store.collection_exists("users").unwrap());
        assert!(matches!(
            store.get("users", "1"),
            Err(StoreError::NoSuchCollection(_))
        ));
        store.ensure_collection("users").unwrap();
        store.create_collection("users").unwrap();
        assert!(store.collection_exists("users").unwrap());

        assert_eq!(store.get("users", "1").unwrap(), None);
        store
            .upsert("users", "1", doc(json!({"name": "ann", "avatar_url": "a"})))
            .unwrap();
        store
            .upsert("users", "1", doc(json!({"name": "bob"})))
            .unwrap();
        assert_eq!(
            store.get("users", "1").unwrap(),
            Some(doc(json!({"name": "bob"})))
        );

        let key = store.insert("users", doc(json!({"name": "generated"}))).unwrap();
        assert_ne!(key, "1");
        assert_eq!(
            store.get("users", &key).unwrap(),
            Some(doc(json!({"name": "generated"})))
        );

        store.ensure_collection("messages").unwrap();
        for key in ["0", "1", "2"] {
            store
                .upsert("messages", key, doc(json!({"content": key})))
                .unwrap();
        }
        for _ in 0..4 {
            let key = store
                .insert("messages", doc(json!({"content": "generated"})))
                .unwrap();
            assert!(!["0", "1", "2"].contains(&key.as_str()));
        }
        for key in ["0", "1", "2"] {
            assert_eq!(
                store.get("messages", key).unwrap(),
                Some(doc(json!({"content": key})))
            );
        }
    }

    #[test]
    fn log_store_honours_the_contract() {
        let dir = TempDir::new().unwrap();
        exercise_contract(&LogStore::open(dir.path()).unwrap());

        let reopened = LogStore::open(dir.path()).unwrap();
        assert!(reopened.collection_exists("users").unwrap());
        assert_eq!(
            reopened.get("users", "1").unwrap(),
            Some(doc(json!({"name": "bob"})))
        );
    }

    #[test]
    fn sled_store_honours_the_contract() {
        let dir = TempDir::new().unwrap();
        exercise_contract(&SledStore::open(dir.path()).unwrap());
    }

    #[test]
    fn log_store_is_shared_between_clones() {
        let dir = TempDir::new().unwrap();
        let store = LogStore::open(dir.path()).unwrap();
        let clone = store.clone();
        store.ensure_collection("config").unwrap();
        clone
            .upsert("config", "g", doc(json!({"prefix": "!"})))
            .unwrap();
        assert!(store.get("config", "g").unwrap().is_some());
    }
}
