//! The document store abstraction shared by every backend.

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// A stored JSON object. Its key lives outside the body.
pub type Document = Map<String, Value>;

/// A trait for keyed document collections.
///
/// Every operation names the collection it works on; operations other than
/// [`collection_exists`](Self::collection_exists) and
/// [`create_collection`](Self::create_collection) fail with
/// [`StoreError::NoSuchCollection`] until the collection is created.
pub trait DocumentStore: Clone + Send + Sync + 'static {
    /// Whether the collection has been created.
    fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// Create the collection. Creating an existing collection is a no-op.
    fn create_collection(&self, collection: &str) -> Result<()>;

    /// Get the document stored under `key`, `None` if there is none.
    fn get(&self, collection: &str, key: &str) -> Result<Option<Document>>;

    /// Store `doc` under `key`, replacing any previous document.
    fn upsert(&self, collection: &str, key: &str, doc: Document) -> Result<()>;

    /// Store `doc` under a fresh key and return the key.
    fn insert(&self, collection: &str, doc: Document) -> Result<String>;

    /// Create the collection unless it already exists.
    fn ensure_collection(&self, collection: &str) -> Result<()> {
        if !self.collection_exists(collection)? {
            self.create_collection(collection)?;
        }
        Ok(())
    }
}

/// Storage backends the server can run on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum EngineKind {
    /// Append-only JSON-lines log files.
    Log,
    /// The sled embedded database.
    Sled,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Log => f.write_str("log"),
            EngineKind::Sled => f.write_str("sled"),
        }
    }
}

impl EngineKind {
    /// Work out which engine wrote the data directory, if any.
    pub fn detect(path: &Path) -> Result<Option<EngineKind>> {
        if !path.exists() {
            return Ok(None);
        }

        let mut has_log = false;
        let mut has_sled = false;
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_str().unwrap_or("");

            if name.ends_with(".log") {
                has_log = true;
            }
            // sled keeps `conf`, `db` and `blobs/` next to its snapshots
            if matches!(name, "db" | "conf" | "blobs") || name.starts_with("snap.") {
                has_sled = true;
            }
        }

        match (has_log, has_sled) {
            (true, false) => Ok(Some(EngineKind::Log)),
            (false, true) => Ok(Some(EngineKind::Sled)),
            (false, false) => Ok(None),
            (true, true) => Err(StoreError::MixedEngines(path.to_path_buf())),
        }
    }
}

static KEY_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A key that is unique within this process and unlikely to repeat across
/// restarts.
pub(crate) fn generate_key() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let seq = KEY_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("{millis:x}-{seq:x}")
}
