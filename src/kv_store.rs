//! # DocLog
//!
//! A log-structured document store: every collection creation and every
//! document write is appended as one JSON line to `1.log`, `2.log`, ... in
//! the data directory, and an in-memory index points at the latest line for
//! each key.
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use log::debug;
use walkdir::WalkDir;

use crate::log_helper::{FileIndex, LogHelper, Record};
use crate::store::{Document, generate_key};

const MAX_LOG_SIZE: u64 = 1 << 20;
const MAX_UNCOMPACTED_SIZE: u64 = 1 << 10;

/// The DocLog structure.
///
/// Documents are read back from disk on every `get`; only offsets are kept
/// in memory.
pub(crate) struct DocLog {
    log_dir: PathBuf,
    file_count: i32,
    cur_file: File,
    cur_path: PathBuf,

    collections: HashSet<String>,
    idx: HashMap<String, HashMap<String, FileIndex>>,
    uncompacted: u64,
}

impl DocLog {
    /// Open the [`DocLog`] at a given dir path and replay its logs.
    /// Only files named like **1.log, 2.log** are considered.
    pub(crate) fn open(path: impl Into<PathBuf>) -> Result<DocLog> {
        let path = path.into();
        fs::create_dir_all(&path)?;
        let mut file_count = 0;
        for entry in WalkDir::new(&path)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if entry.file_type().is_file() {
                if let Some(num) = entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.strip_suffix(".log"))
                    .and_then(|num| num.parse::<i32>().ok())
                {
                    file_count = file_count.max(num);
                }
            }
        }

        let mut collections = HashSet::new();
        let mut idx: HashMap<String, HashMap<String, FileIndex>> = HashMap::new();
        let mut uncompacted = 0;
        for num in 1..=file_count {
            let file_path = path.join(format!("{num}.log"));
            if !file_path.exists() {
                continue;
            }
            for (record, file_index) in LogHelper::read_all(file_path)? {
                match record {
                    Record::Create { collection } => {
                        collections.insert(collection);
                    }
                    Record::Put {
                        collection, key, ..
                    } => {
                        collections.insert(collection.clone());
                        if idx
                            .entry(collection)
                            .or_default()
                            .insert(key, file_index)
                            .is_some()
                        {
                            uncompacted += 1;
                        }
                    }
                }
            }
        }

        let file_count = file_count.max(1);
        let (cur_file, cur_path) = DocLog::open_file(&path, file_count)?;
        debug!(
            "replayed {} collections from {} log files in {}",
            collections.len(),
            file_count,
            path.display()
        );
        Ok(Self {
            log_dir: path,
            file_count,
            cur_file,
            cur_path,
            collections,
            idx,
            uncompacted,
        })
    }

    pub(crate) fn has_collection(&self, collection: &str) -> bool {
        self.collections.contains(collection)
    }

    pub(crate) fn create_collection(&mut self, collection: &str) -> Result<()> {
        if self.has_collection(collection) {
            return Ok(());
        }
        self.append(&Record::Create {
            collection: collection.to_owned(),
        })?;
        self.collections.insert(collection.to_owned());
        Ok(())
    }

    /// Get the document stored under `key`.
    pub(crate) fn get(&self, collection: &str, key: &str) -> Result<Option<Document>> {
        self.check_collection(collection)?;
        let Some(file_index) = self.idx.get(collection).and_then(|keys| keys.get(key)) else {
            return Ok(None);
        };
        match LogHelper::read(file_index)? {
            Record::Put { doc, .. } => Ok(Some(doc)),
            Record::Create { .. } => Ok(None),
        }
    }

    /// Store `doc` under `key`, replacing what was there.
    pub(crate) fn put(&mut self, collection: &str, key: &str, doc: Document) -> Result<()> {
        self.check_collection(collection)?;
        let file_index = self.append(&Record::Put {
            collection: collection.to_owned(),
            key: key.to_owned(),
            doc,
        })?;
        let replaced = self
            .idx
            .entry(collection.to_owned())
            .or_default()
            .insert(key.to_owned(), file_index);
        if replaced.is_some() {
            self.record_uncompact()?;
        }
        Ok(())
    }

    /// Store `doc` under a generated key.
    pub(crate) fn insert(&mut self, collection: &str, doc: Document) -> Result<String> {
        self.check_collection(collection)?;
        let mut key = generate_key();
        while self
            .idx
            .get(collection)
            .is_some_and(|keys| keys.contains_key(&key))
        {
            key = generate_key();
        }
        self.put(collection, &key, doc)?;
        Ok(key)
    }
}

impl DocLog {
    pub(crate) fn open_file(log_dir: &Path, file_count: i32) -> Result<(File, PathBuf)> {
        let file_path = log_dir.join(format!("{}.log", file_count));
        Ok((
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file_path)?,
            file_path,
        ))
    }

    fn check_collection(&self, collection: &str) -> Result<()> {
        if self.has_collection(collection) {
            Ok(())
        } else {
            Err(StoreError::NoSuchCollection(collection.to_owned()))
        }
    }

    fn append(&mut self, record: &Record) -> Result<FileIndex> {
        self.check_if_new_file()?;
        LogHelper::write(&mut self.cur_file, self.cur_path.clone(), record)
    }

    fn new_file(&mut self) -> Result<()> {
        self.file_count += 1;
        (self.cur_file, self.cur_path) = DocLog::open_file(&self.log_dir, self.file_count)?;
        Ok(())
    }

    fn check_if_new_file(&mut self) -> Result<()> {
        if self.cur_file.metadata()?.len() > MAX_LOG_SIZE {
            self.new_file()?;
        }
        Ok(())
    }

    fn compact(&mut self) -> Result<()> {
        debug!(
            "compacting {} stale records in {}",
            self.uncompacted,
            self.log_dir.display()
        );
        self.uncompacted = 0;
        let old_file_count = self.file_count;
        self.new_file()?;

        let mut collections: Vec<&String> = self.collections.iter().collect();
        collections.sort();
        for collection in collections {
            LogHelper::write(
                &mut self.cur_file,
                self.cur_path.clone(),
                &Record::Create {
                    collection: collection.clone(),
                },
            )?;
        }

        for keys in self.idx.values_mut() {
            for v in keys.values_mut() {
                let record = LogHelper::read(v)?;
                *v = LogHelper::write(&mut self.cur_file, self.cur_path.clone(), &record)?;
            }
        }

        for num in 1..=old_file_count {
            let path = self.log_dir.join(format!("{num}.log"));
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn record_uncompact(&mut self) -> Result<()> {
        self.uncompacted += 1;
        if self.uncompacted >= MAX_UNCOMPACTED_SIZE {
            self.compact()?;
        }
        Ok(())
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

    fn log_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".log"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn unknown_collections_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut log = DocLog::open(dir.path()).unwrap();
        assert!(matches!(
            log.get("users", "1"),
            Err(StoreError::NoSuchCollection(_))
        ));
        assert!(matches!(
            log.put("users", "1", Document::new()),
            Err(StoreError::NoSuchCollection(_))
        ));
    }

    #[test]
    fn documents_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut log = DocLog::open(dir.path()).unwrap();
            log.create_collection("users").unwrap();
            log.put("users", "1", doc(json!({"name": "ann"}))).unwrap();
            log.put("users", "1", doc(json!({"name": "bob"}))).unwrap();
            log.create_collection("empty").unwrap();
        }

        let log = DocLog::open(dir.path()).unwrap();
        assert!(log.has_collection("empty"));
        assert_eq!(log.uncompacted, 1);
        assert_eq!(
            log.get("users", "1").unwrap(),
            Some(doc(json!({"name": "bob"})))
        );
        assert_eq!(log.get("users", "2").unwrap(), None);
    }

    #[test]
    fn insert_returns_a_usable_key() {
        let dir = TempDir::new().unwrap();
        let mut log = DocLog::open(dir.path()).unwrap();
        log.create_collection("test_data").unwrap();
        let key = log.insert("test_data", doc(json!({"data": "x"}))).unwrap();
        assert_eq!(
            log.get("test_data", &key).unwrap(),
            Some(doc(json!({"data": "x"})))
        );
    }

    #[test]
    fn compaction_keeps_live_documents() {
        let dir = TempDir::new().unwrap();
        {
            let mut log = DocLog::open(dir.path()).unwrap();
            log.create_collection("users").unwrap();
            log.create_collection("empty").unwrap();
            for i in 0..=MAX_UNCOMPACTED_SIZE {
                log.put("users", "hot", doc(json!({"n": i}))).unwrap();
            }
            log.put("users", "cold", doc(json!({"n": "cold"}))).unwrap();
        }

        assert_eq!(log_files(dir.path()), vec!["2.log".to_owned()]);
        let log = DocLog::open(dir.path()).unwrap();
        assert!(log.has_collection("empty"));
        assert_eq!(
            log.get("users", "hot").unwrap(),
            Some(doc(json!({"n": MAX_UNCOMPACTED_SIZE})))
        );
        assert_eq!(
            log.get("users", "cold").unwrap(),
            Some(doc(json!({"n": "cold"})))
        );
    }
}
