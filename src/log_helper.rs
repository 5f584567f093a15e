use crate::StoreError;
use crate::error::Result;
use crate::store::Document;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::PathBuf;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Record {
    Create {
        collection: String,
    },
    Put {
        collection: String,
        key: String,
        doc: Document,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct FileIndex {
    path: PathBuf,
    offset: u64,
}
pub(crate) struct LogHelper;

impl LogHelper {
    pub(crate) fn read(idx: &FileIndex) -> Result<Record> {
        let mut file = File::open(&idx.path)?;
        file.seek(SeekFrom::Start(idx.offset))?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        reader.read_until(b'\n', &mut buf)?;
        LogHelper::deserialize(&buf, idx)
    }

    pub(crate) fn read_all(path: PathBuf) -> Result<Vec<(Record, FileIndex)>> {
        let file = File::open(&path)?;
        let mut records = Vec::new();
        let mut reader = BufReader::new(file);
        let mut offset = 0;

        loop {
            let mut buf = Vec::new();
            let n = reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }

            let idx = FileIndex {
                path: path.clone(),
                offset,
            };
            records.push((LogHelper::deserialize(&buf, &idx)?, idx));

            // n includes the trailing newline
            offset += n as u64;
        }

        Ok(records)
    }

    pub(crate) fn write(file: &mut File, path: PathBuf, record: &Record) -> Result<FileIndex> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let offset = file.metadata()?.len();
        file.write_all(&line)?;
        file.flush()?;
        Ok(FileIndex { path, offset })
    }

    fn deserialize(buf: &[u8], idx: &FileIndex) -> Result<Record> {
        if !buf.ends_with(b"\n") {
            return Err(LogHelper::corrupt(idx));
        }
        serde_json::from_slice(buf).map_err(|_| LogHelper::corrupt(idx))
    }

    fn corrupt(idx: &FileIndex) -> StoreError {
        StoreError::CorruptLog {
            path: idx.path.clone(),
            offset: idx.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs::OpenOptions;
    use tempfile::TempDir;

    fn put(key: &str, text: &str) -> Record {
        Record::Put {
            collection: "messages".into(),
            key: key.into(),
            doc: json!({"content": text, "note": "has spaces\nand newlines"})
                .as_object()
                .cloned()
                .unwrap(),
        }
    }

    #[test]
    fn records_survive_a_write_read_cycle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1.log");
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();

        let create = Record::Create {
            collection: "messages".into(),
        };
        LogHelper::write(&mut file, path.clone(), &create).unwrap();
        let second = LogHelper::write(&mut file, path.clone(), &put("a", "one two")).unwrap();

        assert_eq!(LogHelper::read(&second).unwrap(), put("a", "one two"));
        let all = LogHelper::read_all(path).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, create);
    }

    #[test]
    fn torn_tail_is_reported_as_corruption() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1.log");
        let torn: &[u8] = b"{\"op\":\"create\",\"collection\":\"users\"}\n{\"op\":\"pu";
        std::fs::write(&path, torn).unwrap();
        match LogHelper::read_all(path) {
            Err(StoreError::CorruptLog { offset, .. }) => assert_eq!(offset, 37),
            other => panic!("expected corrupt log, got {other:?}"),
        }
    }
}
