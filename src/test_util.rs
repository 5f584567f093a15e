//! Helpers shared by the unit tests.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::dispatch::{HandlerResult, Handlers};
use crate::error::{HandlerError, StoreError};
use crate::protocol::{ConfigRecord, SaveRecord, ServerMessage};
use crate::schema::SchemaIssues;
use crate::thread_pool::ThreadPool;

/// An in-memory sink whose contents stay readable after it is handed over.
#[derive(Clone, Default)]
pub(crate) struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    pub(crate) fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub(crate) fn lines(&self) -> Vec<Value> {
        self.text()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A sink whose peer has gone away.
pub(crate) struct BrokenSink;

impl Write for BrokenSink {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer hung up"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs every job on the calling thread before `spawn` returns.
pub(crate) struct InlinePool;

impl ThreadPool for InlinePool {
    fn new(_: usize) -> io::Result<Self> {
        Ok(InlinePool)
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        job()
    }
}

/// Records which operations were called and answers `ok`.
///
/// `put_test_data` is not served, `get_config` finds a malformed document and
/// `update_config` hits a missing collection.
#[derive(Clone, Default)]
pub(crate) struct ScriptedHandlers {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl ScriptedHandlers {
    pub(crate) fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, tag: &'static str) -> HandlerResult {
        self.calls.lock().unwrap().push(tag);
        Ok(ServerMessage::Ok)
    }
}

impl Handlers for ScriptedHandlers {
    fn get_config(&self, _: String) -> HandlerResult {
        self.record("get_config")?;
        Err(HandlerError::Invalid(SchemaIssues::root(
            "Expected object, received string",
        )))
    }
    fn update_config(&self, _: ConfigRecord) -> HandlerResult {
        self.record("update_config")?;
        Err(StoreError::NoSuchCollection("config".to_owned()).into())
    }
    fn save_message(&self, _: SaveRecord) -> HandlerResult {
        self.record("save_message")
    }
    fn get_message(&self, _: String) -> HandlerResult {
        self.record("get_message")
    }
    fn save_user(&self, _: SaveRecord) -> HandlerResult {
        self.record("save_user")
    }
    fn get_user(&self, _: String) -> HandlerResult {
        self.record("get_user")
    }
    fn put_test_data(&self, _: String) -> HandlerResult {
        Err(HandlerError::Unsupported("put_test_data"))
    }
    fn get_test_data(&self, _: String) -> HandlerResult {
        self.record("get_test_data")
    }
}
