//! Response encoding and the shared write half of a connection.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use crate::error::WriteError;
use crate::protocol::ServerMessage;

type Sink = Box<dyn Write + Send>;

/// Writes newline-terminated JSON responses to one connection.
///
/// Clones share the same sink, so the reader thread and every in-flight
/// handler can respond. Each response goes out as a single `write_all` under
/// the lock; lines never interleave. After a transport failure or
/// [`close`](Self::close) every write fails with [`WriteError::Closed`].
#[derive(Clone)]
pub struct ResponseWriter {
    sink: Arc<Mutex<Option<Sink>>>,
}

impl ResponseWriter {
    /// Wrap the write half of a connection.
    pub fn new(sink: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Some(Box::new(sink)))),
        }
    }

    /// Encode `message` and write it as one line.
    pub fn write(&self, message: &ServerMessage) -> Result<(), WriteError> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let mut guard = self.lock();
        let Some(sink) = guard.as_mut() else {
            return Err(WriteError::Closed);
        };
        if let Err(e) = sink.write_all(&line).and_then(|()| sink.flush()) {
            *guard = None;
            return Err(e.into());
        }
        debug!("sent {}", String::from_utf8_lossy(&line).trim_end());
        Ok(())
    }

    /// Drop the sink. Later writes fail with [`WriteError::Closed`].
    pub fn close(&self) {
        self.lock().take();
    }

    /// Whether the sink has been dropped.
    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Sink>> {
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
