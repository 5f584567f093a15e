//! The per-connection protocol engine.
//!
//! Bytes from the socket go into a [`FrameBuffer`]; each complete frame is
//! validated and either answered with an error right away or handed to the
//! [`Dispatcher`]. How many requests are dispatched per read is governed by
//! the [`DrainPolicy`].

use std::io::{self, Read};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::DrainPolicy;
use crate::dispatch::{Dispatcher, Handlers};
use crate::error::WriteError;
use crate::frame::FrameBuffer;
use crate::protocol::ServerMessage;
use crate::thread_pool::ThreadPool;
use crate::validator::validate;
use crate::writer::ResponseWriter;

const READ_CHUNK: usize = 8 * 1024;

/// What one read event did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Requests handed to the dispatcher.
    pub dispatched: usize,
    /// Frames answered with a validation error.
    pub rejected: usize,
}

/// State of a single client connection.
pub struct Connection<H, P> {
    frames: FrameBuffer,
    dispatcher: Dispatcher<H, P>,
    writer: ResponseWriter,
    drain: DrainPolicy,
}

impl<H: Handlers, P: ThreadPool> Connection<H, P> {
    /// A connection answering on `writer`.
    pub fn new(handlers: H, pool: Arc<P>, writer: ResponseWriter, drain: DrainPolicy) -> Self {
        Self {
            frames: FrameBuffer::new(),
            dispatcher: Dispatcher::new(handlers, pool, writer.clone()),
            writer,
            drain,
        }
    }

    /// Handle one read event.
    ///
    /// Invalid frames are answered in place and do not count towards the
    /// drain limit. With [`DrainPolicy::OnePerRead`] this returns after the
    /// first dispatched request, leaving later frames buffered; an empty
    /// `bytes` still drains the next buffered frame.
    ///
    /// A failed write means the connection is unusable; the caller should
    /// drop it. Once any write has failed, including one from a handler,
    /// every later read event fails with [`WriteError::Closed`] without
    /// dispatching anything.
    pub fn on_read(&mut self, bytes: &[u8]) -> Result<ReadOutcome, WriteError> {
        if self.writer.is_closed() {
            return Err(WriteError::Closed);
        }
        self.frames.feed(bytes);
        let mut outcome = ReadOutcome::default();
        while let Some(frame) = self.frames.next_frame() {
            match validate(&frame) {
                Ok(message) => {
                    debug!("received {}", message.tag());
                    self.dispatcher.dispatch(message);
                    outcome.dispatched += 1;
                    if self.drain == DrainPolicy::OnePerRead {
                        break;
                    }
                }
                Err(e) => {
                    debug!("rejected frame: {e}");
                    self.writer.write(&ServerMessage::error(e.to_string()))?;
                    outcome.rejected += 1;
                }
            }
        }
        Ok(outcome)
    }

    /// Bytes received but not yet consumed as frames.
    pub fn buffered(&self) -> usize {
        self.frames.pending()
    }

    /// Read from `reader` until end of stream or a fatal error.
    ///
    /// Every successful `read` is one read event. The writer is closed on
    /// return, so handlers still running afterwards fail their write instead
    /// of reaching a dead socket.
    pub fn serve<R: Read>(mut self, mut reader: R) -> io::Result<()> {
        let mut buf = vec![0; READ_CHUNK];
        let result = loop {
            let n = match reader.read(&mut buf) {
                Ok(0) => break Ok(()),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            };
            if let Err(e) = self.on_read(&buf[..n]) {
                warn!("closing connection after failed write: {e}");
                break Ok(());
            }
        };
        if self.frames.pending() > 0 {
            info!(
                "connection closed with {} unprocessed bytes",
                self.frames.pending()
            );
        }
        self.writer.close();
        result
    }
}
