//! Newline framing for the inbound byte stream.
//!
//! A [`FrameBuffer`] collects whatever the socket hands over and cuts it into
//! `\n`-terminated frames. Bytes after the last delimiter stay buffered until
//! the rest of their frame arrives.

const DELIMITER: u8 = b'\n';

/// One complete line of the wire protocol, without its delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    /// The raw bytes of the frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the frame, returning its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Growable per-connection buffer with a scan cursor.
///
/// `start` marks the first unconsumed byte and `scanned` the first byte not yet
/// searched for a delimiter, so a long partial frame is only scanned once no
/// matter how many reads it takes to arrive.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: Vec<u8>,
    start: usize,
    scanned: usize,
    skip_whitespace: bool,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            start: 0,
            scanned: 0,
            skip_whitespace: true,
        }
    }

    /// Append bytes received from the connection.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.start > 0 && self.start * 2 >= self.buf.len() {
            self.buf.drain(..self.start);
            self.scanned -= self.start;
            self.start = 0;
        }
        self.buf.extend_from_slice(bytes);
    }

    /// Take the next complete frame, if one is buffered.
    ///
    /// Whitespace following a delimiter is dropped before the next frame
    /// starts, even when it arrives in a later [`feed`](Self::feed).
    pub fn next_frame(&mut self) -> Option<Frame> {
        if self.skip_whitespace {
            while self.start < self.buf.len() && self.buf[self.start].is_ascii_whitespace() {
                self.start += 1;
            }
            if self.start == self.buf.len() {
                self.scanned = self.start;
                return None;
            }
            self.skip_whitespace = false;
        }

        let from = self.scanned.max(self.start);
        match self.buf[from..].iter().position(|&b| b == DELIMITER) {
            Some(offset) => {
                let end = from + offset;
                let frame = Frame(self.buf[self.start..end].to_vec());
                self.start = end + 1;
                self.scanned = self.start;
                self.skip_whitespace = true;
                Some(frame)
            }
            None => {
                self.scanned = self.buf.len();
                None
            }
        }
    }

    /// Number of buffered bytes not yet returned in a frame.
    pub fn pending(&self) -> usize {
        self.buf.len() - self.start
    }
}
