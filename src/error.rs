//! Error
//!
//! This module provides the errors raised by the document stores, the
//! request handlers and the response writer, built with [`thiserror`].
//!
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::schema::SchemaIssues;

/// Result use the [`StoreError`] as error.
pub type Result<T> = std::result::Result<T, StoreError>;

/// StoreError is the specific error for [`crate::DocumentStore`] backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io error {0}")]
    /// IO relevant errors
    IOError(#[from] io::Error),
    #[error("serde error {0}")]
    /// Serialized or Deserialized errors
    SerdeError(#[from] serde_json::Error),
    #[error("sled error {0}")]
    /// Errors reported by the sled backend
    SledError(#[from] sled::Error),

    /// Operation on a collection that was never created
    #[error("the collection {0} does not exist")]
    NoSuchCollection(String),

    /// A log line that cannot be replayed
    #[error("corrupt record in {} at offset {offset}", .path.display())]
    CorruptLog {
        /// Log file holding the record.
        path: PathBuf,
        /// Byte offset of the record.
        offset: u64,
    },

    /// A data directory holds files of more than one engine
    #[error("both log and sled data detected in {}", .0.display())]
    MixedEngines(PathBuf),

    /// A store lock was poisoned by a panicking writer
    #[error("store lock poisoned")]
    Poisoned,
}

/// Failures a request handler reports back to the dispatcher.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler set does not serve this tag.
    #[error("Unknown message: {0}")]
    Unsupported(&'static str),
    /// A stored document does not match the outgoing message shape.
    #[error("{0}")]
    Invalid(SchemaIssues),
    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures writing a response line to the connection.
#[derive(Error, Debug)]
pub enum WriteError {
    /// The connection was closed before the write.
    #[error("connection closed")]
    Closed,
    /// The transport rejected the write.
    #[error("write failed: {0}")]
    Io(#[from] io::Error),
    /// The response could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}
