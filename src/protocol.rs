//! Client-server communication protocol definitions.
//!
//! This module defines the message types exchanged over a connection. Both
//! directions use a `message` field as discriminant, but requests and responses
//! are separate types so one can never be mistaken for the other.

use serde::{Deserialize, Serialize};

use crate::store::Document;

/// Client request message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "message", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Fetch the config of a guild.
    GetConfig {
        /// Guild id.
        id: String,
    },
    /// Create or replace the config of a guild.
    UpdateConfig {
        /// The full config, keyed by its `guild` field.
        config: ConfigRecord,
    },
    /// Persist a chat message record.
    SaveMessage(SaveRecord),
    /// Fetch a chat message record.
    GetMessage {
        /// Message id.
        id: String,
    },
    /// Persist a user record.
    SaveUser(SaveRecord),
    /// Fetch a user record.
    GetUser {
        /// User id.
        id: String,
    },
    /// Store an opaque test blob under a generated key.
    PutTestData {
        /// The blob.
        data: String,
    },
    /// Fetch a test blob.
    GetTestData {
        /// Key returned by `put_test_data`.
        id: String,
    },
}

impl ClientMessage {
    /// The wire value of the discriminant.
    pub fn tag(&self) -> &'static str {
        match self {
            ClientMessage::GetConfig { .. } => "get_config",
            ClientMessage::UpdateConfig { .. } => "update_config",
            ClientMessage::SaveMessage(_) => "save_message",
            ClientMessage::GetMessage { .. } => "get_message",
            ClientMessage::SaveUser(_) => "save_user",
            ClientMessage::GetUser { .. } => "get_user",
            ClientMessage::PutTestData { .. } => "put_test_data",
            ClientMessage::GetTestData { .. } => "get_test_data",
        }
    }
}

/// Payload of the `save_*` requests.
///
/// `id`, when given, becomes the storage key. Everything else except the
/// discriminant is the record body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SaveRecord {
    /// Key to store the record under. A key is generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The record body.
    #[serde(flatten)]
    pub fields: Document,
}

/// A guild config. The `guild` field is the storage key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConfigRecord {
    /// Guild id.
    pub guild: String,
    /// Remaining config fields.
    #[serde(flatten)]
    pub fields: Document,
}

/// A stored record with its key re-attached as `id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Record {
    /// Storage key.
    pub id: String,
    /// The stored body.
    #[serde(flatten)]
    pub fields: Document,
}

/// Server response message.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "message", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Operation completed successfully.
    Ok,
    /// Nothing is stored under the requested key.
    No,
    /// Operation failed with error message.
    Error {
        /// Human readable diagnostic.
        error: String,
    },
    /// A guild config.
    Config {
        /// The config, `guild` included.
        config: ConfigRecord,
    },
    /// A chat message record.
    Message(Record),
    /// A user record.
    User(Record),
    /// A test blob.
    TestData {
        /// Storage key.
        id: String,
        /// The blob.
        data: String,
    },
}

impl ServerMessage {
    /// An `error` response carrying `error`.
    pub fn error(error: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: error.into(),
        }
    }
}
