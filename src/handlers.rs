//! Request handlers backed by a [`DocumentStore`].

use log::{debug, info};
use serde_json::{Map, Value};

use crate::dispatch::{HandlerResult, Handlers};
use crate::error::{HandlerError, Result};
use crate::protocol::{ConfigRecord, SaveRecord, ServerMessage};
use crate::schema::{SchemaIssues, Variant};
use crate::store::{Document, DocumentStore};
use crate::validator::{
    CONFIG_RESPONSE, MESSAGE_RESPONSE, TAG_FIELD, TEST_DATA_RESPONSE, USER_RESPONSE,
};

/// Guild configs, keyed by guild id.
pub const CONFIG: &str = "config";
/// Chat message records.
pub const MESSAGES: &str = "messages";
/// User records.
pub const USERS: &str = "users";
/// Opaque test blobs.
pub const TEST_DATA: &str = "test_data";

/// Every collection the handlers use.
pub const COLLECTIONS: [&str; 4] = [CONFIG, MESSAGES, USERS, TEST_DATA];

/// The production handler set.
#[derive(Clone)]
pub struct StoreHandlers<S> {
    store: S,
    test_data: bool,
}

impl<S: DocumentStore> StoreHandlers<S> {
    /// Handlers over `store`, creating any collection that does not exist yet.
    pub fn new(store: S) -> Result<Self> {
        for collection in COLLECTIONS {
            if !store.collection_exists(collection)? {
                info!("creating collection {collection}");
                store.create_collection(collection)?;
            }
        }
        Ok(Self {
            store,
            test_data: true,
        })
    }

    /// Serve or refuse the `*_test_data` requests.
    pub fn with_test_data(mut self, enabled: bool) -> Self {
        self.test_data = enabled;
        self
    }

    fn save(&self, collection: &str, record: SaveRecord) -> HandlerResult {
        let SaveRecord { id, fields } = record;
        match id {
            Some(key) => self.store.upsert(collection, &key, fields)?,
            None => {
                let key = self.store.insert(collection, fields)?;
                debug!("stored {collection}/{key} under a generated key");
            }
        }
        Ok(ServerMessage::Ok)
    }

    /// Look `key` up, build the response value, and make sure it has the
    /// shape clients expect before sending it.
    fn fetch(
        &self,
        collection: &str,
        key: String,
        shape: &Variant,
        assemble: fn(String, Document) -> Value,
    ) -> HandlerResult {
        let Some(doc) = self.store.get(collection, &key)? else {
            return Ok(ServerMessage::No);
        };
        let value = assemble(key, doc);
        shape
            .check(TAG_FIELD, &value)
            .map_err(HandlerError::Invalid)?;
        serde_json::from_value(value)
            .map_err(|e| HandlerError::Invalid(SchemaIssues::root(e.to_string())))
    }
}

fn tagged(tag: &str) -> Map<String, Value> {
    let mut value = Map::new();
    value.insert(TAG_FIELD.to_owned(), Value::String(tag.to_owned()));
    value
}

// Stored fields override the tag but never the key.
fn record_response(tag: &str, key: String, doc: Document) -> Value {
    let mut value = tagged(tag);
    value.extend(doc);
    value.insert("id".to_owned(), Value::String(key));
    Value::Object(value)
}

fn message_response(key: String, doc: Document) -> Value {
    record_response(MESSAGE_RESPONSE.tag, key, doc)
}

fn user_response(key: String, doc: Document) -> Value {
    record_response(USER_RESPONSE.tag, key, doc)
}

fn test_data_response(key: String, doc: Document) -> Value {
    record_response(TEST_DATA_RESPONSE.tag, key, doc)
}

fn config_response(key: String, doc: Document) -> Value {
    let mut config = doc;
    config.insert("guild".to_owned(), Value::String(key));
    let mut value = tagged(CONFIG_RESPONSE.tag);
    value.insert("config".to_owned(), Value::Object(config));
    Value::Object(value)
}

impl<S: DocumentStore> Handlers for StoreHandlers<S> {
    fn get_config(&self, id: String) -> HandlerResult {
        self.fetch(CONFIG, id, &CONFIG_RESPONSE, config_response)
    }

    fn update_config(&self, config: ConfigRecord) -> HandlerResult {
        let ConfigRecord { guild, fields } = config;
        self.store.upsert(CONFIG, &guild, fields.clone())?;
        Ok(ServerMessage::Config {
            config: ConfigRecord { guild, fields },
        })
    }

    fn save_message(&self, record: SaveRecord) -> HandlerResult {
        self.save(MESSAGES, record)
    }

    fn get_message(&self, id: String) -> HandlerResult {
        self.fetch(MESSAGES, id, &MESSAGE_RESPONSE, message_response)
    }

    fn save_user(&self, record: SaveRecord) -> HandlerResult {
        self.save(USERS, record)
    }

    fn get_user(&self, id: String) -> HandlerResult {
        self.fetch(USERS, id, &USER_RESPONSE, user_response)
    }

    fn put_test_data(&self, data: String) -> HandlerResult {
        if !self.test_data {
            return Err(HandlerError::Unsupported("put_test_data"));
        }
        let mut doc = Document::new();
        doc.insert("data".to_owned(), Value::String(data.clone()));
        let id = self.store.insert(TEST_DATA, doc)?;
        Ok(ServerMessage::TestData { id, data })
    }

    fn get_test_data(&self, id: String) -> HandlerResult {
        if !self.test_data {
            return Err(HandlerError::Unsupported("get_test_data"));
        }
        self.fetch(TEST_DATA, id, &TEST_DATA_RESPONSE, test_data_response)
    }
}
