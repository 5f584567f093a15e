pub mod protocol;

pub mod frame;

pub mod schema;

pub mod validator;

pub mod writer;

pub mod dispatch;

pub mod connection;

pub mod handlers;

pub mod config;

pub mod server;

pub mod thread_pool;

pub mod store;

pub mod engine;

mod kv_store;

pub mod error;

mod log_helper;

#[cfg(test)]
mod test_util;

pub use crate::config::{DrainPolicy, ServerConfig};
pub use crate::connection::Connection;
pub use crate::dispatch::{Dispatcher, Handlers};
pub use crate::engine::{LogStore, SledStore};
pub use crate::error::{HandlerError, Result, StoreError, WriteError};
pub use crate::handlers::StoreHandlers;
pub use crate::protocol::{ClientMessage, ServerMessage};
pub use crate::server::Server;
pub use crate::store::{Document, DocumentStore, EngineKind};
