//! Server configuration.

use std::path::PathBuf;

use clap::ValueEnum;

use crate::store::EngineKind;

/// How many buffered requests a connection dispatches per read.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum DrainPolicy {
    /// Dispatch at most one request per read from the socket. Further complete
    /// requests wait in the buffer until the client sends more bytes.
    #[default]
    OnePerRead,
    /// Dispatch every complete request as soon as it is read.
    All,
}

/// Everything the server binary can be told on the command line.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to listen on.
    pub addr: String,
    /// Storage backend.
    pub engine: EngineKind,
    /// Where the backend keeps its files.
    pub data_dir: PathBuf,
    /// Per-connection drain policy.
    pub drain: DrainPolicy,
    /// Handler worker threads.
    pub workers: usize,
    /// Whether `put_test_data` / `get_test_data` are served.
    pub test_data: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:4000".to_owned(),
            engine: EngineKind::Log,
            data_dir: PathBuf::from("./"),
            drain: DrainPolicy::default(),
            workers: num_cpus::get(),
            test_data: true,
        }
    }
}
