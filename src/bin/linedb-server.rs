use std::path::PathBuf;

use anyhow::{Error, Result};
use clap::Parser;
use linedb::{
    DocumentStore, DrainPolicy, EngineKind, LogStore, Server, ServerConfig, SledStore,
    StoreHandlers,
};
use log::info;

#[derive(Parser)]
#[command(author, version)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1:4000")]
    addr: String,
    #[arg(short, long, value_enum, default_value_t = EngineKind::Log)]
    engine: EngineKind,
    /// Directory holding the store's files
    #[arg(short, long, default_value = "./")]
    data_dir: PathBuf,
    /// How many buffered requests to dispatch per socket read
    #[arg(long, value_enum, default_value_t = DrainPolicy::OnePerRead)]
    drain: DrainPolicy,
    /// Handler worker threads (defaults to the number of CPUs)
    #[arg(short, long)]
    workers: Option<usize>,
    /// Answer put_test_data / get_test_data with an unknown-message error
    #[arg(long)]
    no_test_data: bool,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        let defaults = ServerConfig::default();
        ServerConfig {
            addr: args.addr,
            engine: args.engine,
            data_dir: args.data_dir,
            drain: args.drain,
            workers: args.workers.unwrap_or(defaults.workers),
            test_data: !args.no_test_data,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::from(Args::parse());
    info!(
        "linedb {} starting on {} with the {} engine",
        env!("CARGO_PKG_VERSION"),
        config.addr,
        config.engine
    );

    if let Some(previous) = EngineKind::detect(&config.data_dir)? {
        if previous != config.engine {
            return Err(Error::msg(format!(
                "Wrong engine! Previous: {}, current: {}",
                previous, config.engine
            )));
        }
    }

    match config.engine {
        EngineKind::Log => serve(&config, LogStore::open(&config.data_dir)?),
        EngineKind::Sled => serve(&config, SledStore::open(&config.data_dir)?),
    }
}

fn serve<S: DocumentStore>(config: &ServerConfig, store: S) -> Result<()> {
    let handlers = StoreHandlers::new(store)?.with_test_data(config.test_data);
    let server = Server::bind(config, handlers)?;
    server.run()?;
    Ok(())
}
