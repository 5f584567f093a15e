use std::path::PathBuf;

use anyhow::{Context, Error, Result};
use clap::{Parser, Subcommand};
use linedb::{Document, DocumentStore, EngineKind, LogStore, SledStore};

/// Inspect or edit a linedb data directory while the server is stopped.
#[derive(Parser, Debug)]
#[command(author, version)]
struct Cli {
    #[arg(short, long, default_value = "./")]
    data_dir: PathBuf,
    /// Engine to open; detected from the directory when omitted
    #[arg(short, long, value_enum)]
    engine: Option<EngineKind>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Get {
        collection: String,
        key: String,
    },
    Put {
        collection: String,
        key: String,
        /// The document, a JSON object
        document: String,
    },
}

fn run<S: DocumentStore>(store: S, command: Commands) -> Result<()> {
    match command {
        Commands::Get { collection, key } => {
            let found = if store.collection_exists(&collection)? {
                store.get(&collection, &key)?
            } else {
                None
            };
            match found {
                Some(doc) => println!("{}", serde_json::to_string(&doc)?),
                None => println!("Key not found"),
            }
        }
        Commands::Put {
            collection,
            key,
            document,
        } => {
            let doc: Document =
                serde_json::from_str(&document).context("document must be a JSON object")?;
            store.ensure_collection(&collection)?;
            store.upsert(&collection, &key, doc)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let detected = EngineKind::detect(&cli.data_dir)?;
    let engine = match (cli.engine, detected) {
        (Some(wanted), Some(previous)) if wanted != previous => {
            return Err(Error::msg(format!(
                "Wrong engine! Previous: {previous}, current: {wanted}"
            )));
        }
        (Some(engine), _) | (None, Some(engine)) => engine,
        (None, None) => EngineKind::Log,
    };

    match engine {
        EngineKind::Log => run(LogStore::open(&cli.data_dir)?, cli.command),
        EngineKind::Sled => run(SledStore::open(&cli.data_dir)?, cli.command),
    }
}
