use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use spdlog::{info, warn};

use quire::config::Storage as StorageConfig;
use quire::content_store::ContentStore;
use quire::logger::configure_logger;
use quire::server::server_run;
use quire::storage::{DirStorage, MemoryStorage, Storage};

use crate::config::open_config;

mod config;

const CFG_FILE_NAME: &str = "quire.toml";

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Config path
    #[arg(short, long)]
    config_path: Option<String>,

    /// Development mode: no cache headers on static files, drafts listed
    #[arg(short, long)]
    dev: bool,
}

fn open_storage(cfg: &StorageConfig) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match cfg {
        StorageConfig::Memory => {
            warn!("Using in-memory storage. Uploaded posts are lost on restart");
            Arc::new(MemoryStorage::new())
        }
        StorageConfig::Disk { root } => {
            info!("Using storage at {}", root.display());
            Arc::new(DirStorage::new(root)?)
        }
    };
    Ok(storage)
}

#[ntex::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.config_path.map(PathBuf::from);

    let mut config = match open_config(config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{:#}", err);
            eprintln!("Please run quire --help");
            return Ok(());
        }
    };
    config.site.development |= args.dev;

    if let Err(err) = configure_logger(&config) {
        warn!("Error creating logger sinks. Using console instead. Desc={}", err);
    }

    info!("Starting quire =-=-=-=-=-=-=-=-=-=-=-=-=-=-=-");

    let storage = open_storage(&config.storage)?;
    let store = ContentStore::open(storage)?;

    info!("Listening on {}:{}", config.server.address, config.server.port);
    server_run(config, store).await
}
