use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};

use quire::config::{read_config, Config};

use crate::CFG_FILE_NAME;

fn get_config_path() -> Option<PathBuf> {
    let exe_dir = env::current_exe().ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()));
    let cur_dir = env::current_dir().ok();

    [exe_dir, cur_dir, dirs::config_dir()]
        .into_iter()
        .flatten()
        .map(|dir| dir.join(CFG_FILE_NAME))
        .find(|path| path.exists())
}

/// Reads the configuration. Without an explicit path and with no
/// configuration file found, the built-in memory backed defaults are used.
pub(crate) fn open_config(cfg_path: Option<PathBuf>) -> Result<Config> {
    let config_path = match cfg_path.or_else(get_config_path) {
        Some(path) => path,
        None => {
            println!("No {} found. Using in-memory storage defaults", CFG_FILE_NAME);
            return Ok(Config::default());
        }
    };

    println!("Reading config from {}", config_path.display());
    let mut config = read_config(&config_path)
        .with_context(|| format!("Could not load {}", config_path.display()))?;

    if let Some(mut log) = config.log {
        if log.location.is_none() {
            let cache_dir = dirs::cache_dir()
                .ok_or_else(|| anyhow!("Could not find user cache dir for the log files"))?;
            log.location = Some(cache_dir.join("quire").join("log").join("server.log"));
        }
        if let Some(ref location) = log.location {
            println!("Log enabled. Files will be written in {}", location.display());
        }
        config.log = Some(log);
    } else {
        println!("Log disabled. Using stdout");
    }

    Ok(config)
}
