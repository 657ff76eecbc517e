use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use serde::Deserialize;

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct NavLink {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub rel: String,
}

#[derive(Deserialize, Debug)]
pub struct Site {
    pub title: String,
    /// Absolute URL used in the sitemap, e.g. https://example.com
    pub base_url: String,
    #[serde(default)]
    pub development: bool,
    #[serde(default)]
    pub navigation: Vec<NavLink>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Paths {
    /// Served under /r/
    pub static_dir: Option<PathBuf>,
    /// Overrides the built-in templates when set
    pub template_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum Storage {
    Memory,
    Disk { root: PathBuf },
}

#[derive(Deserialize, Debug)]
pub struct Server {
    pub address: String,
    pub port: u16,
}

#[derive(Deserialize, Debug)]
pub struct Log {
    pub level: LogLevel,
    pub log_to_console: bool,
    pub location: Option<PathBuf>,
}

#[derive(Deserialize, Copy, Clone, Debug, PartialEq)]
pub enum LogLevel {
    Critical = 0,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    pub site: Site,
    #[serde(default)]
    pub paths: Paths,
    pub storage: Storage,
    pub server: Server,
    pub log: Option<Log>,
}

impl Default for Config {
    /// Memory backed server on port 7777.
    fn default() -> Self {
        Config {
            site: Site {
                title: "quire".to_string(),
                base_url: "http://localhost:7777".to_string(),
                development: false,
                navigation: vec![
                    NavLink { title: "about".to_string(), link: "/about".to_string(), rel: "".to_string() },
                    NavLink { title: "writings".to_string(), link: "/".to_string(), rel: "".to_string() },
                ],
            },
            paths: Paths::default(),
            storage: Storage::Memory,
            server: Server {
                address: "0.0.0.0".to_string(),
                port: 7777,
            },
            log: None,
        }
    }
}

fn parse_path(path: PathBuf) -> io::Result<PathBuf> {
    let Some(str_path) = path.to_str() else {
        return Ok(path);
    };
    if !str_path.starts_with("${exe_dir}") {
        return Ok(path);
    }

    let cur_exe = env::current_exe()?;
    let exe_dir = cur_exe.parent()
        .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "Executable has no parent directory"))?;
    Ok(PathBuf::from(str_path.replace("${exe_dir}", &exe_dir.to_string_lossy())))
}

pub fn parse_config(cfg_content: &str) -> io::Result<Config> {
    let mut cfg: Config = match toml::from_str::<Config>(cfg_content) {
        Ok(cfg) => cfg,
        Err(e) => return Err(io::Error::new(
            ErrorKind::InvalidData, format!("Error parsing configuration file: {}", e))),
    };

    cfg.paths = Paths {
        static_dir: cfg.paths.static_dir.map(parse_path).transpose()?,
        template_dir: cfg.paths.template_dir.map(parse_path).transpose()?,
    };
    if let Storage::Disk { root } = cfg.storage {
        cfg.storage = Storage::Disk { root: parse_path(root)? };
    }
    if let Some(ref mut log) = cfg.log {
        log.location = log.location.take().map(parse_path).transpose()?;
    }

    Ok(cfg)
}

pub fn read_config(cfg_path: &Path) -> io::Result<Config> {
    let cfg_content = match fs::read_to_string(cfg_path) {
        Ok(content) => content,
        Err(e) => return Err(io::Error::new(e.kind(), format!("Error opening configuration file {}: {}", cfg_path.display(), e))),
    };

    parse_config(&cfg_content)
}
