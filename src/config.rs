use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use crate::http::handlers::SharedBackend;
use crate::store::memory_store::MemoryStore;
use crate::store::shelf_store::ShelfBackend;

const DEFAULT_PORT: u16 = 9000;
const DEFAULT_DB_PATH: &str = "data/probes.db";
const DEFAULT_BODY_LIMIT: u64 = 1024 * 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
    #[error("unknown storage {0:?}, expected \"file\" or \"memory\"")]
    UnknownStorage(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Storage {
    File(PathBuf),
    Memory,
}

impl Storage {
    pub fn backend(&self) -> SharedBackend {
        match self {
            Storage::File(path) => Arc::new(ShelfBackend::new(path.clone())),
            Storage::Memory => Arc::new(MemoryStore::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub storage: Storage,
    pub body_limit: u64,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = parse_var(&lookup, "PROBE_REGISTRY_HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port = parse_var(&lookup, "PROBE_REGISTRY_PORT", DEFAULT_PORT)?;
        let body_limit = parse_var(&lookup, "PROBE_REGISTRY_BODY_LIMIT", DEFAULT_BODY_LIMIT)?;

        let db_path = lookup("PROBE_REGISTRY_DB")
            .filter(|path| !path.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let storage = match lookup("PROBE_REGISTRY_STORAGE").as_deref().map(str::trim) {
            None | Some("") | Some("file") => Storage::File(PathBuf::from(db_path)),
            Some("memory") => Storage::Memory,
            Some(other) => return Err(ConfigError::UnknownStorage(other.to_string())),
        };

        Ok(Config {
            host,
            port,
            storage,
            body_limit,
        })
    }
}

fn parse_var<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => value.trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}
