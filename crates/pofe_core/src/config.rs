//! Store configuration and environment overrides.
//!
//! # Responsibility
//! - Describe where the context database lives and how it is opened.
//! - Resolve overrides from `POFE_*` environment variables.
//!
//! # Invariants
//! - Blank environment values are treated as unset.
//! - Unparseable values are rejected instead of silently defaulted.

use crate::db::{open_db_with_timeout, DEFAULT_BUSY_TIMEOUT};
use crate::logging::default_log_level;
use crate::repo::document_store::{SqliteDocumentStore, StoreResult};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const CONTEXT_DIR_ENV: &str = "POFE_CONTEXT_DIR";
pub const DB_FILE_ENV: &str = "POFE_DB_FILE";
pub const BUSY_TIMEOUT_ENV: &str = "POFE_BUSY_TIMEOUT_MS";
pub const LOG_LEVEL_ENV: &str = "POFE_LOG_LEVEL";

const DEFAULT_CONTEXT_DIR: &str = "context";
const DEFAULT_DB_FILE_NAME: &str = "context.db";

/// Configuration error for environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue { key: &'static str, value: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { key, value } => {
                write!(f, "invalid value `{value}` for `{key}`")
            }
        }
    }
}

impl Error for ConfigError {}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where and how the context store is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the database file and exported layers.
    pub context_dir: PathBuf,
    /// Database file name inside `context_dir`.
    pub db_file_name: String,
    pub busy_timeout: Duration,
    pub log_level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            context_dir: PathBuf::from(DEFAULT_CONTEXT_DIR),
            db_file_name: DEFAULT_DB_FILE_NAME.to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            log_level: default_log_level().to_string(),
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by `POFE_*` process environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values returned from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();
        if let Some(dir) = read(CONTEXT_DIR_ENV) {
            config.context_dir = PathBuf::from(dir);
        }
        if let Some(file) = read(DB_FILE_ENV) {
            config.db_file_name = file;
        }
        if let Some(raw) = read(BUSY_TIMEOUT_ENV) {
            let millis = raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: BUSY_TIMEOUT_ENV,
                    value: raw.clone(),
                })?;
            config.busy_timeout = Duration::from_millis(millis);
        }
        if let Some(level) = read(LOG_LEVEL_ENV) {
            config.log_level = level;
        }
        Ok(config)
    }

    /// Full path of the database file.
    pub fn db_path(&self) -> PathBuf {
        self.context_dir.join(&self.db_file_name)
    }
}

/// Opens the store described by `config`, creating its directory if needed.
pub fn open_store(config: &StoreConfig) -> StoreResult<SqliteDocumentStore> {
    std::fs::create_dir_all(&config.context_dir)?;
    let path = config.db_path();
    let store = SqliteDocumentStore::try_new(open_db_with_timeout(&path, config.busy_timeout)?)?;
    info!(
        "event=store_open module=config status=ok path={}",
        path.display()
    );
    Ok(store)
}
