use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::err::{DbError, DbResult};

/// Process configuration. Every field has a default so a partial TOML
/// file (or none at all) yields a runnable server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port the dispatcher binds.
    pub port: u16,

    /// Admission limit; sockets beyond it are closed on accept.
    pub max_connections: usize,

    /// Worker threads executing connection handlers.
    pub worker_pool_size: usize,

    /// Root directory holding one `<table>.dat` file per table.
    pub storage_directory: String,

    /// Page capacity of the buffer pool.
    pub buffer_pool_max_pages: usize,

    pub default_user: String,

    pub default_password: String,

    /// How long shutdown waits for in-flight connections to drain.
    pub shutdown_timeout_ms: u64,

    /// Log directory; stdout when unset.
    pub log_dir: Option<String>,

    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: 7878,
            max_connections: 64,
            worker_pool_size: 8,
            storage_directory: String::from("./data"),
            buffer_pool_max_pages: 256,
            default_user: String::from("admin"),
            default_password: String::from("admin"),
            shutdown_timeout_ms: 5_000,
            log_dir: None,
            debug: false,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> DbResult<Self> {
        toml::from_str(text).map_err(|e| DbError::Config(e.to_string()))
    }
}
