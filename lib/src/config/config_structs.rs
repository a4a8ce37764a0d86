// lib/src/config/config_structs.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::config_defaults::*;

/// Settings for the embedded sled database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// `None` disables the background flusher; writes then become durable
    /// only on an explicit flush.
    #[serde(default = "default_flush_every_ms")]
    pub flush_every_ms: Option<u64>,
    /// A temporary database is removed when the last handle drops.
    #[serde(default = "default_temporary")]
    pub temporary: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            data_directory: default_data_directory(),
            cache_capacity: default_cache_capacity(),
            flush_every_ms: default_flush_every_ms(),
            temporary: default_temporary(),
        }
    }
}

/// Top-level YAML document: the storage settings live under `storage:`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfigWrapper {
    pub storage: StorageConfig,
}
