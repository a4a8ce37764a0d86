// lib/src/config/config_impl_storage.rs

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error, info};
use serde_yaml2 as serde_yaml;

use crate::config::config_structs::{StorageConfig, StorageConfigWrapper};

impl StorageConfig {
    /// Loads the storage section of a YAML config file. A missing file yields
    /// the defaults.
    pub fn load(path: &Path) -> Result<StorageConfig> {
        if !path.exists() {
            info!("Storage config not found at {:?}, using defaults", path);
            return Ok(StorageConfig::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read storage config file: {}", path.display()))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse storage config from {}", path.display()))?;
        debug!("Loaded storage config: {:?}", config);
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<StorageConfig> {
        let wrapper: StorageConfigWrapper = serde_yaml::from_str(content)
            .map_err(|e| {
                error!("Deserialization error: {:?}", e);
                e
            })
            .context("YAML is not a valid storage config")?;
        Ok(wrapper.storage)
    }

    /// A throwaway database, used by tests and dry runs.
    pub fn temporary() -> StorageConfig {
        StorageConfig {
            temporary: true,
            flush_every_ms: None,
            ..StorageConfig::default()
        }
    }
}
