// lib/src/config/config_defaults.rs

use std::path::PathBuf;

pub const DEFAULT_DATA_DIRECTORY: &str = "./clinic_data";
pub const DEFAULT_STORAGE_CONFIG_PATH: &str = "./config/storage_config.yaml";

pub fn default_data_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIRECTORY)
}

// 256 MiB page cache
pub fn default_cache_capacity() -> u64 {
    256 * 1024 * 1024
}

pub fn default_flush_every_ms() -> Option<u64> {
    Some(500)
}

pub fn default_temporary() -> bool {
    false
}
