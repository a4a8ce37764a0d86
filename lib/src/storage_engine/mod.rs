// lib/src/storage_engine/mod.rs

pub mod account_storage;
pub mod sled_storage;
pub mod storage_utils;

pub use account_storage::{AccountStorageEngine, SledAccountStorage};
pub use sled_storage::ClinicStore;
