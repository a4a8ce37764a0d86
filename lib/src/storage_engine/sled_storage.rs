// lib/src/storage_engine/sled_storage.rs

use std::fs;

use log::{debug, error, info};
use sled::{Db, Tree};

use crate::config::StorageConfig;
use models::errors::{ClinicError, ClinicResult};

pub const ACCOUNTS_TREE: &str = "accounts";
pub const ACCOUNTS_BY_EMAIL_TREE: &str = "accounts_by_email";
pub const PATIENTS_TREE: &str = "patients";
pub const STAFF_TREE: &str = "staff";
pub const QUEUES_TREE: &str = "queues";
pub const VISITS_TREE: &str = "visits";
pub const PRESCRIPTIONS_TREE: &str = "prescriptions";
pub const MEDICINES_TREE: &str = "medicines";
pub const SETTLEMENTS_TREE: &str = "settlements";
pub const ACTIVE_QUEUE_BY_PATIENT_TREE: &str = "active_queue_by_patient";
pub const PRESCRIPTION_BY_VISIT_TREE: &str = "prescription_by_visit";
pub const SETTLEMENT_BY_VISIT_TREE: &str = "settlement_by_visit";
pub const QUEUE_COUNTERS_TREE: &str = "queue_counters";

/// Handles to every tree of the clinic database.
///
/// Entity trees are keyed by the big-endian id. The `*_by_*` trees are unique
/// indexes; a key present there is the storage-level constraint that keeps a
/// patient to one live ticket and a visit to one prescription and one
/// settlement. Cloning is cheap, all handles are reference counted.
#[derive(Clone)]
pub struct ClinicStore {
    db: Db,
    pub accounts: Tree,
    pub accounts_by_email: Tree,
    pub patients: Tree,
    pub staff: Tree,
    pub queues: Tree,
    pub visits: Tree,
    pub prescriptions: Tree,
    pub medicines: Tree,
    pub settlements: Tree,
    pub active_queue_by_patient: Tree,
    pub prescription_by_visit: Tree,
    pub settlement_by_visit: Tree,
    pub queue_counters: Tree,
}

impl ClinicStore {
    pub fn open(config: &StorageConfig) -> ClinicResult<Self> {
        info!("Initializing clinic store with config: {:?}", config);

        let mut sled_config = sled::Config::new()
            .cache_capacity(config.cache_capacity)
            .flush_every_ms(config.flush_every_ms);

        if config.temporary {
            sled_config = sled_config.temporary(true);
        } else {
            let db_path = &config.data_directory;
            if !db_path.exists() {
                info!("Creating database directory at {:?}", db_path);
                fs::create_dir_all(db_path).map_err(|e| {
                    error!("Failed to create directory at {:?}: {}", db_path, e);
                    ClinicError::Infrastructure(format!("failed to create directory {:?}: {}", db_path, e))
                })?;
            }
            sled_config = sled_config.path(db_path);
        }

        let db = sled_config.open().map_err(|e| {
            error!("Failed to open sled database at {:?}: {}", config.data_directory, e);
            ClinicError::from(e)
        })?;
        let store = Self::with_db(db)?;
        info!("Opened clinic store at {:?}", config.data_directory);
        Ok(store)
    }

    /// Throwaway database removed on drop.
    pub fn temporary() -> ClinicResult<Self> {
        Self::open(&StorageConfig::temporary())
    }

    fn with_db(db: Db) -> ClinicResult<Self> {
        Ok(ClinicStore {
            accounts: db.open_tree(ACCOUNTS_TREE)?,
            accounts_by_email: db.open_tree(ACCOUNTS_BY_EMAIL_TREE)?,
            patients: db.open_tree(PATIENTS_TREE)?,
            staff: db.open_tree(STAFF_TREE)?,
            queues: db.open_tree(QUEUES_TREE)?,
            visits: db.open_tree(VISITS_TREE)?,
            prescriptions: db.open_tree(PRESCRIPTIONS_TREE)?,
            medicines: db.open_tree(MEDICINES_TREE)?,
            settlements: db.open_tree(SETTLEMENTS_TREE)?,
            active_queue_by_patient: db.open_tree(ACTIVE_QUEUE_BY_PATIENT_TREE)?,
            prescription_by_visit: db.open_tree(PRESCRIPTION_BY_VISIT_TREE)?,
            settlement_by_visit: db.open_tree(SETTLEMENT_BY_VISIT_TREE)?,
            queue_counters: db.open_tree(QUEUE_COUNTERS_TREE)?,
            db,
        })
    }

    /// Monotonic row id, unique across restarts.
    pub fn generate_id(&self) -> ClinicResult<u64> {
        Ok(self.db.generate_id()?)
    }

    pub fn flush(&self) -> ClinicResult<()> {
        let bytes = self.db.flush()?;
        debug!("Flushed {} bytes to disk", bytes);
        Ok(())
    }

    pub async fn flush_async(&self) -> ClinicResult<()> {
        self.db.flush_async().await?;
        Ok(())
    }
}
