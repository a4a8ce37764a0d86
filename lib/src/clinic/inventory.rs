// lib/src/clinic/inventory.rs

use log::{info, warn};

use crate::storage_engine::storage_utils::{abort, encode, get_record, scan_records, tx_decode, tx_encode, TxResult};
use crate::storage_engine::ClinicStore;
use models::errors::{ClinicError, ClinicResult, Entity, ValidationError};
use models::identifiers::MedicineId;
use models::medical::{Medicine, MedicineUpdate, NewMedicine};

/// The medicine catalogue and its stock levels. Stock only leaves through
/// [`PrescriptionWorkflow::dispense`](crate::clinic::PrescriptionWorkflow::dispense).
#[derive(Clone)]
pub struct InventoryLedger {
    store: ClinicStore,
}

impl InventoryLedger {
    pub fn new(store: ClinicStore) -> Self {
        Self { store }
    }

    pub fn create_medicine(&self, new: NewMedicine) -> ClinicResult<Medicine> {
        new.validate()?;
        let id = MedicineId(self.store.generate_id()?);
        let medicine = Medicine::from_new(id, new);
        self.store.medicines.insert(id.to_key(), encode(&medicine)?)?;
        info!("Added medicine {} ({}) with stock {}", medicine.name, id, medicine.stock);
        Ok(medicine)
    }

    pub fn update_medicine(&self, id: MedicineId, update: MedicineUpdate) -> ClinicResult<Medicine> {
        let key = id.to_key();
        let medicine = self.store.medicines.transaction(|medicines| -> TxResult<Medicine> {
            let Some(bytes) = medicines.get(&key[..])? else {
                return abort(ClinicError::not_found(Entity::Medicine, id));
            };
            let mut medicine: Medicine = tx_decode(&bytes)?;
            if let Err(e) = medicine.apply(update.clone()) {
                return abort(e);
            }
            medicines.insert(&key[..], tx_encode(&medicine)?)?;
            Ok(medicine)
        })?;
        info!("Updated medicine {}", id);
        Ok(medicine)
    }

    pub fn get_medicine(&self, id: MedicineId) -> ClinicResult<Medicine> {
        get_record(&self.store.medicines, &id.to_key())?
            .ok_or_else(|| ClinicError::not_found(Entity::Medicine, id))
    }

    /// The catalogue sorted by name.
    pub fn list_medicines(&self) -> ClinicResult<Vec<Medicine>> {
        let mut medicines: Vec<Medicine> = scan_records(&self.store.medicines)?;
        medicines.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(medicines)
    }

    /// Adds (or, with a negative delta, writes off) stock. The result can
    /// never drop below zero.
    pub fn restock(&self, id: MedicineId, delta: i64) -> ClinicResult<Medicine> {
        let key = id.to_key();
        let medicine = self.store.medicines.transaction(|medicines| -> TxResult<Medicine> {
            let Some(bytes) = medicines.get(&key[..])? else {
                return abort(ClinicError::not_found(Entity::Medicine, id));
            };
            let mut medicine: Medicine = tx_decode(&bytes)?;
            let Some(stock) = medicine.adjusted_stock(delta) else {
                return abort(ValidationError::InvalidValue {
                    field: "delta",
                    value: format!("{} (stock is {})", delta, medicine.stock),
                });
            };
            medicine.stock = stock;
            medicine.updated_at = chrono::Utc::now();
            medicines.insert(&key[..], tx_encode(&medicine)?)?;
            Ok(medicine)
        })?;

        info!("Restocked medicine {} by {}, stock now {}", id, delta, medicine.stock);
        if medicine.is_low() {
            warn!("Medicine {} is at or below its minimum stock ({} <= {})", medicine.name, medicine.stock, medicine.min_stock);
        }
        Ok(medicine)
    }

    /// Medicines at or below their minimum-stock threshold.
    pub fn low_stock(&self) -> ClinicResult<Vec<Medicine>> {
        Ok(self.list_medicines()?.into_iter().filter(Medicine::is_low).collect())
    }
}
