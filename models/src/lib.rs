// models/src/lib.rs

pub mod errors;
pub mod identifiers;
pub mod medical;

pub use errors::{ClinicError, ClinicResult, Entity, ErrorKind, ValidationError, ValidationResult};
pub use identifiers::{AccountId, MedicineId, PrescriptionId, PrescriptionItemId, QueueId, SettlementId, VisitId};
