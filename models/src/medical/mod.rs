// models/src/medical/mod.rs

pub mod account;
pub mod medicine;
pub mod patient;
pub mod prescription;
pub mod queue;
pub mod role;
pub mod settlement;
pub mod staff;
pub mod visit;

pub use account::{normalize_email, Account, AccountSummary, Login, NewAccount};
pub use medicine::{Medicine, MedicineUpdate, NewMedicine};
pub use patient::{PatientProfile, PatientProfileUpdate};
pub use prescription::{
    validate_items, NewPrescriptionItem, Prescription, PrescriptionItem, PrescriptionStatus,
};
pub use queue::{QueuePosition, QueueStatus, QueueTicket};
pub use role::{Action, Actor, Role};
pub use settlement::{PaymentMethod, Settlement, SettlementStatus};
pub use staff::StaffProfile;
pub use visit::{Examination, Visit, VisitStatus};
