// lib/src/clinic/mod.rs

pub mod clock;
pub mod inventory;
pub mod prescriptions;
pub mod sequencer;
pub mod service;
pub mod settlement;
pub mod visits;

pub use clock::{Clock, FixedClock, SystemClock};
pub use inventory::InventoryLedger;
pub use prescriptions::{NewPrescription, PrescriptionWorkflow};
pub use sequencer::QueueSequencer;
pub use service::ClinicService;
pub use settlement::{SettlementRequest, SettlementWorkflow};
pub use visits::{ExaminationRequest, RegistrationReceipt, VisitSummary, VisitWorkflow};
