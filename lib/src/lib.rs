// lib/src/lib.rs

pub mod clinic;
pub mod config;
pub mod storage_engine;

pub use crate::clinic::{
    Clock, ClinicService, ExaminationRequest, FixedClock, NewPrescription, RegistrationReceipt,
    SettlementRequest, SystemClock, VisitSummary,
};
pub use crate::config::StorageConfig;
pub use crate::storage_engine::{AccountStorageEngine, ClinicStore, SledAccountStorage};
