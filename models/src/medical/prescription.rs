// models/src/medical/prescription.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ClinicError, ClinicResult, Entity, ValidationError};
use crate::identifiers::{AccountId, MedicineId, PrescriptionId, PrescriptionItemId, VisitId};

/// pending → approved → dispensed, or pending → rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    Pending,
    Approved,
    Rejected,
    Dispensed,
}

impl PrescriptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PrescriptionStatus::Pending => "pending",
            PrescriptionStatus::Approved => "approved",
            PrescriptionStatus::Rejected => "rejected",
            PrescriptionStatus::Dispensed => "dispensed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PrescriptionStatus::Rejected | PrescriptionStatus::Dispensed)
    }

    pub fn can_move_to(self, next: PrescriptionStatus) -> bool {
        matches!(
            (self, next),
            (PrescriptionStatus::Pending, PrescriptionStatus::Approved)
                | (PrescriptionStatus::Pending, PrescriptionStatus::Rejected)
                | (PrescriptionStatus::Approved, PrescriptionStatus::Dispensed)
        )
    }
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrescriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(PrescriptionStatus::Pending),
            "approved" => Ok(PrescriptionStatus::Approved),
            "rejected" => Ok(PrescriptionStatus::Rejected),
            "dispensed" => Ok(PrescriptionStatus::Dispensed),
            _ => Err(ValidationError::InvalidValue { field: "status", value: s.to_string() }),
        }
    }
}

/// One requested line as submitted by the doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPrescriptionItem {
    pub medicine_id: MedicineId,
    pub quantity: u32,
    #[serde(default)]
    pub instruction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionItem {
    pub id: PrescriptionItemId,
    pub medicine_id: MedicineId,
    pub quantity: u32,
    pub instruction: String,
}

/// A doctor-authored medicine list for one completed visit.
///
/// Items are fixed at creation; the record is an audit trail of what was
/// prescribed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: PrescriptionId,
    pub visit_id: VisitId,
    pub doctor_id: AccountId,
    pub pharmacist_id: Option<AccountId>,
    pub status: PrescriptionStatus,
    /// The prescriber's note. Never overwritten after creation.
    pub notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub items: Vec<PrescriptionItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prescription {
    fn move_to(&mut self, next: PrescriptionStatus, pharmacist_id: AccountId) -> ClinicResult<()> {
        if !self.status.can_move_to(next) {
            return Err(ClinicError::invalid_transition(Entity::Prescription, self.status, next));
        }
        self.status = next;
        self.pharmacist_id = Some(pharmacist_id);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn approve(&mut self, pharmacist_id: AccountId) -> ClinicResult<()> {
        self.move_to(PrescriptionStatus::Approved, pharmacist_id)
    }

    pub fn reject(&mut self, pharmacist_id: AccountId, reason: &str) -> ClinicResult<()> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ValidationError::MissingRejectionReason.into());
        }
        self.move_to(PrescriptionStatus::Rejected, pharmacist_id)?;
        self.rejection_reason = Some(reason.to_string());
        Ok(())
    }

    /// Only flips the status; stock movement is the caller's job.
    pub fn mark_dispensed(&mut self, pharmacist_id: AccountId) -> ClinicResult<()> {
        self.move_to(PrescriptionStatus::Dispensed, pharmacist_id)
    }

    pub fn ensure_dispensable(&self) -> ClinicResult<()> {
        if self.status.can_move_to(PrescriptionStatus::Dispensed) {
            Ok(())
        } else {
            Err(ClinicError::invalid_transition(
                Entity::Prescription,
                self.status,
                PrescriptionStatus::Dispensed,
            ))
        }
    }
}

/// Rejects empty lists and zero quantities before anything is written.
pub fn validate_items(items: &[NewPrescriptionItem]) -> ClinicResult<()> {
    if items.is_empty() {
        return Err(ClinicError::EmptyPrescription);
    }
    for item in items {
        if item.quantity == 0 {
            return Err(ValidationError::NonPositiveQuantity(item.medicine_id.to_string()).into());
        }
    }
    Ok(())
}
