// models/src/medical/visit.rs

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ClinicError, ClinicResult, Entity, ValidationError};
use crate::identifiers::{AccountId, QueueId, VisitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitStatus {
    Pending,
    Done,
}

impl VisitStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VisitStatus::Pending => "pending",
            VisitStatus::Done => "done",
        }
    }
}

impl fmt::Display for VisitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The clinical record of one examination episode.
///
/// A visit with status `Done` always carries a diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    pub id: VisitId,
    pub patient_id: AccountId,
    pub doctor_id: Option<AccountId>,
    pub queue_id: Option<QueueId>,
    pub complaint: String,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub status: VisitStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// What a doctor submits to close an examination.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Examination {
    pub diagnosis: String,
    #[serde(default)]
    pub notes: Option<String>,
    /// Replaces the complaint captured at registration when supplied.
    #[serde(default)]
    pub complaint: Option<String>,
}

impl Visit {
    pub fn is_done(&self) -> bool {
        self.status == VisitStatus::Done
    }

    /// Applies the doctor's examination and moves the visit to `Done`.
    pub fn complete(&mut self, doctor_id: AccountId, exam: Examination) -> ClinicResult<()> {
        if self.is_done() {
            return Err(ClinicError::invalid_transition(Entity::Visit, self.status, VisitStatus::Done));
        }
        let diagnosis = exam.diagnosis.trim();
        if diagnosis.is_empty() {
            return Err(ValidationError::MissingField("diagnosis").into());
        }
        if let Some(complaint) = exam.complaint.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()) {
            self.complaint = complaint;
        }
        let now = Utc::now();
        self.diagnosis = Some(diagnosis.to_string());
        self.notes = exam.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
        self.doctor_id = Some(doctor_id);
        self.status = VisitStatus::Done;
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }
}
