// models/src/medical/patient.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::AccountId;

/// 1:1 extension of a patient account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub account_id: AccountId,
    pub medical_history: Option<String>,
    pub blood_type: Option<String>,
    pub emergency_contact: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional profile fields supplied at registration or on profile edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientProfileUpdate {
    #[serde(default)]
    pub medical_history: Option<String>,
    #[serde(default)]
    pub blood_type: Option<String>,
    #[serde(default)]
    pub emergency_contact: Option<String>,
}

impl PatientProfile {
    pub fn new(account_id: AccountId, update: PatientProfileUpdate) -> Self {
        let now = Utc::now();
        PatientProfile {
            account_id,
            medical_history: non_blank(update.medical_history),
            blood_type: non_blank(update.blood_type),
            emergency_contact: non_blank(update.emergency_contact),
            created_at: now,
            updated_at: now,
        }
    }

    /// Overwrites only the fields that were supplied with a non-blank value.
    pub fn apply(&mut self, update: PatientProfileUpdate) {
        let mut changed = false;
        if let Some(history) = non_blank(update.medical_history) {
            self.medical_history = Some(history);
            changed = true;
        }
        if let Some(blood_type) = non_blank(update.blood_type) {
            self.blood_type = Some(blood_type);
            changed = true;
        }
        if let Some(contact) = non_blank(update.emergency_contact) {
            self.emergency_contact = Some(contact);
            changed = true;
        }
        if changed {
            self.updated_at = Utc::now();
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
