// models/src/medical/staff.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::AccountId;

/// 1:1 extension of an account with a clinical or operational role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffProfile {
    pub account_id: AccountId,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl StaffProfile {
    pub fn new(account_id: AccountId) -> Self {
        StaffProfile {
            account_id,
            specialization: None,
            license_number: None,
            active: true,
            created_at: Utc::now(),
        }
    }
}
