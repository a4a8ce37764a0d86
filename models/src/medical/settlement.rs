// models/src/medical/settlement.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ClinicError, ClinicResult, Entity, ValidationError};
use crate::identifiers::{AccountId, SettlementId, VisitId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Transfer,
    Ewallet,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Transfer => "transfer",
            PaymentMethod::Ewallet => "ewallet",
        })
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "transfer" => Ok(PaymentMethod::Transfer),
            "ewallet" | "e-wallet" => Ok(PaymentMethod::Ewallet),
            _ => Err(ValidationError::InvalidValue { field: "payment_method", value: s.to_string() }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementStatus {
    Unpaid,
    Paid,
}

impl fmt::Display for SettlementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SettlementStatus::Unpaid => "unpaid",
            SettlementStatus::Paid => "paid",
        })
    }
}

/// The payment record closing out one visit. At most one per visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    pub patient_id: AccountId,
    pub visit_id: VisitId,
    pub cashier_id: Option<AccountId>,
    /// Minor currency units.
    pub amount: u64,
    pub method: PaymentMethod,
    pub status: SettlementStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Settlement {
    pub fn mark_paid(&mut self, cashier_id: AccountId) -> ClinicResult<()> {
        if self.status == SettlementStatus::Paid {
            return Err(ClinicError::invalid_transition(
                Entity::Settlement,
                self.status,
                SettlementStatus::Paid,
            ));
        }
        self.status = SettlementStatus::Paid;
        self.cashier_id = Some(cashier_id);
        self.paid_at = Some(Utc::now());
        Ok(())
    }
}
