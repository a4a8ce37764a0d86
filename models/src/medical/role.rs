// models/src/medical/role.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::{ClinicError, ClinicResult, ValidationError};
use crate::identifiers::AccountId;

/// The closed set of account roles. Fixed at account creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Patient,
    Receptionist,
    Doctor,
    Pharmacist,
    Cashier,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Patient,
        Role::Receptionist,
        Role::Doctor,
        Role::Pharmacist,
        Role::Cashier,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Patient => "patient",
            Role::Receptionist => "receptionist",
            Role::Doctor => "doctor",
            Role::Pharmacist => "pharmacist",
            Role::Cashier => "cashier",
        }
    }

    /// Staff roles get a `StaffProfile` when the account is created.
    pub fn is_staff(self) -> bool {
        !matches!(self, Role::Patient)
    }

    /// Whether this role may perform `action`.
    pub fn permits(self, action: Action) -> bool {
        use Action::*;
        match self {
            Role::Admin => !matches!(action, RegisterSelf | ViewOwnRecords),
            Role::Patient => matches!(action, RegisterSelf | ViewOwnRecords),
            Role::Receptionist => matches!(
                action,
                RegisterForPatient | AdvanceQueue | ViewQueue | ManagePatients
            ),
            Role::Doctor => matches!(
                action,
                ViewQueue
                    | AdvanceQueue
                    | CompleteVisit
                    | ViewVisits
                    | CreatePrescription
                    | ViewPrescriptions
                    | ViewInventory
                    | ManagePatients
            ),
            Role::Pharmacist => matches!(
                action,
                ViewPrescriptions
                    | ApprovePrescription
                    | RejectPrescription
                    | DispensePrescription
                    | ManageInventory
                    | ViewInventory
            ),
            Role::Cashier => matches!(action, ViewVisits | SettleVisit | ViewSettlements),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "patient" => Ok(Role::Patient),
            "receptionist" => Ok(Role::Receptionist),
            "doctor" => Ok(Role::Doctor),
            "pharmacist" => Ok(Role::Pharmacist),
            "cashier" => Ok(Role::Cashier),
            _ => Err(ValidationError::InvalidValue { field: "role", value: s.to_string() }),
        }
    }
}

/// Every operation the clinic core gates on a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    RegisterSelf,
    RegisterForPatient,
    ViewOwnRecords,
    ManagePatients,
    ViewQueue,
    AdvanceQueue,
    CompleteVisit,
    ViewVisits,
    CreatePrescription,
    ViewPrescriptions,
    ApprovePrescription,
    RejectPrescription,
    DispensePrescription,
    ViewInventory,
    ManageInventory,
    SettleVisit,
    ViewSettlements,
    ManageStaff,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Action::RegisterSelf => "register for an examination",
            Action::RegisterForPatient => "register a patient into the queue",
            Action::ViewOwnRecords => "view own records",
            Action::ManagePatients => "manage patient profiles",
            Action::ViewQueue => "view the queue",
            Action::AdvanceQueue => "advance a queue ticket",
            Action::CompleteVisit => "complete a visit",
            Action::ViewVisits => "view visits",
            Action::CreatePrescription => "create a prescription",
            Action::ViewPrescriptions => "view prescriptions",
            Action::ApprovePrescription => "approve a prescription",
            Action::RejectPrescription => "reject a prescription",
            Action::DispensePrescription => "dispense a prescription",
            Action::ViewInventory => "view the inventory",
            Action::ManageInventory => "manage the inventory",
            Action::SettleVisit => "settle a visit",
            Action::ViewSettlements => "view settlements",
            Action::ManageStaff => "create staff accounts",
        };
        f.write_str(text)
    }
}

/// The resolved identity behind a request: who is acting, in which role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub account_id: AccountId,
    pub role: Role,
}

impl Actor {
    pub fn new(account_id: AccountId, role: Role) -> Self {
        Self { account_id, role }
    }

    pub fn authorize(&self, action: Action) -> ClinicResult<()> {
        if self.role.permits(action) {
            Ok(())
        } else {
            Err(ClinicError::Authorization { role: self.role, action })
        }
    }
}
