// models/src/errors.rs

use std::fmt;
pub use thiserror::Error;

#[cfg(feature = "bincode-errors")]
use bincode::error::{DecodeError, EncodeError};

use crate::medical::{Action, Role};

/// The kinds of stored rows an error can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Account,
    PatientProfile,
    StaffProfile,
    Queue,
    Visit,
    Prescription,
    Medicine,
    Settlement,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Account => "account",
            Entity::PatientProfile => "patient profile",
            Entity::StaffProfile => "staff profile",
            Entity::Queue => "queue ticket",
            Entity::Visit => "visit",
            Entity::Prescription => "prescription",
            Entity::Medicine => "medicine",
            Entity::Settlement => "settlement",
        };
        f.write_str(name)
    }
}

/// Coarse classification of a [`ClinicError`], used by transport layers to
/// pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    InsufficientStock,
    Authorization,
    Infrastructure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Infrastructure => "infrastructure",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClinicError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{entity} {id} was not found")]
    NotFound { entity: Entity, id: String },

    #[error("an account with email {0} already exists")]
    DuplicateAccount(String),

    #[error("patient {0} already holds an active queue ticket")]
    DuplicateActiveQueue(String),

    #[error("visit {0} has already been settled")]
    DuplicateSettlement(String),

    #[error("visit {0} already has a prescription")]
    DuplicatePrescription(String),

    #[error("{entity} cannot move from {from} to {to}")]
    InvalidTransition { entity: Entity, from: String, to: String },

    #[error("visit {0} is not done and cannot be settled")]
    VisitNotSettleable(String),

    #[error("a prescription needs at least one item")]
    EmptyPrescription,

    #[error("insufficient stock for {medicine_name}: requested {requested}, available {available}")]
    InsufficientStock {
        medicine_id: String,
        medicine_name: String,
        requested: u32,
        available: u32,
    },

    #[error("role {role} may not {action}")]
    Authorization { role: Role, action: Action },

    #[error("storage failure: {0}")]
    Infrastructure(String),
}

impl ClinicError {
    pub fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        ClinicError::NotFound { entity, id: id.to_string() }
    }

    pub fn invalid_transition(entity: Entity, from: impl fmt::Display, to: impl fmt::Display) -> Self {
        ClinicError::InvalidTransition {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClinicError::Validation(_) | ClinicError::EmptyPrescription => ErrorKind::Validation,
            ClinicError::NotFound { .. } => ErrorKind::NotFound,
            ClinicError::DuplicateAccount(_)
            | ClinicError::DuplicateActiveQueue(_)
            | ClinicError::DuplicateSettlement(_)
            | ClinicError::DuplicatePrescription(_)
            | ClinicError::InvalidTransition { .. }
            | ClinicError::VisitNotSettleable(_) => ErrorKind::Conflict,
            ClinicError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            ClinicError::Authorization { .. } => ErrorKind::Authorization,
            ClinicError::Infrastructure(_) => ErrorKind::Infrastructure,
        }
    }
}

#[cfg(feature = "sled-errors")]
impl From<sled::Error> for ClinicError {
    fn from(err: sled::Error) -> Self {
        ClinicError::Infrastructure(format!("sled error: {}", err))
    }
}

// Aborts inside a multi-tree transaction carry the typed error back out.
#[cfg(feature = "sled-errors")]
impl From<sled::transaction::TransactionError<ClinicError>> for ClinicError {
    fn from(err: sled::transaction::TransactionError<ClinicError>) -> Self {
        match err {
            sled::transaction::TransactionError::Abort(inner) => inner,
            sled::transaction::TransactionError::Storage(e) => e.into(),
        }
    }
}

#[cfg(feature = "bincode-errors")]
impl From<EncodeError> for ClinicError {
    fn from(err: EncodeError) -> Self {
        ClinicError::Infrastructure(format!("failed to encode record: {}", err))
    }
}

#[cfg(feature = "bincode-errors")]
impl From<DecodeError> for ClinicError {
    fn from(err: DecodeError) -> Self {
        ClinicError::Infrastructure(format!("failed to decode record: {}", err))
    }
}

/// A validation error.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    /// A required field was absent or blank.
    #[error("{0} is required")]
    MissingField(&'static str),
    /// A prescription line asked for zero units.
    #[error("quantity for medicine {0} must be positive")]
    NonPositiveQuantity(String),
    /// A rejection was submitted without a reason.
    #[error("a rejection reason is required")]
    MissingRejectionReason,
    /// An identifier could not be parsed.
    #[error("identifier '{0}' is invalid")]
    InvalidIdentifier(String),
    /// A value was outside its accepted set or range.
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// A type alias for a `Result` that returns a `ClinicError` on failure.
pub type ClinicResult<T> = Result<T, ClinicError>;

/// A type alias for a `Result` that returns a `ValidationError` on failure.
pub type ValidationResult<T> = Result<T, ValidationError>;
