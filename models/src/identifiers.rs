// models/src/identifiers.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};

/// Declares a row identifier backed by a store-generated `u64`.
///
/// Keys are the big-endian bytes of the id, so sled iterates rows in
/// creation order.
macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn to_key(self) -> [u8; 8] {
                self.0.to_be_bytes()
            }

            pub fn from_key(bytes: &[u8]) -> ValidationResult<Self> {
                let raw: [u8; 8] = bytes
                    .try_into()
                    .map_err(|_| ValidationError::InvalidIdentifier(format!("{:?}", bytes)))?;
                Ok(Self(u64::from_be_bytes(raw)))
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> ValidationResult<Self> {
                s.trim()
                    .parse::<u64>()
                    .map(Self)
                    .map_err(|_| ValidationError::InvalidIdentifier(s.to_string()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// A ticket in the day's walk-in line.
    QueueId
);
record_id!(
    /// A visit (medical record).
    VisitId
);
record_id!(PrescriptionId);
record_id!(PrescriptionItemId);
record_id!(MedicineId);
record_id!(SettlementId);

/// Identifies an account. Accounts are keyed by a random UUID rather than a
/// store sequence so ids can be minted before the row is written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn to_key(self) -> [u8; 16] {
        *self.0.as_bytes()
    }

    pub fn from_key(bytes: &[u8]) -> ValidationResult<Self> {
        Uuid::from_slice(bytes)
            .map(Self)
            .map_err(|_| ValidationError::InvalidIdentifier(format!("{:?}", bytes)))
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for AccountId {
    type Err = ValidationError;

    fn from_str(s: &str) -> ValidationResult<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| ValidationError::InvalidIdentifier(s.to_string()))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
