// models/src/medical/account.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ValidationResult};
use crate::identifiers::AccountId;
use crate::medical::Role;

// --- DTO for account registration ---
// Holds the plaintext password only until it is hashed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Role,
}

impl NewAccount {
    pub fn validate(&self) -> ValidationResult<()> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        if !self.email.contains('@') {
            return Err(ValidationError::InvalidValue { field: "email", value: self.email.clone() });
        }
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("password"));
        }
        Ok(())
    }
}

// --- Stored account ---
// Carries the password hash, never the plaintext.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Account {
    /// Builds the stored account from the registration DTO and an already
    /// computed password hash.
    pub fn from_new_account(new_account: NewAccount, password_hash: String) -> Self {
        let now = Utc::now();
        Account {
            id: AccountId::new(),
            name: new_account.name.trim().to_string(),
            email: normalize_email(&new_account.email),
            password_hash,
            phone: new_account.phone,
            address: new_account.address,
            role: new_account.role,
            created_at: now,
            updated_at: now,
            last_login: None,
        }
    }

    pub fn summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
            role: self.role,
        }
    }
}

/// Public view of an account, without the credential hash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

/// Emails are matched case-insensitively.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
