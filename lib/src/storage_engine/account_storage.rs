// lib/src/storage_engine/account_storage.rs

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use sled::transaction::Transactional;
use sled::Tree;

use crate::storage_engine::sled_storage::ClinicStore;
use crate::storage_engine::storage_utils::{
    abort, encode, get_record, scan_records, tx_decode, tx_encode, TxResult,
};
use models::errors::{ClinicError, ClinicResult, Entity, ValidationError};
use models::identifiers::AccountId;
use models::medical::{
    normalize_email, Account, AccountSummary, PatientProfile, PatientProfileUpdate, Role, StaffProfile,
};

/// The identity store: accounts and their 1:1 profile extensions.
#[async_trait]
pub trait AccountStorageEngine: Send + Sync + 'static {
    /// Adds a new account together with its patient or staff profile.
    /// Fails with `DuplicateAccount` if the email is already registered.
    async fn add_account(&self, account: &Account) -> ClinicResult<()>;
    /// Adds a patient account with its profile filled in from `profile`,
    /// both in one transaction.
    async fn add_patient(&self, account: &Account, profile: PatientProfileUpdate) -> ClinicResult<()>;
    async fn get_account(&self, id: AccountId) -> ClinicResult<Option<Account>>;
    /// Case-insensitive lookup.
    async fn get_account_by_email(&self, email: &str) -> ClinicResult<Option<Account>>;
    async fn record_login(&self, id: AccountId) -> ClinicResult<()>;
    async fn get_patient_profile(&self, id: AccountId) -> ClinicResult<Option<PatientProfile>>;
    /// Creates the profile if absent, otherwise overwrites the supplied fields.
    async fn update_patient_profile(
        &self,
        id: AccountId,
        update: PatientProfileUpdate,
    ) -> ClinicResult<PatientProfile>;
    async fn get_staff_profile(&self, id: AccountId) -> ClinicResult<Option<StaffProfile>>;
    async fn list_accounts(&self, role: Option<Role>) -> ClinicResult<Vec<AccountSummary>>;
}

/// Sled-backed implementation of the `AccountStorageEngine` trait.
pub struct SledAccountStorage {
    accounts: Tree,
    by_email: Tree,
    patients: Tree,
    staff: Tree,
}

impl SledAccountStorage {
    pub fn new(store: &ClinicStore) -> Self {
        Self {
            accounts: store.accounts.clone(),
            by_email: store.accounts_by_email.clone(),
            patients: store.patients.clone(),
            staff: store.staff.clone(),
        }
    }

    fn insert_account(&self, account: &Account, details: PatientProfileUpdate) -> ClinicResult<()> {
        let key = account.id.to_key();
        let email = normalize_email(&account.email);
        let account_bytes = encode(account)?;

        (&self.accounts, &self.by_email, &self.patients, &self.staff).transaction(
            |(accounts, by_email, patients, staff)| -> TxResult<()> {
                if by_email.get(email.as_bytes())?.is_some() {
                    return abort(ClinicError::DuplicateAccount(email.clone()));
                }
                accounts.insert(&key[..], account_bytes.clone())?;
                by_email.insert(email.as_bytes(), &key[..])?;
                if account.role == Role::Patient {
                    let profile = PatientProfile::new(account.id, details.clone());
                    patients.insert(&key[..], tx_encode(&profile)?)?;
                } else {
                    staff.insert(&key[..], tx_encode(&StaffProfile::new(account.id))?)?;
                }
                Ok(())
            },
        )?;

        info!("Registered account {} ({}) with role {}", account.id, email, account.role);
        Ok(())
    }
}

#[async_trait]
impl AccountStorageEngine for SledAccountStorage {
    async fn add_account(&self, account: &Account) -> ClinicResult<()> {
        self.insert_account(account, PatientProfileUpdate::default())
    }

    async fn add_patient(&self, account: &Account, profile: PatientProfileUpdate) -> ClinicResult<()> {
        if account.role != Role::Patient {
            return Err(ValidationError::InvalidValue { field: "role", value: account.role.to_string() }.into());
        }
        self.insert_account(account, profile)
    }

    async fn get_account(&self, id: AccountId) -> ClinicResult<Option<Account>> {
        get_record(&self.accounts, &id.to_key())
    }

    async fn get_account_by_email(&self, email: &str) -> ClinicResult<Option<Account>> {
        let email = normalize_email(email);
        match self.by_email.get(email.as_bytes())? {
            Some(key) => get_record(&self.accounts, &key),
            None => {
                debug!("No account registered for {}", email);
                Ok(None)
            }
        }
    }

    async fn record_login(&self, id: AccountId) -> ClinicResult<()> {
        let key = id.to_key();
        self.accounts.transaction(|accounts| -> TxResult<()> {
            let Some(bytes) = accounts.get(&key[..])? else {
                return abort(ClinicError::not_found(Entity::Account, id));
            };
            let mut account: Account = tx_decode(&bytes)?;
            account.last_login = Some(Utc::now());
            accounts.insert(&key[..], tx_encode(&account)?)?;
            Ok(())
        })?;
        Ok(())
    }

    async fn get_patient_profile(&self, id: AccountId) -> ClinicResult<Option<PatientProfile>> {
        get_record(&self.patients, &id.to_key())
    }

    async fn update_patient_profile(
        &self,
        id: AccountId,
        update: PatientProfileUpdate,
    ) -> ClinicResult<PatientProfile> {
        let key = id.to_key();
        let profile = (&self.accounts, &self.patients).transaction(
            |(accounts, patients)| -> TxResult<PatientProfile> {
                if accounts.get(&key[..])?.is_none() {
                    return abort(ClinicError::not_found(Entity::Account, id));
                }
                let profile = match patients.get(&key[..])? {
                    Some(bytes) => {
                        let mut profile: PatientProfile = tx_decode(&bytes)?;
                        profile.apply(update.clone());
                        profile
                    }
                    None => PatientProfile::new(id, update.clone()),
                };
                patients.insert(&key[..], tx_encode(&profile)?)?;
                Ok(profile)
            },
        )?;
        info!("Updated patient profile {}", id);
        Ok(profile)
    }

    async fn get_staff_profile(&self, id: AccountId) -> ClinicResult<Option<StaffProfile>> {
        get_record(&self.staff, &id.to_key())
    }

    async fn list_accounts(&self, role: Option<Role>) -> ClinicResult<Vec<AccountSummary>> {
        let accounts: Vec<Account> = scan_records(&self.accounts)?;
        let mut summaries: Vec<AccountSummary> = accounts
            .iter()
            .filter(|a| role.map_or(true, |r| a.role == r))
            .map(Account::summary)
            .collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }
}
