// security/src/lib.rs

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2, PasswordHash, PasswordVerifier,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lib::storage_engine::AccountStorageEngine;
use models::errors::ClinicError;
use models::identifiers::AccountId;
use models::medical::{Account, AccountSummary, Actor, Login, NewAccount, PatientProfileUpdate, Role};

pub mod middleware;

pub use middleware::{bearer_token, status_for_kind, AuthenticatedActor};

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("password hashing error: {0}")]
    PasswordHashError(String),
    #[error("JWT error: {0}")]
    JwtError(String),
    #[error(transparent)]
    Clinic(#[from] ClinicError),
}

/// Claims for JWT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Account id.
    pub sub: String,
    pub role: Role,
    pub iat: u64,
    pub exp: u64,
}

/// What a successful login returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub account: AccountSummary,
}

/// Signing and verification keys for session tokens (HS256).
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn from_secret(secret: &[u8], ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// Generates a JWT token for `account`.
    pub fn issue(&self, account_id: AccountId, role: Role) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: account_id.to_string(),
            role,
            iat: now.timestamp().max(0) as u64,
            exp: (now + self.ttl).timestamp().max(0) as u64,
        };
        self.encode_claims(&claims)
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::default(), claims, &self.encoding)
            .map_err(|e| AuthError::JwtError(format!("Failed to encode JWT: {}", e)))
    }

    /// Decodes and validates a JWT token.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    /// Resolves a bearer credential to the acting account and its role.
    pub fn resolve(&self, token: &str) -> Result<Actor, AuthError> {
        let claims = self.validate(token)?;
        let account_id = claims
            .sub
            .parse::<AccountId>()
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        Ok(Actor::new(account_id, claims.role))
    }
}

/// Hashes a password using Argon2.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHashError(format!("Failed to hash password with Argon2: {}", e)))
}

/// Verifies a password against an Argon2 hash. A mismatch is `Ok(false)`.
pub fn verify_password(password: &str, hashed_password: &str) -> Result<bool, AuthError> {
    let password_hash = PasswordHash::new(hashed_password)
        .map_err(|e| AuthError::PasswordHashError(format!("Failed to parse Argon2 password hash: {}", e)))?;
    match Argon2::default().verify_password(password.as_bytes(), &password_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswordHashError(format!("Failed to verify Argon2 password: {}", e))),
    }
}

/// Registers a new account. Patients get a patient profile, every other role
/// a staff profile.
pub async fn register_account(
    registration: NewAccount,
    storage: &dyn AccountStorageEngine,
) -> Result<AccountSummary, AuthError> {
    registration.validate().map_err(ClinicError::from)?;
    let password_hash = hash_password(&registration.password)?;
    let account = Account::from_new_account(registration, password_hash);
    storage.add_account(&account).await?;
    Ok(account.summary())
}

/// Front-desk registration of a walk-in patient: the account and its
/// profile details are stored together. The role is always `patient`.
pub async fn register_patient(
    mut registration: NewAccount,
    details: PatientProfileUpdate,
    storage: &dyn AccountStorageEngine,
) -> Result<AccountSummary, AuthError> {
    registration.role = Role::Patient;
    registration.validate().map_err(ClinicError::from)?;
    let password_hash = hash_password(&registration.password)?;
    let account = Account::from_new_account(registration, password_hash);
    storage.add_patient(&account, details).await?;
    Ok(account.summary())
}

/// Logs in an account. Returns a JWT token on success.
pub async fn login(
    login: Login,
    storage: &dyn AccountStorageEngine,
    keys: &JwtKeys,
) -> Result<LoginResponse, AuthError> {
    let Some(account) = storage.get_account_by_email(&login.email).await? else {
        debug!("Login attempt for unknown email {}", login.email);
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(&login.password, &account.password_hash)? {
        debug!("Wrong password for account {}", account.id);
        return Err(AuthError::InvalidCredentials);
    }

    storage.record_login(account.id).await?;
    let token = keys.issue(account.id, account.role)?;
    info!("Account {} logged in as {}", account.id, account.role);
    Ok(LoginResponse { token, account: account.summary() })
}
