// lib/src/storage_engine/storage_utils.rs

use bincode::{
    config::{self, BigEndian, Configuration, Fixint},
    serde::{decode_from_slice, encode_to_vec},
};
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult};
use sled::Tree;

use models::errors::{ClinicError, ClinicResult};

/// Result type of a closure run inside a sled transaction. Aborts carry the
/// typed clinic error out of the transaction.
pub type TxResult<T> = ConflictableTransactionResult<T, ClinicError>;

/// Provides a standard bincode configuration.
pub fn bincode_config() -> Configuration<BigEndian, Fixint> {
    config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

pub fn encode<T: Serialize>(value: &T) -> ClinicResult<Vec<u8>> {
    Ok(encode_to_vec(value, bincode_config())?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> ClinicResult<T> {
    let (value, _) = decode_from_slice(bytes, bincode_config())?;
    Ok(value)
}

/// Aborts the surrounding transaction with `err`.
pub fn abort<T>(err: impl Into<ClinicError>) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err.into()))
}

pub fn tx_encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ConflictableTransactionError<ClinicError>> {
    encode(value).map_err(ConflictableTransactionError::Abort)
}

pub fn tx_decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ConflictableTransactionError<ClinicError>> {
    decode(bytes).map_err(ConflictableTransactionError::Abort)
}

/// Fetches and decodes one row.
pub fn get_record<T: DeserializeOwned>(tree: &Tree, key: &[u8]) -> ClinicResult<Option<T>> {
    match tree.get(key)? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

/// Decodes every row of `tree` in key order.
pub fn scan_records<T: DeserializeOwned>(tree: &Tree) -> ClinicResult<Vec<T>> {
    let mut out = Vec::new();
    for entry in tree.iter() {
        let (_, bytes) = entry?;
        out.push(decode(&bytes)?);
    }
    Ok(out)
}
