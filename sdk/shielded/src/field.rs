//! BN254 scalar field helpers
//!
//! All commitment, nullifier and tree values live in the scalar field of
//! BN254, the native field of the withdraw and rollup circuits.
//!
//! Encodings used across the crate:
//! - on-chain words: 32-byte big-endian, `0x`-prefixed hex
//! - circuit JSON: decimal strings
//!
//! Externally supplied values are range-checked and never silently reduced.
//! Hash outputs are reduced with [`reduce_be_bytes`].

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;

use crate::error::{Result, ShieldedError};

/// Native field element of the proof system
pub type FieldElement = Fr;

/// BN254 scalar field modulus
pub const FIELD_SIZE: &str =
    "21888242871839275222246405745257275088548364400416034343698204186575808495617";

/// Byte length of a serialized field element
pub const FIELD_BYTES: usize = 32;

/// The field modulus as a big integer
pub fn field_size() -> BigUint {
    BigUint::from_bytes_be(&Fr::MODULUS.to_bytes_be())
}

/// Interpret big-endian bytes as a field element, rejecting values >= FIELD_SIZE
pub fn from_be_bytes_checked(bytes: &[u8]) -> Result<FieldElement> {
    let value = BigUint::from_bytes_be(bytes);
    if value >= field_size() {
        return Err(ShieldedError::InvalidFieldElement(format!(
            "0x{} is not below the field modulus",
            hex::encode(bytes)
        )));
    }
    Ok(Fr::from_be_bytes_mod_order(bytes))
}

/// Reduce arbitrary big-endian bytes (typically a digest) into the field
pub fn reduce_be_bytes(bytes: &[u8]) -> FieldElement {
    Fr::from_be_bytes_mod_order(bytes)
}

/// Parse a decimal string (snarkjs / uint256 style)
pub fn from_decimal(s: &str) -> Result<FieldElement> {
    let value = BigUint::parse_bytes(s.trim().as_bytes(), 10)
        .ok_or_else(|| ShieldedError::InvalidFieldElement(format!("not a decimal number: {s:?}")))?;
    if value >= field_size() {
        return Err(ShieldedError::InvalidFieldElement(format!(
            "{value} is not below the field modulus"
        )));
    }
    Ok(Fr::from_be_bytes_mod_order(&value.to_bytes_be()))
}

/// Parse a hex string of at most 32 bytes, with or without `0x` prefix
pub fn from_hex(s: &str) -> Result<FieldElement> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.is_empty() || digits.len() > 2 * FIELD_BYTES {
        return Err(ShieldedError::InvalidFieldElement(format!(
            "expected 1 to {} hex digits, got {s:?}",
            2 * FIELD_BYTES
        )));
    }
    let digits = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits.to_string()
    };
    let bytes = hex::decode(&digits)
        .map_err(|e| ShieldedError::InvalidFieldElement(format!("bad hex {s:?}: {e}")))?;
    from_be_bytes_checked(&bytes)
}

/// 32-byte big-endian encoding
pub fn to_be_bytes(f: &FieldElement) -> [u8; FIELD_BYTES] {
    let bytes = f.into_bigint().to_bytes_be();
    let mut arr = [0u8; FIELD_BYTES];
    arr[FIELD_BYTES - bytes.len()..].copy_from_slice(&bytes);
    arr
}

/// Decimal string encoding
pub fn to_decimal(f: &FieldElement) -> String {
    BigUint::from_bytes_be(&to_be_bytes(f)).to_string()
}

/// `0x`-prefixed, zero-padded 32-byte hex encoding
pub fn to_fixed_len_hex(f: &FieldElement) -> String {
    format!("0x{}", hex::encode(to_be_bytes(f)))
}
