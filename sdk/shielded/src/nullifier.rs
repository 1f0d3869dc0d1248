//! Serial Numbers
//!
//! The serial number published on withdraw marks a commitment as spent.
//!
//! ```text
//! serialNumber = Hash(randomP || skVerify)
//! ```
//!
//! Only the holder of `skVerify` can derive it, and it reveals nothing about
//! which leaf of the tree was consumed.

use serde::{Deserialize, Serialize};

use crate::encryption::RANDOM_LEN;
use crate::error::Result;
use crate::field::{self, FieldElement};
use crate::hash::hash_concat;
use crate::keys::{VerifySecretKey, to_array};

/// A serial number (32 bytes, big-endian field element)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SerialNumber(pub [u8; 32]);

impl SerialNumber {
    pub fn from_field(f: FieldElement) -> Self {
        Self(field::to_be_bytes(&f))
    }

    pub fn to_field(&self) -> FieldElement {
        field::reduce_be_bytes(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// `0x`-prefixed hex, as stored in the on-chain spent set
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for SerialNumber {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Derive the serial number of a commitment
pub fn serial_number(sk_verify: &[u8], random_p: &[u8]) -> Result<FieldElement> {
    let sk_verify: VerifySecretKey = to_array("verification secret key", sk_verify)?;
    let random_p: [u8; RANDOM_LEN] = to_array("randomP", random_p)?;
    Ok(hash_concat(&[&random_p[..], &sk_verify[..]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShieldedError;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};
    use std::collections::HashSet;

    #[test]
    fn test_serial_number_deterministic() {
        let sk = [7u8; 32];
        let rp = [1u8; RANDOM_LEN];
        assert_eq!(serial_number(&sk, &rp).unwrap(), serial_number(&sk, &rp).unwrap());
    }

    #[test]
    fn test_serial_number_order_of_inputs() {
        let sk = [7u8; 32];
        let rp = [1u8; RANDOM_LEN];
        let expected = hash_concat(&[&rp[..], &sk[..]]);
        assert_eq!(serial_number(&sk, &rp).unwrap(), expected);
        assert_ne!(expected, hash_concat(&[&sk[..], &rp[..]]));
    }

    #[test]
    fn test_serial_numbers_separate_notes_of_one_key() {
        let mut rng = StdRng::seed_from_u64(30);
        let mut sk = [0u8; 32];
        rng.fill_bytes(&mut sk);
        let mut seen = HashSet::new();

        for _ in 0..64 {
            let mut rp = [0u8; RANDOM_LEN];
            rng.fill_bytes(&mut rp);
            let sn = SerialNumber::from_field(serial_number(&sk, &rp).unwrap());
            assert!(seen.insert(sn), "serial number collision across randomP");
        }
    }

    #[test]
    fn test_serial_numbers_separate_keys_for_one_note() {
        let mut rng = StdRng::seed_from_u64(31);
        let mut rp = [0u8; RANDOM_LEN];
        rng.fill_bytes(&mut rp);
        let mut seen = HashSet::new();

        for _ in 0..64 {
            let mut sk = [0u8; 32];
            rng.fill_bytes(&mut sk);
            let sn = SerialNumber::from_field(serial_number(&sk, &rp).unwrap());
            assert!(seen.insert(sn), "serial number collision across keys");
        }
    }

    #[test]
    fn test_rejects_bad_lengths() {
        let err = serial_number(&[0u8; 31], &[0u8; RANDOM_LEN]).unwrap_err();
        assert!(matches!(err, ShieldedError::InvalidKeyLength { actual: 31, .. }));
        assert!(serial_number(&[0u8; 32], &[0u8; 32]).is_err());
    }

    #[test]
    fn test_field_roundtrip() {
        let f = serial_number(&[3u8; 32], &[4u8; RANDOM_LEN]).unwrap();
        let sn = SerialNumber::from_field(f);
        assert_eq!(sn.to_field(), f);
        assert_eq!(sn.to_hex(), field::to_fixed_len_hex(&f));
    }
}
