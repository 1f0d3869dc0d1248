//! Account keys and shielded addresses
//!
//! An account holds two independent keypairs:
//!
//! ```text
//! verification: Baby Jubjub scalar (32 bytes LE) -> compressed point (32 bytes)
//! encryption:   secp256k1 scalar   (32 bytes BE) -> SEC1 compressed  (33 bytes)
//!
//! fullPublicKey  = pkVerify(32) || pkEnc(33)   = 65 bytes
//! fullSecretKey  = skVerify(32) || skEnc(32)   = 64 bytes
//! shieldedAddress = base58(fullPublicKey)
//! ```
//!
//! The verification secret is derived EdDSA-style from raw entropy:
//! `SHA-512(raw)[0..32]`, pruned, shifted right by the cofactor bits and
//! reduced into the prime-order subgroup.

use std::fmt;

use ark_ec::{AffineRepr, CurveGroup};
use ark_ed_on_bn254::{EdwardsAffine, Fr as SubgroupScalar};
use ark_ff::{BigInteger, PrimeField};
use ark_serialize::CanonicalSerialize;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha512};

use crate::error::{Result, ShieldedError};

pub const RAW_SECRET_LEN: usize = 32;
pub const VERIFY_SK_LEN: usize = 32;
pub const VERIFY_PK_LEN: usize = 32;
pub const ENC_SK_LEN: usize = 32;
pub const ENC_PK_LEN: usize = 33;
pub const FULL_PK_LEN: usize = VERIFY_PK_LEN + ENC_PK_LEN;
pub const FULL_SK_LEN: usize = VERIFY_SK_LEN + ENC_SK_LEN;

pub type VerifySecretKey = [u8; VERIFY_SK_LEN];
pub type VerifyPublicKey = [u8; VERIFY_PK_LEN];
pub type EncSecretKey = [u8; ENC_SK_LEN];
pub type EncPublicKey = [u8; ENC_PK_LEN];

/// Cofactor of Baby Jubjub is 8
const COFACTOR_BITS: u32 = 3;

/// Copy `bytes` into a fixed array after checking its length
pub(crate) fn to_array<const N: usize>(key: &'static str, bytes: &[u8]) -> Result<[u8; N]> {
    if bytes.len() != N {
        return Err(ShieldedError::InvalidKeyLength {
            key,
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(bytes);
    Ok(arr)
}

fn subgroup_order() -> BigUint {
    BigUint::from_bytes_le(&SubgroupScalar::MODULUS.to_bytes_le())
}

/// Derive the verification secret scalar from 32 raw bytes
pub fn verification_secret_key(raw: &[u8]) -> Result<VerifySecretKey> {
    let raw: [u8; RAW_SECRET_LEN] = to_array("raw secret key", raw)?;

    let digest = Sha512::digest(raw);
    let mut pruned = [0u8; 32];
    pruned.copy_from_slice(&digest[..32]);
    pruned[0] &= 0xF8;
    pruned[31] &= 0x7F;
    pruned[31] |= 0x40;

    let shifted = BigUint::from_bytes_le(&pruned) >> COFACTOR_BITS;
    let scalar = SubgroupScalar::from_le_bytes_mod_order(&shifted.to_bytes_le());
    Ok(scalar_to_bytes(&scalar))
}

fn scalar_to_bytes(scalar: &SubgroupScalar) -> VerifySecretKey {
    let bytes = scalar.into_bigint().to_bytes_le();
    let mut arr = [0u8; VERIFY_SK_LEN];
    arr[..bytes.len()].copy_from_slice(&bytes);
    arr
}

/// Verification public key for a derived secret scalar
///
/// The secret must be a canonical subgroup scalar, as returned by
/// [`verification_secret_key`].
pub fn verification_public_key(secret: &[u8]) -> Result<VerifyPublicKey> {
    let secret: VerifySecretKey = to_array("verification secret key", secret)?;
    if BigUint::from_bytes_le(&secret) >= subgroup_order() {
        return Err(ShieldedError::InvalidKey(
            "verification secret key is not below the subgroup order",
        ));
    }

    let scalar = SubgroupScalar::from_le_bytes_mod_order(&secret);
    let point = (EdwardsAffine::generator() * scalar).into_affine();

    let mut bytes = Vec::with_capacity(VERIFY_PK_LEN);
    point
        .serialize_compressed(&mut bytes)
        .map_err(|_| ShieldedError::InvalidKey("verification public key does not serialize"))?;
    to_array("verification public key", &bytes)
}

/// Encryption secret key: the raw bytes, length-checked
pub fn encryption_secret_key(raw: &[u8]) -> Result<EncSecretKey> {
    to_array("encryption secret key", raw)
}

/// SEC1-compressed secp256k1 public key for `raw`
pub fn encryption_public_key(raw: &[u8]) -> Result<EncPublicKey> {
    let raw = encryption_secret_key(raw)?;
    let secret = k256::SecretKey::from_slice(&raw)
        .map_err(|_| ShieldedError::InvalidKey("encryption secret key is not a secp256k1 scalar"))?;
    let encoded = secret.public_key().to_encoded_point(true);
    to_array("encryption public key", encoded.as_bytes())
}

/// `pkVerify || pkEnc`
pub fn full_public_key(pk_verify: &[u8], pk_enc: &[u8]) -> Result<[u8; FULL_PK_LEN]> {
    let pk_verify: VerifyPublicKey = to_array("verification public key", pk_verify)?;
    let pk_enc: EncPublicKey = to_array("encryption public key", pk_enc)?;
    Ok(concat_public(&pk_verify, &pk_enc))
}

/// `skVerify || skEnc`
pub fn full_secret_key(sk_verify: &[u8], sk_enc: &[u8]) -> Result<[u8; FULL_SK_LEN]> {
    let sk_verify: VerifySecretKey = to_array("verification secret key", sk_verify)?;
    let sk_enc: EncSecretKey = to_array("encryption secret key", sk_enc)?;
    let mut full = [0u8; FULL_SK_LEN];
    full[..VERIFY_SK_LEN].copy_from_slice(&sk_verify);
    full[VERIFY_SK_LEN..].copy_from_slice(&sk_enc);
    Ok(full)
}

/// Split a full public key into `(pkVerify, pkEnc)`
pub fn separated_public_keys(full: &[u8]) -> Result<(VerifyPublicKey, EncPublicKey)> {
    let full: [u8; FULL_PK_LEN] = to_array("full public key", full)?;
    Ok((
        to_array("verification public key", &full[..VERIFY_PK_LEN])?,
        to_array("encryption public key", &full[VERIFY_PK_LEN..])?,
    ))
}

/// Split a full secret key into `(skVerify, skEnc)`
pub fn separated_secret_keys(full: &[u8]) -> Result<(VerifySecretKey, EncSecretKey)> {
    let full: [u8; FULL_SK_LEN] = to_array("full secret key", full)?;
    Ok((
        to_array("verification secret key", &full[..VERIFY_SK_LEN])?,
        to_array("encryption secret key", &full[VERIFY_SK_LEN..])?,
    ))
}

fn concat_public(pk_verify: &VerifyPublicKey, pk_enc: &EncPublicKey) -> [u8; FULL_PK_LEN] {
    let mut full = [0u8; FULL_PK_LEN];
    full[..VERIFY_PK_LEN].copy_from_slice(pk_verify);
    full[VERIFY_PK_LEN..].copy_from_slice(pk_enc);
    full
}

/// Base58 shielded address for a pair of public keys
pub fn shielded_address(pk_verify: &[u8], pk_enc: &[u8]) -> Result<String> {
    Ok(bs58::encode(full_public_key(pk_verify, pk_enc)?).into_string())
}

/// Decode a shielded address back into `(pkVerify, pkEnc)`
pub fn public_keys_from_shielded_address(
    address: &str,
) -> Result<(VerifyPublicKey, EncPublicKey)> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|e| ShieldedError::InvalidShieldedAddress(e.to_string()))?;
    if decoded.len() != FULL_PK_LEN {
        return Err(ShieldedError::InvalidShieldedAddress(format!(
            "decoded to {} bytes, expected {FULL_PK_LEN}",
            decoded.len()
        )));
    }
    separated_public_keys(&decoded)
}

pub fn is_shielded_address(address: &str) -> bool {
    public_keys_from_shielded_address(address).is_ok()
}

/// Both keypairs of a shielded account
#[derive(Clone, PartialEq, Eq)]
pub struct AccountKeys {
    pub verify_secret_key: VerifySecretKey,
    pub verify_public_key: VerifyPublicKey,
    pub enc_secret_key: EncSecretKey,
    pub enc_public_key: EncPublicKey,
}

impl AccountKeys {
    /// Derive both keypairs from raw secrets
    pub fn from_raw(raw_verify: &[u8], raw_enc: &[u8]) -> Result<Self> {
        let verify_secret_key = verification_secret_key(raw_verify)?;
        let verify_public_key = verification_public_key(&verify_secret_key)?;
        let enc_secret_key = encryption_secret_key(raw_enc)?;
        let enc_public_key = encryption_public_key(&enc_secret_key)?;

        Ok(Self {
            verify_secret_key,
            verify_public_key,
            enc_secret_key,
            enc_public_key,
        })
    }

    /// Generate a fresh account
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        loop {
            let mut raw_verify = [0u8; RAW_SECRET_LEN];
            let mut raw_enc = [0u8; RAW_SECRET_LEN];
            rng.fill_bytes(&mut raw_verify);
            rng.fill_bytes(&mut raw_enc);
            // only an out-of-range secp256k1 scalar can fail here
            if let Ok(keys) = Self::from_raw(&raw_verify, &raw_enc) {
                return keys;
            }
        }
    }

    pub fn full_public_key(&self) -> [u8; FULL_PK_LEN] {
        concat_public(&self.verify_public_key, &self.enc_public_key)
    }

    pub fn full_secret_key(&self) -> [u8; FULL_SK_LEN] {
        let mut full = [0u8; FULL_SK_LEN];
        full[..VERIFY_SK_LEN].copy_from_slice(&self.verify_secret_key);
        full[VERIFY_SK_LEN..].copy_from_slice(&self.enc_secret_key);
        full
    }

    pub fn shielded_address(&self) -> String {
        bs58::encode(self.full_public_key()).into_string()
    }
}

/// Secrets are never printed
impl fmt::Debug for AccountKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKeys")
            .field("verify_public_key", &hex::encode(self.verify_public_key))
            .field("enc_public_key", &hex::encode(self.enc_public_key))
            .finish_non_exhaustive()
    }
}
