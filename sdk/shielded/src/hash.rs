//! Hash functions shared with the circuits
//!
//! ```text
//! Hash2(a, b) = Poseidon(a, b)                 circomlib parameters, t = 3
//! Hash(bytes) = SHA-256(bytes) mod FIELD_SIZE  digest read big-endian
//! ```
//!
//! `Hash2` is recomputed inside the withdraw and rollup circuits, so it must
//! stay bit-identical to circomlib's `Poseidon(2)`.

use ark_bn254::Fr;
use light_poseidon::{Poseidon, PoseidonHasher};
use sha2::{Digest, Sha256};

use crate::field::{self, FieldElement};

/// Seed of the canonical empty-leaf value
pub const ZERO_ELEMENT_SEED: &[u8] = b"Welcome To Umbra!";

/// Two-input Poseidon hash over BN254
pub fn hash2(left: FieldElement, right: FieldElement) -> FieldElement {
    let mut poseidon =
        Poseidon::<Fr>::new_circom(2).expect("circom parameters exist for width 3");
    poseidon
        .hash(&[left, right])
        .expect("input count matches the poseidon width")
}

/// SHA-256 of `data`, reduced into the field
pub fn hash_bytes(data: &[u8]) -> FieldElement {
    let digest = Sha256::digest(data);
    field::reduce_be_bytes(&digest)
}

/// SHA-256 over the concatenation of `parts`, reduced into the field
pub fn hash_concat(parts: &[&[u8]]) -> FieldElement {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    field::reduce_be_bytes(&hasher.finalize())
}

/// The protocol-wide empty leaf
pub fn default_zero_element() -> FieldElement {
    hash_bytes(ZERO_ELEMENT_SEED)
}
