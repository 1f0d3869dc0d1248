//! Umbra Shielded SDK
//!
//! Client-side primitives of the Umbra shielded pool: account keys,
//! commitments with encrypted notes, serial numbers and the incremental
//! commitment tree mirrored from the ledger.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ sender                                                        │
//! │   shielded address ──► commitment(pkV, pkE, amount)           │
//! │                           │ commitmentHash   │ encryptedNote  │
//! └───────────────────────────┼──────────────────┼────────────────┘
//!                             ▼                  ▼
//!                     ledger leaf (tree)   ledger record
//!                             │                  │
//! ┌───────────────────────────┼──────────────────┼────────────────┐
//! │ recipient                 ▼                  ▼                │
//! │   MerkleTree::path ◄── mirror       decrypt_note(skE)         │
//! │   serial_number(skV, randomP)       recompute commitment      │
//! │                  └──────► withdraw proof inputs ◄────┘        │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every value that reaches a circuit is a BN254 scalar field element.

pub mod commitment;
pub mod encryption;
pub mod error;
pub mod field;
pub mod hash;
pub mod keys;
pub mod merkle;
pub mod nullifier;

pub use commitment::{Commitment, CommitmentRandomness, CommitmentRecord, ParsedRecord, commitment};
pub use encryption::{ENCRYPTED_NOTE_LEN, NotePlaintext, RANDOM_LEN, decrypt_note, encrypt_note};
pub use error::{Result, ShieldedError};
pub use field::{FIELD_SIZE, FieldElement};
pub use hash::{default_zero_element, hash_bytes, hash_concat, hash2};
pub use keys::{
    AccountKeys, is_shielded_address, public_keys_from_shielded_address, shielded_address,
};
pub use merkle::{LeafEvent, MAX_LEVELS, MerklePath, MerkleTree};
pub use nullifier::{SerialNumber, serial_number};
