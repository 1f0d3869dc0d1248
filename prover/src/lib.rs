//! Umbra Prover
//!
//! Proof orchestration on top of `umbra-shielded`: assembles circuit inputs
//! for withdraw and rollup circuits and hands them to a proving backend.
//!
//! ```text
//! withdraw::zk_prove ──┐                      ┌── MockBackend
//!                      ├─► CircuitInputs ──► ProverBackend
//! rollup::zk_prove_* ──┘                      └── SnarkjsBackend ─► CircuitRegistry
//! ```
//!
//! All validation happens before the backend is called, so a rejected
//! request never costs a witness computation.

pub mod backend;
pub mod circuit;
pub mod error;
pub mod inputs;
pub mod proof;
pub mod rollup;
pub mod snarkjs;
pub mod withdraw;

pub use backend::{ConfiguredBackend, MockBackend, ProverBackend, Witness};
pub use circuit::{CircuitArtifacts, CircuitId, CircuitRegistry};
pub use error::{ProverError, Result};
pub use inputs::{CircuitInputs, InputValue, PublicSignals};
pub use proof::{Groth16Proof, SnarkjsProof};
pub use rollup::{
    RollupProof, RollupSize, zk_prove_rollup, zk_prove_rollup1, zk_prove_rollup4, zk_prove_rollup16,
};
pub use snarkjs::SnarkjsBackend;
pub use withdraw::{WithdrawProof, WithdrawRequest, zk_prove, zk_verify};

use umbra_config::TreeConfig;
use umbra_shielded::{FieldElement, MerkleTree, field};

/// Build a tree with the configured depth and zero element
pub fn tree_from_config(config: &TreeConfig, leaves: &[FieldElement]) -> Result<MerkleTree> {
    let zero_element = config
        .zero_element
        .as_deref()
        .map(field::from_decimal)
        .transpose()?;
    Ok(MerkleTree::new(config.levels, leaves, zero_element)?)
}
