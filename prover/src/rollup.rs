//! Rollup Batcher
//!
//! Aggregates an aligned batch of pending leaves into the commitment tree
//! and proves the transition in one proof.
//!
//! ```text
//!              newRoot
//!             /       \
//!          ...   shared path   (levels above the batch height)
//!                   |
//!             batch subtree    height log2(N), starts at a multiple of N
//!            /   |   |   \
//!          l0   l1  ...  lN-1
//! ```
//!
//! The batch is applied to a copy of the tree. The caller's tree only moves
//! to the new root once the backend has produced a proof.

use std::time::Instant;

use tracing::{debug, info};
use umbra_shielded::field::{self, FieldElement};
use umbra_shielded::hash::hash_concat;
use umbra_shielded::merkle::MerkleTree;

use crate::backend::{self, ProverBackend};
use crate::circuit::CircuitId;
use crate::error::{ProverError, Result};
use crate::inputs::{CircuitInputs, PublicSignals};
use crate::proof::Groth16Proof;

/// Supported batch sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RollupSize {
    One,
    Four,
    Sixteen,
}

impl RollupSize {
    pub const ALL: [RollupSize; 3] = [RollupSize::One, RollupSize::Four, RollupSize::Sixteen];

    pub fn leaves(self) -> usize {
        match self {
            RollupSize::One => 1,
            RollupSize::Four => 4,
            RollupSize::Sixteen => 16,
        }
    }

    /// Height of the batch subtree, `log2(leaves)`
    pub fn height(self) -> usize {
        self.leaves().trailing_zeros() as usize
    }

    pub fn circuit(self) -> CircuitId {
        match self {
            RollupSize::One => CircuitId::Rollup1,
            RollupSize::Four => CircuitId::Rollup4,
            RollupSize::Sixteen => CircuitId::Rollup16,
        }
    }

    pub fn from_leaves(n: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.leaves() == n)
    }
}

/// A rollup proof and the transition it attests
#[derive(Debug, Clone, PartialEq)]
pub struct RollupProof {
    pub size: RollupSize,
    pub old_root: FieldElement,
    pub new_root: FieldElement,
    /// Shared path indices above the batch subtree, packed little-endian
    pub path_indices: u64,
    pub leaf_hash: FieldElement,
    pub proof: Groth16Proof,
    pub public_signals: PublicSignals,
}

/// `Hash` over the 32-byte big-endian encodings of the batch leaves
pub fn leaf_hash(leaves: &[FieldElement]) -> FieldElement {
    let words: Vec<[u8; 32]> = leaves.iter().map(field::to_be_bytes).collect();
    let parts: Vec<&[u8]> = words.iter().map(|w| &w[..]).collect();
    hash_concat(&parts)
}

fn check_alignment(tree: &MerkleTree, size: RollupSize, leaves: &[FieldElement]) -> Result<()> {
    let n = size.leaves();
    if leaves.len() != n || tree.len() % n != 0 {
        return Err(ProverError::BatchAlignment {
            batch_size: n,
            leaves: leaves.len(),
            tree_len: tree.len(),
        });
    }
    Ok(())
}

/// Insert `leaves` into `tree` and prove the root transition
///
/// On any error the tree is left exactly as it was.
pub async fn zk_prove_rollup<B: ProverBackend>(
    backend: &B,
    tree: &mut MerkleTree,
    size: RollupSize,
    leaves: &[FieldElement],
) -> Result<RollupProof> {
    check_alignment(tree, size, leaves)?;

    let mut working = tree.clone();
    let old_root = working.root();
    let first = working.len();
    working.bulk_insert(leaves)?;
    let new_root = working.root();

    let shared = working.path(first)?.above(size.height());
    let path_indices = shared.encoded_indices();
    let leaf_hash = leaf_hash(leaves);
    debug!(
        batch = size.leaves(),
        first_index = first,
        shared_levels = shared.len(),
        "prepared rollup batch"
    );

    let mut inputs = CircuitInputs::new();
    inputs
        .insert_field("oldRoot", old_root)
        .insert_field("newRoot", new_root)
        .insert_field("pathIndices", FieldElement::from(path_indices))
        .insert_field("leafHash", leaf_hash)
        .insert_array("leaves", leaves.to_vec())
        .insert_array("pathElements", shared.path_elements);

    let circuit = size.circuit();
    let start = Instant::now();
    let (proof, public_signals) = backend::generate(backend, circuit, &inputs).await?;
    info!(
        circuit = %circuit,
        leaves = size.leaves(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "generated rollup proof"
    );

    *tree = working;
    Ok(RollupProof {
        size,
        old_root,
        new_root,
        path_indices,
        leaf_hash,
        proof,
        public_signals,
    })
}

pub async fn zk_prove_rollup1<B: ProverBackend>(
    backend: &B,
    tree: &mut MerkleTree,
    leaf: FieldElement,
) -> Result<RollupProof> {
    zk_prove_rollup(backend, tree, RollupSize::One, &[leaf]).await
}

pub async fn zk_prove_rollup4<B: ProverBackend>(
    backend: &B,
    tree: &mut MerkleTree,
    leaves: &[FieldElement],
) -> Result<RollupProof> {
    zk_prove_rollup(backend, tree, RollupSize::Four, leaves).await
}

pub async fn zk_prove_rollup16<B: ProverBackend>(
    backend: &B,
    tree: &mut MerkleTree,
    leaves: &[FieldElement],
) -> Result<RollupProof> {
    zk_prove_rollup(backend, tree, RollupSize::Sixteen, leaves).await
}
