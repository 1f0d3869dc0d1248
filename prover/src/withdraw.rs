//! Withdraw Proofs
//!
//! Turns a decrypted note plus a membership path into a withdraw proof.
//!
//! ```text
//! 1. decrypt note            (randomP, randomR, randomS)
//! 2. recompute commitment    must equal the supplied commitment hash
//! 3. serial number           Hash(randomP || skVerify)
//! 4. fresh tree from leaves  path(treeIndex), leaf must be the commitment
//! 5. inputs                  public:  rootHash, serialNumber, amount[, recipientAddress]
//!                            private: pathElements, pathIndices, publicKey, secretKey,
//!                                     randomP, randomR, randomS, commitment
//! 6. backend                 witness, then proof
//! ```
//!
//! Nothing reaches the backend unless every check above passed.

use std::time::Instant;

use rand::rngs::OsRng;
use tracing::{debug, info};
use umbra_shielded::commitment::{self, random_s_field};
use umbra_shielded::field::{self, FieldElement};
use umbra_shielded::keys::{ENC_PK_LEN, ENC_SK_LEN, VERIFY_PK_LEN, VERIFY_SK_LEN};
use umbra_shielded::merkle::{MAX_LEVELS, MerkleTree};
use umbra_shielded::{ShieldedError, decrypt_note, nullifier};

use crate::backend::{self, ProverBackend, check_signal_count};
use crate::circuit::CircuitId;
use crate::error::Result;
use crate::inputs::{CircuitInputs, PublicSignals};
use crate::proof::Groth16Proof;

/// Byte length of a recipient address bound into the withdraw circuit
pub const RECIPIENT_LEN: usize = 20;

/// Everything needed to spend one commitment
#[derive(Debug, Clone)]
pub struct WithdrawRequest<'a> {
    pub pk_verify: &'a [u8],
    pub sk_verify: &'a [u8],
    pub pk_enc: &'a [u8],
    pub sk_enc: &'a [u8],
    pub amount: FieldElement,
    pub commitment_hash: FieldElement,
    pub encrypted_note: &'a [u8],
    /// Ledger leaves in acceptance order
    pub tree_leaves: &'a [FieldElement],
    pub tree_index: usize,
    pub tree_levels: usize,
    /// Tree zero element; the protocol default when `None`
    pub zero_element: Option<FieldElement>,
    /// Selects the recipient-bound circuit when present
    pub recipient: Option<[u8; RECIPIENT_LEN]>,
}

impl WithdrawRequest<'_> {
    pub fn circuit(&self) -> CircuitId {
        if self.recipient.is_some() {
            CircuitId::WithdrawRecipient
        } else {
            CircuitId::Withdraw
        }
    }
}

/// A withdraw proof with its public signals
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawProof {
    pub circuit: CircuitId,
    pub proof: Groth16Proof,
    pub public_signals: PublicSignals,
}

impl WithdrawProof {
    pub fn root(&self) -> FieldElement {
        self.public_signals.0[0]
    }

    pub fn serial_number(&self) -> FieldElement {
        self.public_signals.0[1]
    }

    pub fn amount(&self) -> FieldElement {
        self.public_signals.0[2]
    }
}

fn check_len(key: &'static str, bytes: &[u8], expected: usize) -> Result<()> {
    if bytes.len() != expected {
        return Err(ShieldedError::InvalidKeyLength {
            key,
            expected,
            actual: bytes.len(),
        }
        .into());
    }
    Ok(())
}

/// Cheap shape checks, run before any cryptography
fn validate(req: &WithdrawRequest<'_>) -> Result<()> {
    check_len("verification public key", req.pk_verify, VERIFY_PK_LEN)?;
    check_len("verification secret key", req.sk_verify, VERIFY_SK_LEN)?;
    check_len("encryption public key", req.pk_enc, ENC_PK_LEN)?;
    check_len("encryption secret key", req.sk_enc, ENC_SK_LEN)?;

    if req.tree_levels == 0 || req.tree_levels > MAX_LEVELS {
        return Err(ShieldedError::InvalidTreeDepth(req.tree_levels).into());
    }
    let capacity = 1u64 << req.tree_levels;
    if req.tree_leaves.len() as u64 > capacity {
        return Err(ShieldedError::TreeCapacityExceeded {
            capacity: capacity as usize,
            requested: req.tree_leaves.len(),
        }
        .into());
    }
    if req.tree_index >= req.tree_leaves.len() {
        return Err(ShieldedError::LeafNotFound {
            index: req.tree_index,
            len: req.tree_leaves.len(),
        }
        .into());
    }
    Ok(())
}

/// Assemble withdraw circuit inputs, checking note integrity and membership
pub fn withdraw_inputs(req: &WithdrawRequest<'_>) -> Result<CircuitInputs> {
    validate(req)?;

    let note = decrypt_note(req.sk_enc, req.encrypted_note)?;

    let recomputed = commitment::commitment(
        req.pk_verify,
        req.pk_enc,
        req.amount,
        note.into(),
        &mut OsRng,
    )?;
    if recomputed.commitment_hash != req.commitment_hash {
        return Err(ShieldedError::CommitmentMismatch {
            expected: field::to_fixed_len_hex(&req.commitment_hash),
            actual: field::to_fixed_len_hex(&recomputed.commitment_hash),
        }
        .into());
    }

    let serial_number = nullifier::serial_number(req.sk_verify, &note.random_p)?;

    let tree = MerkleTree::new(req.tree_levels, req.tree_leaves, req.zero_element)?;
    if tree.elements()[req.tree_index] != req.commitment_hash {
        return Err(ShieldedError::LeafNotFound {
            index: req.tree_index,
            len: tree.len(),
        }
        .into());
    }
    let path = tree.path(req.tree_index)?;
    debug!(index = req.tree_index, leaves = tree.len(), "built withdraw membership path");

    let mut inputs = CircuitInputs::new();
    inputs
        .insert_field("rootHash", tree.root())
        .insert_field("serialNumber", serial_number)
        .insert_field("amount", req.amount);
    if let Some(recipient) = &req.recipient {
        inputs.insert_field("recipientAddress", field::reduce_be_bytes(recipient));
    }
    inputs
        .insert_array("pathElements", path.path_elements)
        .insert_array(
            "pathIndices",
            path.path_indices
                .iter()
                .map(|bit| FieldElement::from(*bit))
                .collect(),
        )
        .insert_bits("publicKey", req.pk_verify)
        .insert_bits("secretKey", req.sk_verify)
        .insert_bits("randomP", &note.random_p)
        .insert_bits("randomR", &note.random_r)
        .insert_field("randomS", random_s_field(&note.random_s))
        .insert_field("commitment", req.commitment_hash);
    Ok(inputs)
}

/// Produce a withdraw proof for the commitment at `req.tree_index`
pub async fn zk_prove<B: ProverBackend>(
    backend: &B,
    req: &WithdrawRequest<'_>,
) -> Result<WithdrawProof> {
    let circuit = req.circuit();
    let inputs = withdraw_inputs(req)?;

    let start = Instant::now();
    let (proof, public_signals) = backend::generate(backend, circuit, &inputs).await?;
    info!(
        circuit = %circuit,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "generated withdraw proof"
    );

    Ok(WithdrawProof {
        circuit,
        proof,
        public_signals,
    })
}

/// Verify a withdraw (or any registered) proof; `Ok(false)` when it does not hold
pub async fn zk_verify<B: ProverBackend>(
    backend: &B,
    circuit: CircuitId,
    proof: &Groth16Proof,
    public_signals: &PublicSignals,
) -> Result<bool> {
    check_signal_count(circuit, public_signals)?;
    backend.verify(circuit, proof, public_signals).await
}
