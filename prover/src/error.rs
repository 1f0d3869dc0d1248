//! Error types for proof orchestration.
use std::path::PathBuf;

use thiserror::Error;
use umbra_shielded::ShieldedError;

use crate::circuit::CircuitId;

/// Errors raised while assembling inputs, driving a backend or parsing artifacts
///
/// An invalid but well-formed proof is not an error; verification returns `false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProverError {
    #[error(transparent)]
    Shielded(#[from] ShieldedError),

    /// Batch does not fill an aligned subtree of the commitment tree
    #[error(
        "batch alignment error: batch of {batch_size} got {leaves} leaves on a tree of {tree_len}"
    )]
    BatchAlignment {
        batch_size: usize,
        leaves: usize,
        tree_len: usize,
    },

    /// The proving backend failed; carries the backend's message unchanged
    #[error("proof generation failed: {0}")]
    ProofGeneration(String),

    #[error("no artifacts registered for circuit {0}")]
    UnknownCircuit(CircuitId),

    #[error("failed to load artifact {path}: {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("malformed proof: {0}")]
    MalformedProof(String),

    #[error("circuit {circuit} expects {expected} public signals, got {actual}")]
    PublicSignalCount {
        circuit: CircuitId,
        expected: usize,
        actual: usize,
    },
}

/// Result type for proof orchestration
pub type Result<T> = std::result::Result<T, ProverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ProverError::BatchAlignment {
            batch_size: 4,
            leaves: 4,
            tree_len: 5,
        };
        assert_eq!(
            err.to_string(),
            "batch alignment error: batch of 4 got 4 leaves on a tree of 5"
        );

        let err = ProverError::PublicSignalCount {
            circuit: CircuitId::WithdrawRecipient,
            expected: 4,
            actual: 3,
        };
        assert_eq!(
            err.to_string(),
            "circuit withdraw_recipient expects 4 public signals, got 3"
        );

        let err = ProverError::UnknownCircuit(CircuitId::Rollup16);
        assert_eq!(err.to_string(), "no artifacts registered for circuit rollup16");
    }

    #[test]
    fn test_shielded_errors_are_transparent() {
        let inner = ShieldedError::LeafNotFound { index: 3, len: 2 };
        let err: ProverError = inner.clone().into();
        assert_eq!(err.to_string(), inner.to_string());
        assert_eq!(err, ProverError::Shielded(inner));
    }
}
