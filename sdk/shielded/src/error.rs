//! Error types for the shielded primitives.
use thiserror::Error;

/// Errors raised by key handling, commitments and the commitment tree.
///
/// Every variant is raised before any expensive cryptographic work on the
/// offending input is started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShieldedError {
    /// A key or key bundle has the wrong byte length
    #[error("invalid {key} length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        key: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Key bytes have the right length but do not encode a usable key
    #[error("invalid key: {0}")]
    InvalidKey(&'static str),

    /// A supplied value is not a canonical field element (>= FIELD_SIZE or unparsable)
    #[error("invalid field element: {0}")]
    InvalidFieldElement(String),

    #[error("invalid shielded address: {0}")]
    InvalidShieldedAddress(String),

    /// Recomputed commitment differs from the supplied one
    #[error("commitment mismatch: expected {expected}, recomputed {actual}")]
    CommitmentMismatch { expected: String, actual: String },

    #[error("leaf not found at index {index} (tree holds {len} leaves)")]
    LeafNotFound { index: usize, len: usize },

    #[error("index {index} out of bounds (tree holds {len} leaves)")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("tree capacity exceeded: capacity {capacity}, requested {requested}")]
    TreeCapacityExceeded { capacity: usize, requested: usize },

    #[error("invalid tree depth: {0} (must be between 1 and 32)")]
    InvalidTreeDepth(usize),

    /// Leaf events must arrive with contiguous, strictly increasing indices
    #[error("leaf event out of order: expected index {expected}, got {got}")]
    LeafOutOfOrder { expected: usize, got: usize },

    #[error("note decryption failed: {0}")]
    DecryptionFailure(&'static str),

    /// An on-chain commitment record could not be decoded
    #[error("invalid commitment record: {0}")]
    InvalidRecord(String),
}

/// Result type for shielded operations
pub type Result<T> = std::result::Result<T, ShieldedError>;
