//! Proving Backends
//!
//! The orchestrators never prove anything themselves; they hand circuit
//! inputs to a [`ProverBackend`]. Witness and proof generation are long
//! running, so every call is async and the caller owns timeouts.
//!
//! ```text
//! CircuitInputs ──compute_witness──► Witness ──prove──► (proof, public signals)
//!                                                          │
//!                                        verify ◄──────────┘  -> bool
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ark_bn254::{Fr, G1Affine, G2Affine};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::PrimeField;
use ark_groth16::Proof;
use sha2::{Digest, Sha256};
use tracing::debug;
use umbra_config::{BackendKind, UmbraConfig};

use crate::circuit::{CircuitId, CircuitRegistry};
use crate::error::{ProverError, Result};
use crate::inputs::{CircuitInputs, PublicSignals};
use crate::proof::Groth16Proof;
use crate::snarkjs::SnarkjsBackend;

/// Full signal assignment produced from a set of inputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Witness {
    pub circuit: CircuitId,
    /// Backend-specific encoding (snarkjs `.wtns` bytes for the CLI backend)
    pub data: Vec<u8>,
}

/// Trait for witness computation, Groth16 proving and verification
pub trait ProverBackend: Send + Sync {
    fn compute_witness(
        &self,
        circuit: CircuitId,
        inputs: &CircuitInputs,
    ) -> impl Future<Output = Result<Witness>> + Send;

    fn prove(
        &self,
        circuit: CircuitId,
        witness: &Witness,
    ) -> impl Future<Output = Result<(Groth16Proof, PublicSignals)>> + Send;

    /// `Ok(false)` for a well-formed proof that does not verify
    fn verify(
        &self,
        circuit: CircuitId,
        proof: &Groth16Proof,
        signals: &PublicSignals,
    ) -> impl Future<Output = Result<bool>> + Send;
}

/// Witness then proof, with the public signal count checked against the circuit
pub async fn generate<B: ProverBackend>(
    backend: &B,
    circuit: CircuitId,
    inputs: &CircuitInputs,
) -> Result<(Groth16Proof, PublicSignals)> {
    let witness = backend.compute_witness(circuit, inputs).await?;
    debug!(circuit = %circuit, bytes = witness.data.len(), "computed witness");

    let (proof, signals) = backend.prove(circuit, &witness).await?;
    check_signal_count(circuit, &signals)?;
    Ok((proof, signals))
}

pub(crate) fn check_signal_count(circuit: CircuitId, signals: &PublicSignals) -> Result<()> {
    if signals.len() != circuit.public_signal_count() {
        return Err(ProverError::PublicSignalCount {
            circuit,
            expected: circuit.public_signal_count(),
            actual: signals.len(),
        });
    }
    Ok(())
}

// ============================================================================
// Mock Backend
// ============================================================================

/// Backend producing deterministic fake proofs, for tests and local runs
///
/// The "proof" is a set of curve points derived from the circuit id and the
/// public signals, so it verifies exactly for the signals it was made for.
#[derive(Debug, Default)]
pub struct MockBackend {
    witness_calls: AtomicUsize,
    prove_calls: AtomicUsize,
    verify_calls: AtomicUsize,
    failure: Option<String>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose witness step always fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn witness_calls(&self) -> usize {
        self.witness_calls.load(Ordering::SeqCst)
    }

    pub fn prove_calls(&self) -> usize {
        self.prove_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }

    /// Total calls of any kind
    pub fn calls(&self) -> usize {
        self.witness_calls() + self.prove_calls() + self.verify_calls()
    }

    fn mock_proof(circuit: CircuitId, signals: &PublicSignals) -> Groth16Proof {
        let mut hasher = Sha256::new();
        hasher.update(circuit.name().as_bytes());
        for word in signals.to_words() {
            hasher.update(word);
        }
        let seed = Fr::from_be_bytes_mod_order(&hasher.finalize());

        Proof {
            a: (G1Affine::generator() * seed).into_affine(),
            b: (G2Affine::generator() * seed).into_affine(),
            c: (G1Affine::generator() * (seed + Fr::from(1u64))).into_affine(),
        }
    }
}

impl ProverBackend for MockBackend {
    async fn compute_witness(&self, circuit: CircuitId, inputs: &CircuitInputs) -> Result<Witness> {
        self.witness_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(ProverError::ProofGeneration(message.clone()));
        }

        for name in circuit.public_signal_names() {
            if inputs.field(name).is_none() {
                return Err(ProverError::ProofGeneration(format!(
                    "missing public input {name} for {circuit}"
                )));
            }
        }
        let data = inputs
            .to_json()
            .map_err(|e| ProverError::ProofGeneration(e.to_string()))?
            .into_bytes();
        Ok(Witness { circuit, data })
    }

    async fn prove(
        &self,
        circuit: CircuitId,
        witness: &Witness,
    ) -> Result<(Groth16Proof, PublicSignals)> {
        self.prove_calls.fetch_add(1, Ordering::SeqCst);
        if witness.circuit != circuit {
            return Err(ProverError::ProofGeneration(format!(
                "witness was computed for {}, not {circuit}",
                witness.circuit
            )));
        }

        let inputs: CircuitInputs = serde_json::from_slice(&witness.data)
            .map_err(|e| ProverError::ProofGeneration(format!("corrupt mock witness: {e}")))?;
        let signals = circuit
            .public_signal_names()
            .iter()
            .map(|name| {
                inputs.field(name).ok_or_else(|| {
                    ProverError::ProofGeneration(format!("missing public input {name}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let signals = PublicSignals(signals);

        Ok((Self::mock_proof(circuit, &signals), signals))
    }

    async fn verify(
        &self,
        circuit: CircuitId,
        proof: &Groth16Proof,
        signals: &PublicSignals,
    ) -> Result<bool> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*proof == Self::mock_proof(circuit, signals))
    }
}

// ============================================================================
// Configured Backend
// ============================================================================

/// Backend selected by `[prover] backend` in the config
pub enum ConfiguredBackend {
    Mock(MockBackend),
    Snarkjs(SnarkjsBackend),
}

impl ConfiguredBackend {
    /// Backend for the process-wide config (`umbra.toml` plus env overrides)
    pub fn from_global_config() -> Self {
        Self::from_config(UmbraConfig::global())
    }

    pub fn from_config(config: &UmbraConfig) -> Self {
        match config.prover.backend {
            BackendKind::Mock => ConfiguredBackend::Mock(MockBackend::new()),
            BackendKind::Snarkjs => ConfiguredBackend::Snarkjs(SnarkjsBackend::new(
                config.prover.snarkjs_bin.clone(),
                Arc::new(CircuitRegistry::from_config(config)),
            )),
        }
    }
}

impl ProverBackend for ConfiguredBackend {
    async fn compute_witness(&self, circuit: CircuitId, inputs: &CircuitInputs) -> Result<Witness> {
        match self {
            ConfiguredBackend::Mock(b) => b.compute_witness(circuit, inputs).await,
            ConfiguredBackend::Snarkjs(b) => b.compute_witness(circuit, inputs).await,
        }
    }

    async fn prove(
        &self,
        circuit: CircuitId,
        witness: &Witness,
    ) -> Result<(Groth16Proof, PublicSignals)> {
        match self {
            ConfiguredBackend::Mock(b) => b.prove(circuit, witness).await,
            ConfiguredBackend::Snarkjs(b) => b.prove(circuit, witness).await,
        }
    }

    async fn verify(
        &self,
        circuit: CircuitId,
        proof: &Groth16Proof,
        signals: &PublicSignals,
    ) -> Result<bool> {
        match self {
            ConfiguredBackend::Mock(b) => b.verify(circuit, proof, signals).await,
            ConfiguredBackend::Snarkjs(b) => b.verify(circuit, proof, signals).await,
        }
    }
}
