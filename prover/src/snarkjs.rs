//! snarkjs Backend
//!
//! Wraps the snarkjs CLI for witness and proof generation. Each call works
//! in its own temporary directory so concurrent proofs never share files.
//! Artifact locations come from the registry, which resolves them once.
//! Verification runs natively against the cached verification key.
//!
//! ```text
//! snarkjs wtns calculate <wasm> input.json witness.wtns
//! snarkjs groth16 prove  <zkey> witness.wtns proof.json public.json
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use ark_bn254::{Bn254, Fr};
use ark_groth16::Groth16;
use ark_snark::SNARK;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::backend::{ProverBackend, Witness, check_signal_count};
use crate::circuit::{CircuitId, CircuitRegistry};
use crate::error::{ProverError, Result};
use crate::inputs::{CircuitInputs, PublicSignals};
use crate::proof::{self, Groth16Proof};

const INPUT_FILE: &str = "input.json";
const WITNESS_FILE: &str = "witness.wtns";
const PROOF_FILE: &str = "proof.json";
const PUBLIC_FILE: &str = "public.json";

/// snarkjs CLI wrapper
pub struct SnarkjsBackend {
    bin: PathBuf,
    registry: Arc<CircuitRegistry>,
}

impl SnarkjsBackend {
    pub fn new(bin: impl Into<PathBuf>, registry: Arc<CircuitRegistry>) -> Self {
        Self {
            bin: bin.into(),
            registry,
        }
    }

    pub fn registry(&self) -> &CircuitRegistry {
        &self.registry
    }

    async fn run(&self, args: &[&OsStr], dir: &Path) -> Result<()> {
        let output = Command::new(&self.bin)
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                ProverError::ProofGeneration(format!("failed to run {}: {e}", self.bin.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            error!("snarkjs failed: {}", stderr);
            // snarkjs reports most failures on stdout
            let message = if stderr.trim().is_empty() { stdout } else { stderr };
            return Err(ProverError::ProofGeneration(message.trim().to_string()));
        }

        debug!("snarkjs output: {}", String::from_utf8_lossy(&output.stdout));
        Ok(())
    }

    fn scratch_dir() -> Result<tempfile::TempDir> {
        tempfile::tempdir()
            .map_err(|e| ProverError::ProofGeneration(format!("failed to create scratch dir: {e}")))
    }
}

async fn read_output(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        ProverError::ProofGeneration(format!("missing snarkjs output {}: {e}", path.display()))
    })
}

/// Decode `proof.json` and `public.json`; unreadable output is a failed proof
fn parse_outputs(proof_json: &str, public_json: &str) -> Result<(Groth16Proof, PublicSignals)> {
    let proof = proof::parse_proof(proof_json).map_err(|e| {
        ProverError::ProofGeneration(format!("snarkjs wrote an unusable proof: {e}"))
    })?;
    let signals = serde_json::from_str(public_json).map_err(|e| {
        ProverError::ProofGeneration(format!("snarkjs wrote unusable public signals: {e}"))
    })?;
    Ok((proof, signals))
}

impl ProverBackend for SnarkjsBackend {
    async fn compute_witness(&self, circuit: CircuitId, inputs: &CircuitInputs) -> Result<Witness> {
        let artifacts = self.registry.proving_artifacts(circuit).await?;
        let wasm = &artifacts.wasm;

        let dir = Self::scratch_dir()?;
        let input_path = dir.path().join(INPUT_FILE);
        let witness_path = dir.path().join(WITNESS_FILE);
        let json = inputs
            .to_json()
            .map_err(|e| ProverError::ProofGeneration(e.to_string()))?;
        tokio::fs::write(&input_path, json)
            .await
            .map_err(|e| ProverError::ProofGeneration(e.to_string()))?;

        info!(circuit = %circuit, "calculating witness");
        self.run(
            &[
                OsStr::new("wtns"),
                OsStr::new("calculate"),
                wasm.as_os_str(),
                input_path.as_os_str(),
                witness_path.as_os_str(),
            ],
            dir.path(),
        )
        .await?;

        let data = tokio::fs::read(&witness_path).await.map_err(|e| {
            ProverError::ProofGeneration(format!("missing witness {}: {e}", witness_path.display()))
        })?;
        Ok(Witness { circuit, data })
    }

    async fn prove(
        &self,
        circuit: CircuitId,
        witness: &Witness,
    ) -> Result<(Groth16Proof, PublicSignals)> {
        let artifacts = self.registry.proving_artifacts(circuit).await?;
        let zkey = &artifacts.zkey;

        let dir = Self::scratch_dir()?;
        let witness_path = dir.path().join(WITNESS_FILE);
        let proof_path = dir.path().join(PROOF_FILE);
        let public_path = dir.path().join(PUBLIC_FILE);
        tokio::fs::write(&witness_path, &witness.data)
            .await
            .map_err(|e| ProverError::ProofGeneration(e.to_string()))?;

        let start = Instant::now();
        self.run(
            &[
                OsStr::new("groth16"),
                OsStr::new("prove"),
                zkey.as_os_str(),
                witness_path.as_os_str(),
                proof_path.as_os_str(),
                public_path.as_os_str(),
            ],
            dir.path(),
        )
        .await?;

        let (proof, signals) = parse_outputs(
            &read_output(&proof_path).await?,
            &read_output(&public_path).await?,
        )?;

        info!(
            circuit = %circuit,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "snarkjs proof generated"
        );
        Ok((proof, signals))
    }

    async fn verify(
        &self,
        circuit: CircuitId,
        proof: &Groth16Proof,
        signals: &PublicSignals,
    ) -> Result<bool> {
        check_signal_count(circuit, signals)?;
        let pvk = self.registry.verifying_key(circuit).await?;

        let valid =
            <Groth16<Bn254> as SNARK<Fr>>::verify_with_processed_vk(&pvk, signals.as_slice(), proof)
                .map_err(|e| ProverError::MalformedProof(e.to_string()))?;
        if !valid {
            warn!(circuit = %circuit, "proof failed verification");
        }
        Ok(valid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::CircuitArtifacts;
    use ark_bn254::{G1Affine, G2Affine};
    use ark_ec::AffineRepr;
    use ark_groth16::Proof;

    fn registry_in(dir: &Path) -> Arc<CircuitRegistry> {
        Arc::new(CircuitRegistry::new().with(
            CircuitId::Withdraw,
            CircuitArtifacts {
                wasm: dir.join("withdraw.wasm"),
                zkey: dir.join("withdraw.zkey"),
                vkey: dir.join("withdraw.vkey.json"),
            },
        ))
    }

    #[tokio::test]
    async fn test_missing_wasm_fails_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SnarkjsBackend::new("/nonexistent/snarkjs", registry_in(dir.path()));

        let err = backend
            .compute_witness(CircuitId::Withdraw, &CircuitInputs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProverError::ArtifactLoad { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary_is_generation_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("withdraw.wasm"), b"\0asm").unwrap();
        std::fs::write(dir.path().join("withdraw.zkey"), b"zkey").unwrap();
        let backend = SnarkjsBackend::new("/nonexistent/snarkjs", registry_in(dir.path()));

        let err = backend
            .compute_witness(CircuitId::Withdraw, &CircuitInputs::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProverError::ProofGeneration(_)));
    }

    #[tokio::test]
    async fn test_unregistered_circuit() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SnarkjsBackend::new("snarkjs", registry_in(dir.path()));
        let witness = Witness {
            circuit: CircuitId::Rollup4,
            data: vec![],
        };
        assert_eq!(
            backend.prove(CircuitId::Rollup4, &witness).await.unwrap_err(),
            ProverError::UnknownCircuit(CircuitId::Rollup4)
        );
    }

    #[tokio::test]
    async fn test_verify_checks_signal_count_first() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SnarkjsBackend::new("snarkjs", registry_in(dir.path()));
        let proof = Groth16Proof::default();
        let err = backend
            .verify(CircuitId::Withdraw, &proof, &PublicSignals(vec![Fr::from(1u64)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ProverError::PublicSignalCount { expected: 3, actual: 1, .. }));
    }

    #[test]
    fn test_unusable_output_is_generation_failure() {
        let proof = Proof {
            a: G1Affine::generator(),
            b: G2Affine::generator(),
            c: G1Affine::generator(),
        };
        let proof_json = serde_json::to_string(&proof::SnarkjsProof::from_proof(&proof)).unwrap();

        let (parsed, signals) = parse_outputs(&proof_json, r#"["1", "2", "3"]"#).unwrap();
        assert_eq!(parsed, proof);
        assert_eq!(signals.len(), 3);

        assert!(matches!(
            parse_outputs("{\"pi_a\": []}", r#"["1"]"#).unwrap_err(),
            ProverError::ProofGeneration(_)
        ));
        assert!(matches!(
            parse_outputs(&proof_json, r#"["not a number"]"#).unwrap_err(),
            ProverError::ProofGeneration(_)
        ));
    }
}
