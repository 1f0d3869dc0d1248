//! Circuit Registry
//!
//! Every deployed circuit has a stable id and a fixed public-signal layout.
//! The registry maps ids to their artifacts and caches the parsed
//! verification key, which is read from disk at most once and then shared
//! by every concurrent verification.
//!
//! ```text
//! CircuitId            public signals
//! withdraw             [rootHash, serialNumber, amount]
//! withdraw_recipient   [rootHash, serialNumber, amount, recipientAddress]
//! rollup1/4/16         [oldRoot, newRoot, pathIndices, leafHash]
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use ark_bn254::{Bn254, Fr};
use ark_groth16::{Groth16, PreparedVerifyingKey};
use ark_snark::SNARK;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;
use umbra_config::UmbraConfig;

use crate::error::{ProverError, Result};
use crate::proof;

const WITHDRAW_SIGNALS: &[&str] = &["rootHash", "serialNumber", "amount"];
const WITHDRAW_RECIPIENT_SIGNALS: &[&str] =
    &["rootHash", "serialNumber", "amount", "recipientAddress"];
const ROLLUP_SIGNALS: &[&str] = &["oldRoot", "newRoot", "pathIndices", "leafHash"];

/// Identifier of a deployed circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitId {
    Withdraw,
    WithdrawRecipient,
    Rollup1,
    Rollup4,
    Rollup16,
}

impl CircuitId {
    pub const ALL: [CircuitId; 5] = [
        CircuitId::Withdraw,
        CircuitId::WithdrawRecipient,
        CircuitId::Rollup1,
        CircuitId::Rollup4,
        CircuitId::Rollup16,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CircuitId::Withdraw => "withdraw",
            CircuitId::WithdrawRecipient => "withdraw_recipient",
            CircuitId::Rollup1 => "rollup1",
            CircuitId::Rollup4 => "rollup4",
            CircuitId::Rollup16 => "rollup16",
        }
    }

    /// Input names of the public signals, in proof order
    pub fn public_signal_names(self) -> &'static [&'static str] {
        match self {
            CircuitId::Withdraw => WITHDRAW_SIGNALS,
            CircuitId::WithdrawRecipient => WITHDRAW_RECIPIENT_SIGNALS,
            CircuitId::Rollup1 | CircuitId::Rollup4 | CircuitId::Rollup16 => ROLLUP_SIGNALS,
        }
    }

    pub fn public_signal_count(self) -> usize {
        self.public_signal_names().len()
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CircuitId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        CircuitId::ALL
            .into_iter()
            .find(|id| id.name() == s)
            .ok_or_else(|| format!("unknown circuit id: {s}"))
    }
}

/// Artifact files of one circuit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitArtifacts {
    /// Witness generator
    pub wasm: PathBuf,
    /// Proving key
    pub zkey: PathBuf,
    /// snarkjs verification key JSON
    pub vkey: PathBuf,
}

impl From<umbra_config::CircuitPaths> for CircuitArtifacts {
    fn from(paths: umbra_config::CircuitPaths) -> Self {
        Self {
            wasm: paths.wasm,
            zkey: paths.zkey,
            vkey: paths.vkey,
        }
    }
}

/// Proving-side artifacts, resolved and checked once per registry
///
/// The snarkjs CLI still reads these files itself on every proof; what is
/// cached here is the canonical location of a witness generator and proving
/// key that were found to be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvingArtifacts {
    pub wasm: PathBuf,
    pub zkey: PathBuf,
}

struct CircuitEntry {
    artifacts: CircuitArtifacts,
    proving: OnceCell<Arc<ProvingArtifacts>>,
    verifying_key: OnceCell<Arc<PreparedVerifyingKey<Bn254>>>,
}

/// Lazily loading map from circuit id to artifacts
#[derive(Default)]
pub struct CircuitRegistry {
    entries: HashMap<CircuitId, CircuitEntry>,
}

impl CircuitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every known circuit with the paths the config resolves for it
    pub fn from_config(config: &UmbraConfig) -> Self {
        let mut registry = Self::new();
        for id in CircuitId::ALL {
            registry.register(id, config.circuit_paths(id.name()).into());
        }
        registry
    }

    /// Register (or replace) a circuit; replaced artifacts are reloaded on next use
    pub fn register(&mut self, id: CircuitId, artifacts: CircuitArtifacts) -> &mut Self {
        self.entries.insert(
            id,
            CircuitEntry {
                artifacts,
                proving: OnceCell::new(),
                verifying_key: OnceCell::new(),
            },
        );
        self
    }

    pub fn with(mut self, id: CircuitId, artifacts: CircuitArtifacts) -> Self {
        self.register(id, artifacts);
        self
    }

    pub fn contains(&self, id: CircuitId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn artifacts(&self, id: CircuitId) -> Result<&CircuitArtifacts> {
        self.entry(id).map(|e| &e.artifacts)
    }

    fn entry(&self, id: CircuitId) -> Result<&CircuitEntry> {
        self.entries.get(&id).ok_or(ProverError::UnknownCircuit(id))
    }

    /// Witness generator and proving key of `id`, resolved on first use
    ///
    /// A failed lookup is not cached, so a missing file can be supplied later.
    pub async fn proving_artifacts(&self, id: CircuitId) -> Result<Arc<ProvingArtifacts>> {
        let entry = self.entry(id)?;
        entry
            .proving
            .get_or_try_init(|| resolve_proving_artifacts(id, &entry.artifacts))
            .await
            .cloned()
    }

    /// Prepared verification key of `id`, read and parsed on first use
    pub async fn verifying_key(&self, id: CircuitId) -> Result<Arc<PreparedVerifyingKey<Bn254>>> {
        let entry = self.entry(id)?;
        entry
            .verifying_key
            .get_or_try_init(|| load_verifying_key(id, &entry.artifacts.vkey))
            .await
            .cloned()
    }

    /// Whether the verification key of `id` is already cached
    pub fn is_loaded(&self, id: CircuitId) -> bool {
        self.entries
            .get(&id)
            .is_some_and(|e| e.verifying_key.initialized())
    }

    /// Whether the proving artifacts of `id` are already resolved
    pub fn is_proving_loaded(&self, id: CircuitId) -> bool {
        self.entries.get(&id).is_some_and(|e| e.proving.initialized())
    }
}

async fn resolve_artifact(path: &Path) -> Result<PathBuf> {
    let artifact_error = |reason: String| ProverError::ArtifactLoad {
        path: path.to_path_buf(),
        reason,
    };

    let resolved = tokio::fs::canonicalize(path)
        .await
        .map_err(|e| artifact_error(e.to_string()))?;
    let metadata = tokio::fs::metadata(&resolved)
        .await
        .map_err(|e| artifact_error(e.to_string()))?;
    if !metadata.is_file() || metadata.len() == 0 {
        return Err(artifact_error("not a non-empty regular file".into()));
    }
    Ok(resolved)
}

async fn resolve_proving_artifacts(
    id: CircuitId,
    artifacts: &CircuitArtifacts,
) -> Result<Arc<ProvingArtifacts>> {
    let wasm = resolve_artifact(&artifacts.wasm).await?;
    let zkey = resolve_artifact(&artifacts.zkey).await?;
    debug!(
        circuit = %id,
        wasm = %wasm.display(),
        zkey = %zkey.display(),
        "resolved proving artifacts"
    );
    Ok(Arc::new(ProvingArtifacts { wasm, zkey }))
}

async fn load_verifying_key(
    id: CircuitId,
    path: &Path,
) -> Result<Arc<PreparedVerifyingKey<Bn254>>> {
    let artifact_error = |reason: String| ProverError::ArtifactLoad {
        path: path.to_path_buf(),
        reason,
    };

    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| artifact_error(e.to_string()))?;
    let vk = proof::parse_verifying_key(&json).map_err(|e| artifact_error(e.to_string()))?;

    let inputs = vk.gamma_abc_g1.len().saturating_sub(1);
    if inputs != id.public_signal_count() {
        return Err(ProverError::PublicSignalCount {
            circuit: id,
            expected: id.public_signal_count(),
            actual: inputs,
        });
    }

    let prepared = <Groth16<Bn254> as SNARK<Fr>>::process_vk(&vk)
        .map_err(|e| artifact_error(e.to_string()))?;
    debug!(circuit = %id, path = %path.display(), "loaded verification key");
    Ok(Arc::new(prepared))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_names_roundtrip() {
        for id in CircuitId::ALL {
            assert_eq!(id.name().parse::<CircuitId>().unwrap(), id);
            assert_eq!(id.to_string(), id.name());
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.name()));
        }
        assert!("rollup8".parse::<CircuitId>().is_err());
    }

    #[test]
    fn test_signal_counts() {
        assert_eq!(CircuitId::Withdraw.public_signal_count(), 3);
        assert_eq!(CircuitId::WithdrawRecipient.public_signal_count(), 4);
        assert_eq!(CircuitId::Rollup16.public_signal_names()[2], "pathIndices");
    }

    #[test]
    fn test_registry_from_config() {
        let config = UmbraConfig::default();
        let registry = CircuitRegistry::from_config(&config);
        for id in CircuitId::ALL {
            assert!(registry.contains(id));
        }
        assert_eq!(
            registry.artifacts(CircuitId::Rollup4).unwrap().zkey,
            PathBuf::from("./circuits/rollup4/rollup4.zkey")
        );
    }

    #[tokio::test]
    async fn test_unknown_circuit() {
        let registry = CircuitRegistry::new();
        assert_eq!(
            registry.artifacts(CircuitId::Withdraw).unwrap_err(),
            ProverError::UnknownCircuit(CircuitId::Withdraw)
        );
        assert!(registry.verifying_key(CircuitId::Withdraw).await.is_err());
    }

    fn withdraw_artifacts(dir: &Path) -> CircuitArtifacts {
        CircuitArtifacts {
            wasm: dir.join("withdraw.wasm"),
            zkey: dir.join("withdraw.zkey"),
            vkey: dir.join("verification_key.json"),
        }
    }

    #[tokio::test]
    async fn test_proving_artifacts_resolved_once() {
        let dir = tempfile::tempdir().unwrap();
        let registry =
            CircuitRegistry::new().with(CircuitId::Withdraw, withdraw_artifacts(dir.path()));

        std::fs::write(dir.path().join("withdraw.wasm"), b"\0asm").unwrap();
        let err = registry.proving_artifacts(CircuitId::Withdraw).await.unwrap_err();
        assert!(matches!(
            err,
            ProverError::ArtifactLoad { ref path, .. } if path.ends_with("withdraw.zkey")
        ));
        assert!(!registry.is_proving_loaded(CircuitId::Withdraw));

        std::fs::write(dir.path().join("withdraw.zkey"), b"zkey").unwrap();
        let first = registry.proving_artifacts(CircuitId::Withdraw).await.unwrap();
        assert!(registry.is_proving_loaded(CircuitId::Withdraw));
        assert!(first.zkey.is_absolute());

        // later calls never touch the filesystem again
        std::fs::remove_file(dir.path().join("withdraw.zkey")).unwrap();
        let second = registry.proving_artifacts(CircuitId::Withdraw).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_empty_zkey_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("withdraw.wasm"), b"\0asm").unwrap();
        std::fs::write(dir.path().join("withdraw.zkey"), b"").unwrap();
        let registry =
            CircuitRegistry::new().with(CircuitId::Withdraw, withdraw_artifacts(dir.path()));
        assert!(matches!(
            registry.proving_artifacts(CircuitId::Withdraw).await.unwrap_err(),
            ProverError::ArtifactLoad { .. }
        ));
    }

    #[tokio::test]
    async fn test_snarkjs_verification_key_loaded_and_cached() {
        use crate::proof::SnarkjsProof;
        use ark_bn254::{G1Affine, G2Affine};
        use ark_ec::AffineRepr;
        use ark_groth16::Proof;

        let points = SnarkjsProof::from_proof(&Proof {
            a: G1Affine::generator(),
            b: G2Affine::generator(),
            c: G1Affine::generator(),
        });
        let (g1, g2) = (points.pi_a, points.pi_b);
        // field names exactly as `snarkjs zkey export verificationkey` writes them
        let vkey = serde_json::json!({
            "protocol": "groth16",
            "curve": "bn128",
            "nPublic": 3,
            "vk_alpha_1": g1,
            "vk_beta_2": g2,
            "vk_gamma_2": g2,
            "vk_delta_2": g2,
            "vk_alphabeta_12": [],
            "IC": [g1, g1, g1, g1],
        });

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("verification_key.json"), vkey.to_string()).unwrap();
        let registry =
            CircuitRegistry::new().with(CircuitId::Withdraw, withdraw_artifacts(dir.path()));

        let first = registry.verifying_key(CircuitId::Withdraw).await.unwrap();
        assert!(registry.is_loaded(CircuitId::Withdraw));
        let second = registry.verifying_key(CircuitId::Withdraw).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_missing_vkey_is_artifact_error() {
        let registry = CircuitRegistry::new().with(
            CircuitId::Withdraw,
            CircuitArtifacts {
                wasm: "missing.wasm".into(),
                zkey: "missing.zkey".into(),
                vkey: "/nonexistent/withdraw.vkey.json".into(),
            },
        );
        let err = registry.verifying_key(CircuitId::Withdraw).await.unwrap_err();
        assert!(matches!(err, ProverError::ArtifactLoad { .. }));
        assert!(!registry.is_loaded(CircuitId::Withdraw));
    }
}
