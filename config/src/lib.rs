//! Umbra Configuration
//!
//! Shared configuration for the Umbra prover stack.
//!
//! Handles loading configuration from:
//! 1. UMBRA_CONFIG env var (explicit path)
//! 2. ./umbra.toml (current directory)
//! 3. ~/.umbra/umbra.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
static GLOBAL_CONFIG: OnceLock<UmbraConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "umbra.toml";
const CONFIG_DIR_NAME: &str = ".umbra";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_SNARKJS_BIN: &str = "snarkjs";
const DEFAULT_ARTIFACTS_DIR: &str = "./circuits";
const DEFAULT_TREE_LEVELS: usize = 20;

/// Circuit ids that get default artifact paths in generated samples
pub const KNOWN_CIRCUITS: [&str; 5] = [
    "withdraw",
    "withdraw_recipient",
    "rollup1",
    "rollup4",
    "rollup16",
];

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UmbraConfig {
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub tree: TreeConfig,
    /// Per-circuit artifact overrides, keyed by circuit id
    #[serde(default)]
    pub circuits: BTreeMap<String, CircuitPaths>,
}

/// Which proving backend drives witness and proof generation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Mock,
    Snarkjs,
}

/// Prover configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverConfig {
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default = "default_snarkjs_bin")]
    pub snarkjs_bin: String,
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Mock,
            snarkjs_bin: DEFAULT_SNARKJS_BIN.into(),
            artifacts_dir: DEFAULT_ARTIFACTS_DIR.into(),
        }
    }
}

fn default_snarkjs_bin() -> String {
    DEFAULT_SNARKJS_BIN.into()
}
fn default_artifacts_dir() -> PathBuf {
    DEFAULT_ARTIFACTS_DIR.into()
}

/// Commitment tree mirror configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_tree_levels")]
    pub levels: usize,
    /// Decimal field element; the protocol default is used when absent
    #[serde(default)]
    pub zero_element: Option<String>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            levels: DEFAULT_TREE_LEVELS,
            zero_element: None,
        }
    }
}

fn default_tree_levels() -> usize {
    DEFAULT_TREE_LEVELS
}

/// Artifact locations of one circuit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitPaths {
    /// Witness generator (circom wasm)
    pub wasm: PathBuf,
    /// Groth16 proving key
    pub zkey: PathBuf,
    /// snarkjs verification key JSON
    pub vkey: PathBuf,
}

impl CircuitPaths {
    /// `<dir>/<id>/<id>.wasm`, `<id>.zkey`, `<id>.vkey.json`
    pub fn in_dir(dir: &Path, id: &str) -> Self {
        let base = dir.join(id);
        Self {
            wasm: base.join(format!("{id}.wasm")),
            zkey: base.join(format!("{id}.zkey")),
            vkey: base.join(format!("{id}.vkey.json")),
        }
    }
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from a lookup if present
fn override_string(lookup: &impl Fn(&str) -> Option<String>, key: &str, field: &mut String) {
    if let Some(v) = lookup(key) {
        *field = v;
    }
}

/// Set field from a lookup if present and parseable
fn override_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut T,
) {
    if let Some(v) = lookup(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {key}={v}"),
        }
    }
}

// ============================================================================
// Implementation
// ============================================================================

impl UmbraConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        if let Ok(path) = env::var("UMBRA_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("UMBRA_CONFIG points to missing file: {}", path.display());
        }

        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok());
    }

    /// Apply overrides from any key/value source
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("UMBRA_PROVER_BACKEND") {
            self.prover.backend = match v.to_ascii_lowercase().as_str() {
                "snarkjs" => BackendKind::Snarkjs,
                "mock" => BackendKind::Mock,
                other => {
                    log::warn!(
                        "Unknown UMBRA_PROVER_BACKEND={other}, keeping {:?}",
                        self.prover.backend
                    );
                    self.prover.backend
                }
            };
        }
        override_string(&lookup, "UMBRA_SNARKJS_BIN", &mut self.prover.snarkjs_bin);
        if let Some(v) = lookup("UMBRA_ARTIFACTS_DIR") {
            self.prover.artifacts_dir = PathBuf::from(v);
        }
        override_parse(&lookup, "UMBRA_TREE_LEVELS", &mut self.tree.levels);
    }

    /// Artifact paths of `id`, falling back to the artifacts directory layout
    pub fn circuit_paths(&self, id: &str) -> CircuitPaths {
        self.circuits
            .get(id)
            .cloned()
            .unwrap_or_else(|| CircuitPaths::in_dir(&self.prover.artifacts_dir, id))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.prover.backend = BackendKind::Snarkjs;
        for id in KNOWN_CIRCUITS {
            sample
                .circuits
                .insert(id.into(), CircuitPaths::in_dir(Path::new(DEFAULT_ARTIFACTS_DIR), id));
        }
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static UmbraConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
