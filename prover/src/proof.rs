//! Groth16 proof and verification key codecs
//!
//! Reads the JSON produced by snarkjs into arkworks types and writes proofs
//! back out, either as snarkjs JSON or as EVM verifier calldata.
//!
//! ```text
//! snarkjs G1: [x, y, z]                 decimal, z = "1" (or "0" at infinity)
//! snarkjs G2: [[x.c0, x.c1], [y.c0, y.c1], [z.c0, z.c1]]
//! EVM words:  a.x a.y | b.x.c1 b.x.c0 b.y.c1 b.y.c0 | c.x c.y   (32-byte BE)
//! ```
//!
//! Every parsed point is checked to be on the curve and in the prime-order
//! subgroup before it is used.

use ark_bn254::{Bn254, Fq, Fq2, G1Affine, G2Affine};
use ark_ec::AffineRepr;
use ark_ff::{BigInteger, PrimeField};
use ark_groth16::{Proof, VerifyingKey};
use ark_serialize::CanonicalSerialize;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::error::{ProverError, Result};

/// Groth16 proof over BN254
pub type Groth16Proof = Proof<Bn254>;

/// `proof.json` as written by `snarkjs groth16 prove`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnarkjsProof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_curve")]
    pub curve: String,
}

fn default_protocol() -> String {
    "groth16".into()
}

fn default_curve() -> String {
    "bn128".into()
}

impl SnarkjsProof {
    pub fn into_proof(self) -> Result<Groth16Proof> {
        check_header(&self.protocol, &self.curve)?;
        Ok(Proof {
            a: g1_from_strings(&self.pi_a)?,
            b: g2_from_strings(&self.pi_b)?,
            c: g1_from_strings(&self.pi_c)?,
        })
    }

    pub fn from_proof(proof: &Groth16Proof) -> Self {
        Self {
            pi_a: g1_to_strings(&proof.a),
            pi_b: g2_to_strings(&proof.b),
            pi_c: g1_to_strings(&proof.c),
            protocol: default_protocol(),
            curve: default_curve(),
        }
    }
}

/// Verification key JSON as written by `snarkjs zkey export verificationkey`
#[derive(Debug, Clone, Deserialize)]
struct SnarkjsVerifyingKey {
    #[serde(default = "default_protocol")]
    protocol: String,
    #[serde(default = "default_curve")]
    curve: String,
    #[serde(rename = "nPublic")]
    n_public: usize,
    vk_alpha_1: Vec<String>,
    vk_beta_2: Vec<Vec<String>>,
    vk_gamma_2: Vec<Vec<String>>,
    vk_delta_2: Vec<Vec<String>>,
    #[serde(rename = "IC")]
    ic: Vec<Vec<String>>,
}

/// Parse a snarkjs `proof.json`
pub fn parse_proof(json: &str) -> Result<Groth16Proof> {
    let raw: SnarkjsProof =
        serde_json::from_str(json).map_err(|e| ProverError::MalformedProof(e.to_string()))?;
    raw.into_proof()
}

/// Parse a snarkjs verification key
pub fn parse_verifying_key(json: &str) -> Result<VerifyingKey<Bn254>> {
    let raw: SnarkjsVerifyingKey =
        serde_json::from_str(json).map_err(|e| ProverError::MalformedProof(e.to_string()))?;
    check_header(&raw.protocol, &raw.curve)?;
    if raw.ic.len() != raw.n_public + 1 {
        return Err(ProverError::MalformedProof(format!(
            "verification key declares {} public inputs but carries {} IC points",
            raw.n_public,
            raw.ic.len()
        )));
    }

    Ok(VerifyingKey {
        alpha_g1: g1_from_strings(&raw.vk_alpha_1)?,
        beta_g2: g2_from_strings(&raw.vk_beta_2)?,
        gamma_g2: g2_from_strings(&raw.vk_gamma_2)?,
        delta_g2: g2_from_strings(&raw.vk_delta_2)?,
        gamma_abc_g1: raw
            .ic
            .iter()
            .map(|p| g1_from_strings(p))
            .collect::<Result<Vec<_>>>()?,
    })
}

/// Proof as eight 32-byte big-endian words for an EVM verifier
///
/// The EVM pairing precompile orders Fq2 limbs as (c1, c0).
pub fn to_evm_words(proof: &Groth16Proof) -> Result<[[u8; 32]; 8]> {
    let (ax, ay) = g1_coords(&proof.a)?;
    let (bx, by) = g2_coords(&proof.b)?;
    let (cx, cy) = g1_coords(&proof.c)?;
    Ok([
        fq_to_word(&ax),
        fq_to_word(&ay),
        fq_to_word(&bx.c1),
        fq_to_word(&bx.c0),
        fq_to_word(&by.c1),
        fq_to_word(&by.c0),
        fq_to_word(&cx),
        fq_to_word(&cy),
    ])
}

/// Hash of the compressed verification key, used to pin a deployed key
pub fn verification_key_hash(vk: &VerifyingKey<Bn254>) -> Result<[u8; 32]> {
    let mut vk_bytes = Vec::new();
    vk.serialize_compressed(&mut vk_bytes)
        .map_err(|e| {
            ProverError::MalformedProof(format!("failed to serialize verification key: {e}"))
        })?;
    Ok(*blake3::hash(&vk_bytes).as_bytes())
}

fn check_header(protocol: &str, curve: &str) -> Result<()> {
    if protocol != "groth16" {
        return Err(ProverError::MalformedProof(format!("unsupported protocol {protocol}")));
    }
    if curve != "bn128" && curve != "bn254" {
        return Err(ProverError::MalformedProof(format!("unsupported curve {curve}")));
    }
    Ok(())
}

fn parse_fq(s: &str) -> Result<Fq> {
    let value = BigUint::parse_bytes(s.trim().as_bytes(), 10)
        .ok_or_else(|| ProverError::MalformedProof(format!("not a decimal coordinate: {s:?}")))?;
    let modulus = BigUint::from_bytes_be(&Fq::MODULUS.to_bytes_be());
    if value >= modulus {
        return Err(ProverError::MalformedProof(format!(
            "coordinate {value} is not below the base field modulus"
        )));
    }
    Ok(Fq::from_be_bytes_mod_order(&value.to_bytes_be()))
}

fn fq_to_word(f: &Fq) -> [u8; 32] {
    let bytes = f.into_bigint().to_bytes_be();
    let mut word = [0u8; 32];
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    word
}

fn fq_to_string(f: &Fq) -> String {
    BigUint::from_bytes_be(&f.into_bigint().to_bytes_be()).to_string()
}

fn g1_from_strings(coords: &[String]) -> Result<G1Affine> {
    if coords.len() != 3 {
        return Err(ProverError::MalformedProof(format!(
            "G1 point needs 3 coordinates, got {}",
            coords.len()
        )));
    }
    if coords[2].trim() == "0" {
        return Ok(G1Affine::zero());
    }
    let point = G1Affine::new_unchecked(parse_fq(&coords[0])?, parse_fq(&coords[1])?);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(ProverError::MalformedProof("G1 point not on curve".into()));
    }
    Ok(point)
}

fn g2_from_strings(coords: &[Vec<String>]) -> Result<G2Affine> {
    if coords.len() != 3 || coords.iter().any(|c| c.len() != 2) {
        return Err(ProverError::MalformedProof(
            "G2 point needs 3 coordinate pairs".into(),
        ));
    }
    if coords[2][0].trim() == "0" && coords[2][1].trim() == "0" {
        return Ok(G2Affine::zero());
    }
    let x = Fq2::new(parse_fq(&coords[0][0])?, parse_fq(&coords[0][1])?);
    let y = Fq2::new(parse_fq(&coords[1][0])?, parse_fq(&coords[1][1])?);
    let point = G2Affine::new_unchecked(x, y);
    if !point.is_on_curve() || !point.is_in_correct_subgroup_assuming_on_curve() {
        return Err(ProverError::MalformedProof(
            "G2 point not on curve or not in the prime subgroup".into(),
        ));
    }
    Ok(point)
}

fn g1_coords(p: &G1Affine) -> Result<(Fq, Fq)> {
    p.xy()
        .ok_or_else(|| ProverError::MalformedProof("G1 point at infinity".into()))
}

fn g2_coords(p: &G2Affine) -> Result<(Fq2, Fq2)> {
    p.xy()
        .ok_or_else(|| ProverError::MalformedProof("G2 point at infinity".into()))
}

fn g1_to_strings(p: &G1Affine) -> Vec<String> {
    match p.xy() {
        Some((x, y)) => vec![fq_to_string(&x), fq_to_string(&y), "1".into()],
        None => vec!["0".into(), "1".into(), "0".into()],
    }
}

fn g2_to_strings(p: &G2Affine) -> Vec<Vec<String>> {
    match p.xy() {
        Some((x, y)) => vec![
            vec![fq_to_string(&x.c0), fq_to_string(&x.c1)],
            vec![fq_to_string(&y.c0), fq_to_string(&y.c1)],
            vec!["1".into(), "0".into()],
        ],
        None => vec![
            vec!["0".into(), "0".into()],
            vec!["1".into(), "0".into()],
            vec!["0".into(), "0".into()],
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::Fr;
    use ark_ec::CurveGroup;

    fn sample_proof() -> Groth16Proof {
        Proof {
            a: (G1Affine::generator() * Fr::from(3u64)).into_affine(),
            b: (G2Affine::generator() * Fr::from(5u64)).into_affine(),
            c: (G1Affine::generator() * Fr::from(7u64)).into_affine(),
        }
    }

    #[test]
    fn test_generator_decimal_form() {
        let json = SnarkjsProof::from_proof(&Proof {
            a: G1Affine::generator(),
            b: G2Affine::generator(),
            c: G1Affine::generator(),
        });
        // BN254 G1 generator is (1, 2)
        assert_eq!(json.pi_a, vec!["1", "2", "1"]);
        assert_eq!(json.pi_b[2], vec!["1", "0"]);
    }

    #[test]
    fn test_snarkjs_json_roundtrip() {
        let proof = sample_proof();
        let json = serde_json::to_string(&SnarkjsProof::from_proof(&proof)).unwrap();
        assert!(json.contains("\"protocol\":\"groth16\""));
        assert_eq!(parse_proof(&json).unwrap(), proof);
    }

    #[test]
    fn test_rejects_off_curve_points() {
        let mut raw = SnarkjsProof::from_proof(&sample_proof());
        raw.pi_a[1] = "3".into();
        assert!(matches!(raw.into_proof(), Err(ProverError::MalformedProof(_))));

        let mut raw = SnarkjsProof::from_proof(&sample_proof());
        raw.pi_b[0].swap(0, 1);
        assert!(raw.into_proof().is_err());

        let mut raw = SnarkjsProof::from_proof(&sample_proof());
        raw.protocol = "plonk".into();
        assert!(raw.into_proof().is_err());
    }

    #[test]
    fn test_requires_projective_triples() {
        let mut raw = SnarkjsProof::from_proof(&sample_proof());
        raw.pi_a.pop();
        assert!(matches!(
            raw.into_proof(),
            Err(ProverError::MalformedProof(msg)) if msg.contains("got 2")
        ));

        let mut raw = SnarkjsProof::from_proof(&sample_proof());
        raw.pi_b.pop();
        assert!(raw.into_proof().is_err());

        let mut raw = SnarkjsProof::from_proof(&sample_proof());
        raw.pi_c = vec!["0".into(), "1".into(), "0".into()];
        assert_eq!(raw.into_proof().unwrap().c, G1Affine::zero());
    }

    #[test]
    fn test_evm_words_swap_fq2_limbs() {
        let proof = sample_proof();
        let words = to_evm_words(&proof).unwrap();
        let (bx, _) = proof.b.xy().unwrap();
        assert_eq!(words[2], fq_to_word(&bx.c1));
        assert_eq!(words[3], fq_to_word(&bx.c0));
        assert_eq!(words[0], fq_to_word(&proof.a.xy().unwrap().0));
    }

    #[test]
    fn test_verifying_key_parsing() {
        let g1 = g1_to_strings(&G1Affine::generator());
        let g2 = g2_to_strings(&G2Affine::generator());
        let vk_json = serde_json::json!({
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
        let vk = parse_verifying_key(&vk_json.to_string()).unwrap();
        assert_eq!(vk.gamma_abc_g1.len(), 4);

        let hash = verification_key_hash(&vk).unwrap();
        assert_eq!(hash, verification_key_hash(&vk).unwrap());

        let mut wrong = vk_json.clone();
        wrong["nPublic"] = serde_json::json!(4);
        assert!(parse_verifying_key(&wrong.to_string()).is_err());
    }
}
