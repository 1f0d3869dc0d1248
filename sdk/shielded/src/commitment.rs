//! Note Commitments
//!
//! A commitment hides `(amount, recipient verification key)` and carries the
//! randomness for the recipient in an encrypted note.
//!
//! ```text
//! k              = Hash(pkVerify || randomP || randomR)
//! commitmentHash = Hash2(Hash2(k, amount), randomS)
//! encryptedNote  = ECIES(pkEnc, randomP || randomR || randomS)
//! ```
//!
//! The same function builds fresh commitments and recomputes existing ones
//! from decrypted randomness; only the source of the randoms differs.

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::encryption::{self, NotePlaintext, RANDOM_LEN};
use crate::error::{Result, ShieldedError};
use crate::field::{self, FieldElement};
use crate::hash::{hash_concat, hash2};
use crate::keys::{EncPublicKey, VERIFY_PK_LEN, VerifyPublicKey, to_array};

/// A commitment together with its opening and the encrypted note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commitment {
    pub commitment_hash: FieldElement,
    pub k: FieldElement,
    pub random_p: [u8; RANDOM_LEN],
    pub random_r: [u8; RANDOM_LEN],
    pub random_s: [u8; RANDOM_LEN],
    pub amount: FieldElement,
    pub encrypted_note: Vec<u8>,
}

/// Optional caller-supplied randomness; missing values are sampled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitmentRandomness {
    pub random_p: Option<[u8; RANDOM_LEN]>,
    pub random_r: Option<[u8; RANDOM_LEN]>,
    pub random_s: Option<[u8; RANDOM_LEN]>,
}

impl From<NotePlaintext> for CommitmentRandomness {
    fn from(note: NotePlaintext) -> Self {
        Self {
            random_p: Some(note.random_p),
            random_r: Some(note.random_r),
            random_s: Some(note.random_s),
        }
    }
}

/// Build (or rebuild) a commitment to `amount` for the given public keys
pub fn commitment<R: RngCore + CryptoRng>(
    pk_verify: &[u8],
    pk_enc: &[u8],
    amount: FieldElement,
    randomness: CommitmentRandomness,
    rng: &mut R,
) -> Result<Commitment> {
    let pk_verify: VerifyPublicKey = to_array("verification public key", pk_verify)?;
    let pk_enc: EncPublicKey = to_array("encryption public key", pk_enc)?;

    let random_p = randomness.random_p.unwrap_or_else(|| random_bytes(rng));
    let random_r = randomness.random_r.unwrap_or_else(|| random_bytes(rng));
    let random_s = randomness.random_s.unwrap_or_else(|| random_bytes(rng));

    let k = compute_k(&pk_verify, &random_p, &random_r);
    let commitment_hash = compute_commitment_hash(k, amount, &random_s);

    let note = NotePlaintext {
        random_p,
        random_r,
        random_s,
    };
    let encrypted_note = encryption::encrypt_note(&pk_enc, &note, rng)?;

    Ok(Commitment {
        commitment_hash,
        k,
        random_p,
        random_r,
        random_s,
        amount,
        encrypted_note,
    })
}

/// `Hash(pkVerify || randomP || randomR)`
pub fn compute_k(
    pk_verify: &[u8; VERIFY_PK_LEN],
    random_p: &[u8; RANDOM_LEN],
    random_r: &[u8; RANDOM_LEN],
) -> FieldElement {
    hash_concat(&[&pk_verify[..], &random_p[..], &random_r[..]])
}

/// `Hash2(Hash2(k, amount), randomS)`
pub fn compute_commitment_hash(
    k: FieldElement,
    amount: FieldElement,
    random_s: &[u8; RANDOM_LEN],
) -> FieldElement {
    hash2(hash2(k, amount), random_s_field(random_s))
}

/// randomS as a field element (16 bytes big-endian, always below the modulus)
pub fn random_s_field(random_s: &[u8; RANDOM_LEN]) -> FieldElement {
    field::reduce_be_bytes(random_s)
}

fn random_bytes<R: RngCore + CryptoRng>(rng: &mut R) -> [u8; RANDOM_LEN] {
    let mut bytes = [0u8; RANDOM_LEN];
    rng.fill_bytes(&mut bytes);
    bytes
}

/// Commitment as submitted to and read back from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitmentRecord {
    /// uint256, decimal
    pub amount: String,
    /// 32-byte big-endian hex
    pub commitment_hash: String,
    /// 32-byte big-endian hex
    pub k: String,
    /// 16-byte hex
    pub random_s: String,
    pub encrypted_note: String,
}

impl Commitment {
    pub fn to_record(&self) -> CommitmentRecord {
        CommitmentRecord {
            amount: field::to_decimal(&self.amount),
            commitment_hash: field::to_fixed_len_hex(&self.commitment_hash),
            k: field::to_fixed_len_hex(&self.k),
            random_s: format!("0x{}", hex::encode(self.random_s)),
            encrypted_note: format!("0x{}", hex::encode(&self.encrypted_note)),
        }
    }
}

/// Decoded ledger record; randomP/randomR are not published on-chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRecord {
    pub amount: FieldElement,
    pub commitment_hash: FieldElement,
    pub k: FieldElement,
    pub random_s: [u8; RANDOM_LEN],
    pub encrypted_note: Vec<u8>,
}

impl CommitmentRecord {
    /// Validate and decode every field
    pub fn parse(&self) -> Result<ParsedRecord> {
        let random_s = decode_hex(&self.random_s)?;
        if random_s.len() != RANDOM_LEN {
            return Err(ShieldedError::InvalidRecord(format!(
                "randomS must be {RANDOM_LEN} bytes, got {}",
                random_s.len()
            )));
        }
        let encrypted_note = decode_hex(&self.encrypted_note)?;
        if encrypted_note.len() != encryption::ENCRYPTED_NOTE_LEN {
            return Err(ShieldedError::InvalidRecord(format!(
                "encrypted note must be {} bytes, got {}",
                encryption::ENCRYPTED_NOTE_LEN,
                encrypted_note.len()
            )));
        }

        Ok(ParsedRecord {
            amount: field::from_decimal(&self.amount)?,
            commitment_hash: decode_word("commitmentHash", &self.commitment_hash)?,
            k: decode_word("k", &self.k)?,
            random_s: to_array("randomS", &random_s)?,
            encrypted_note,
        })
    }
}

impl ParsedRecord {
    /// Check the published opening against the published hash
    pub fn is_consistent(&self) -> bool {
        compute_commitment_hash(self.k, self.amount, &self.random_s) == self.commitment_hash
    }
}

fn decode_hex(s: &str) -> Result<Vec<u8>> {
    hex::decode(s.strip_prefix("0x").unwrap_or(s))
        .map_err(|e| ShieldedError::InvalidRecord(format!("bad hex {s:?}: {e}")))
}

/// A full 32-byte big-endian word holding a field element
fn decode_word(name: &str, s: &str) -> Result<FieldElement> {
    let bytes = decode_hex(s)?;
    if bytes.len() != field::FIELD_BYTES {
        return Err(ShieldedError::InvalidRecord(format!(
            "{name} must be {} bytes, got {}",
            field::FIELD_BYTES,
            bytes.len()
        )));
    }
    field::from_be_bytes_checked(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::AccountKeys;
    use ark_bn254::Fr;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn fixed_randomness() -> CommitmentRandomness {
        CommitmentRandomness {
            random_p: Some([1u8; RANDOM_LEN]),
            random_r: Some([2u8; RANDOM_LEN]),
            random_s: Some([3u8; RANDOM_LEN]),
        }
    }

    fn commit_to(
        keys: &AccountKeys,
        amount: u64,
        randomness: CommitmentRandomness,
        rng: &mut StdRng,
    ) -> Commitment {
        commitment(
            &keys.verify_public_key,
            &keys.enc_public_key,
            Fr::from(amount),
            randomness,
            rng,
        )
        .unwrap()
    }

    #[test]
    fn test_commitment_deterministic() {
        let mut rng = StdRng::seed_from_u64(20);
        let keys = AccountKeys::random(&mut rng);

        let c1 = commit_to(&keys, 1000, fixed_randomness(), &mut rng);
        let c2 = commit_to(&keys, 1000, fixed_randomness(), &mut rng);

        assert_eq!(c1.commitment_hash, c2.commitment_hash);
        assert_eq!(c1.k, c2.k);
        // the note is re-encrypted under fresh ephemeral keys
        assert_ne!(c1.encrypted_note, c2.encrypted_note);
    }

    #[test]
    fn test_commitment_known_answer() {
        let keys = AccountKeys::from_raw(&[7u8; 32], &[9u8; 32]).unwrap();
        let c = commit_to(&keys, 1000, fixed_randomness(), &mut StdRng::seed_from_u64(22));

        assert_eq!(
            field::to_fixed_len_hex(&c.k),
            "0x026afed1f8244cf1d39186e250727bafca6f0dc238a6515cdcc68ea62cacc30e"
        );
        assert_eq!(
            field::to_fixed_len_hex(&c.commitment_hash),
            "0x04c5f00e6d2d0155e5f0037b54c3e66d11436f6f4e87b7593d28288204cb2757"
        );
    }

    #[test]
    fn test_commitment_binding() {
        let mut rng = StdRng::seed_from_u64(21);
        let keys = AccountKeys::random(&mut rng);
        let other = AccountKeys::random(&mut rng);
        let base = commit_to(&keys, 1000, fixed_randomness(), &mut rng).commitment_hash;

        let amount_changed = commit_to(&keys, 2000, fixed_randomness(), &mut rng).commitment_hash;
        assert_ne!(base, amount_changed);

        let key_changed = commitment(
            &other.verify_public_key,
            &keys.enc_public_key,
            Fr::from(1000u64),
            fixed_randomness(),
            &mut rng,
        )
        .unwrap()
        .commitment_hash;
        assert_ne!(base, key_changed);

        for change in 0..3 {
            let mut randomness = fixed_randomness();
            match change {
                0 => randomness.random_p = Some([9u8; RANDOM_LEN]),
                1 => randomness.random_r = Some([9u8; RANDOM_LEN]),
                _ => randomness.random_s = Some([9u8; RANDOM_LEN]),
            }
            let changed = commit_to(&keys, 1000, randomness, &mut rng).commitment_hash;
            assert_ne!(base, changed, "changing random #{change} must change the hash");
        }
    }

    #[test]
    fn test_recompute_from_decrypted_note() {
        let mut rng = StdRng::seed_from_u64(22);
        let keys = AccountKeys::random(&mut rng);
        let fresh = commit_to(&keys, 42, CommitmentRandomness::default(), &mut rng);

        let note = encryption::decrypt_note(&keys.enc_secret_key, &fresh.encrypted_note).unwrap();
        let rebuilt = commit_to(&keys, 42, note.into(), &mut rng);

        assert_eq!(rebuilt.commitment_hash, fresh.commitment_hash);
        assert_eq!(rebuilt.random_p, fresh.random_p);
        assert_eq!(rebuilt.random_s, fresh.random_s);
    }

    #[test]
    fn test_key_lengths_validated() {
        let mut rng = StdRng::seed_from_u64(23);
        let err = commitment(&[0u8; 31], &[2u8; 33], Fr::from(1u64), fixed_randomness(), &mut rng)
            .unwrap_err();
        assert_eq!(
            err,
            ShieldedError::InvalidKeyLength {
                key: "verification public key",
                expected: 32,
                actual: 31,
            }
        );
        assert!(
            commitment(&[0u8; 32], &[2u8; 32], Fr::from(1u64), fixed_randomness(), &mut rng)
                .is_err()
        );
    }

    #[test]
    fn test_record_roundtrip() {
        let mut rng = StdRng::seed_from_u64(24);
        let keys = AccountKeys::random(&mut rng);
        let c = commit_to(&keys, 5, CommitmentRandomness::default(), &mut rng);

        let record = c.to_record();
        assert_eq!(record.amount, "5");
        assert_eq!(record.commitment_hash.len(), 66);
        assert_eq!(record.random_s.len(), 2 + 2 * RANDOM_LEN);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("commitmentHash"));
        let back: CommitmentRecord = serde_json::from_str(&json).unwrap();

        let parsed = back.parse().unwrap();
        assert_eq!(parsed.commitment_hash, c.commitment_hash);
        assert_eq!(parsed.k, c.k);
        assert_eq!(parsed.random_s, c.random_s);
        assert_eq!(parsed.encrypted_note, c.encrypted_note);
        assert!(parsed.is_consistent());
    }

    #[test]
    fn test_record_rejects_out_of_field_values() {
        let mut rng = StdRng::seed_from_u64(25);
        let keys = AccountKeys::random(&mut rng);
        let c = commit_to(&keys, 5, CommitmentRandomness::default(), &mut rng);

        let mut record = c.to_record();
        record.k = format!("0x{}", "ff".repeat(32));
        assert!(matches!(record.parse(), Err(ShieldedError::InvalidFieldElement(_))));

        let mut record = c.to_record();
        record.random_s = "0x00".into();
        assert!(matches!(record.parse(), Err(ShieldedError::InvalidRecord(_))));
    }

    #[test]
    fn test_record_requires_full_words() {
        let mut rng = StdRng::seed_from_u64(26);
        let keys = AccountKeys::random(&mut rng);
        let c = commit_to(&keys, 5, CommitmentRandomness::default(), &mut rng);

        let mut record = c.to_record();
        record.commitment_hash = "0x".into();
        assert!(matches!(record.parse(), Err(ShieldedError::InvalidRecord(_))));

        let mut record = c.to_record();
        record.k = String::new();
        assert!(matches!(record.parse(), Err(ShieldedError::InvalidRecord(_))));

        // a short word is not padded into a valid value
        let mut record = c.to_record();
        record.k = "0x05".into();
        assert!(matches!(record.parse(), Err(ShieldedError::InvalidRecord(_))));

        let mut record = c.to_record();
        record.commitment_hash = format!("0x00{}", &record.commitment_hash[2..]);
        assert!(matches!(record.parse(), Err(ShieldedError::InvalidRecord(_))));
    }
}
